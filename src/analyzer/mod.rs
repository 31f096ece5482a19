//! Dependency Analyzer: two project-scoped phases over batches of
//! file element tables. Phase A records local symbols; Phase B resolves
//! call/reference elements against those symbols and denormalizes the
//! resulting relation edges onto both endpoints.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::error::{AnalyzerResult, StoreError};
use crate::store::{GraphStore, decode_record, get_record, keys, put_record};
use crate::types::{
    DefinitionRef, Element, ElementKind, FileElementTable, Import, Language, Range, Relation, RelationKind,
    SymbolDefinitionRecord,
};

/// "Best-effort" cap on how many unfiltered candidates Phase B keeps per
/// symbol name when neither import visibility nor arity narrows the
/// search. Left fixed rather than made configurable; see DESIGN.md.
pub const SYMBOL_FALLBACK_LIMIT: usize = 2;

pub struct DependencyAnalyzer<'s> {
    store: &'s dyn GraphStore,
}

impl<'s> DependencyAnalyzer<'s> {
    pub fn new(store: &'s dyn GraphStore) -> Self {
        Self { store }
    }

    /// Phase A: for every definition element in `tables`, read-modify-write
    /// its `@sym:<lang>:<name>` record, appending a dedup'd `DefinitionRef`.
    pub fn phase_a(&self, project: &str, tables: &[FileElementTable]) -> AnalyzerResult<()> {
        for table in tables {
            for element in &table.elements {
                if !element.is_definition {
                    continue;
                }
                let key = keys::sym_key(table.language, &element.name);
                let mut record = match get_record::<SymbolDefinitionRecord>(self.store, project, &key) {
                    Ok(record) => record,
                    Err(StoreError::KeyNotFound { .. }) => {
                        SymbolDefinitionRecord::new(table.language, element.name.clone())
                    }
                    Err(e) => return Err(e.into()),
                };
                record.add_definition(DefinitionRef {
                    path: table.path.clone(),
                    range: element.range,
                    element_kind: element.kind,
                    param_count: element.param_count,
                });
                put_record(self.store, project, &key, &record)?;
            }
        }
        Ok(())
    }

    /// Phase B, forward half: resolve every call/reference element in
    /// `table` against the symbol tables Phase A has already built and
    /// persist the table. Does not rebuild back-edges — callers iterating
    /// many tables should call [`Self::rebuild_back_references`] once
    /// after the whole batch, not per table.
    pub fn resolve_forward(&self, project: &str, table: &mut FileElementTable) -> AnalyzerResult<()> {
        let language = table.language;
        let imports = table.imports.clone();
        for element in &mut table.elements {
            if element.kind != ElementKind::Call && element.kind != ElementKind::Reference {
                continue;
            }
            element.relations = match resolve_relations(self.store, project, language, &imports, element) {
                Ok(relations) => relations,
                Err(e) => {
                    tracing::warn!(
                        project,
                        element = %element.name,
                        error = %e,
                        "relation resolution failed for element, leaving relations empty"
                    );
                    Vec::new()
                }
            };
        }
        let key = keys::path_key(table.language, &table.path);
        put_record(self.store, project, &key, table)?;
        Ok(())
    }

    /// Convenience for a batch: forward-resolve every table, persist, then
    /// rebuild back-edges project-wide so every resolved definition knows
    /// its referrers (Testable property 4: relation symmetry).
    pub fn phase_b(&self, project: &str, tables: &mut [FileElementTable]) -> AnalyzerResult<()> {
        for table in tables.iter_mut() {
            self.resolve_forward(project, table)?;
        }
        self.rebuild_back_references(project)?;
        Ok(())
    }

    /// Scan every file element table in the project, collect every
    /// DEFINITION-kind relation a call/reference element holds, and attach
    /// a REFERENCE-kind relation on the pointed-to definition element.
    pub fn rebuild_back_references(&self, project: &str) -> AnalyzerResult<()> {
        let mut backrefs: HashMap<(String, Range), Vec<Relation>> = HashMap::new();

        for item in self.store.iter(project, keys::PATH_PREFIX, CancellationToken::new())? {
            let (_, bytes) = item?;
            let table: FileElementTable = decode_record(&bytes)?;
            for element in &table.elements {
                if element.kind != ElementKind::Call && element.kind != ElementKind::Reference {
                    continue;
                }
                for rel in &element.relations {
                    if rel.kind != RelationKind::Definition {
                        continue;
                    }
                    backrefs.entry((rel.target_path.clone(), rel.target_range)).or_default().push(Relation {
                        kind: RelationKind::Reference,
                        target_path: table.path.clone(),
                        target_name: element.name.clone(),
                        target_range: element.range,
                    });
                }
            }
        }

        if backrefs.is_empty() {
            return Ok(());
        }

        let mut updates = Vec::new();
        for item in self.store.iter(project, keys::PATH_PREFIX, CancellationToken::new())? {
            let (key, bytes) = item?;
            let mut table: FileElementTable = decode_record(&bytes)?;
            let mut changed = false;
            for element in &mut table.elements {
                if !element.is_definition {
                    continue;
                }
                let Some(refs) = backrefs.get(&(table.path.clone(), element.range)) else {
                    continue;
                };
                for reference in refs {
                    let already_present = element.relations.iter().any(|existing| {
                        existing.kind == RelationKind::Reference
                            && existing.target_path == reference.target_path
                            && existing.target_range == reference.target_range
                    });
                    if !already_present {
                        element.relations.push(reference.clone());
                        changed = true;
                    }
                }
            }
            if changed {
                updates.push((key, table));
            }
        }

        for (key, table) in updates {
            put_record(self.store, project, &key, &table)?;
        }
        Ok(())
    }
}

/// Prefix-match visibility test, reused by the query engine's snippet-mode
/// symbol search (`query_definitions` with a `code_snippet`).
pub(crate) fn import_visible(imports: &[Import], def: &DefinitionRef) -> bool {
    imports.iter().any(|import| {
        (!import.name.is_empty() && import.name != "*" && def.path.starts_with(&import.name))
            || (!import.source.is_empty() && def.path.starts_with(&import.source))
    })
}

fn to_relation(name: &str, def: &DefinitionRef) -> Relation {
    Relation {
        kind: RelationKind::Definition,
        target_path: def.path.clone(),
        target_name: name.to_string(),
        target_range: def.range,
    }
}

fn resolve_relations(
    store: &dyn GraphStore,
    project: &str,
    language: Language,
    imports: &[Import],
    element: &Element,
) -> AnalyzerResult<Vec<Relation>> {
    let key = keys::sym_key(language, &element.name);
    let record: SymbolDefinitionRecord = match get_record(store, project, &key) {
        Ok(record) => record,
        Err(StoreError::KeyNotFound { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if record.definitions.is_empty() {
        return Ok(Vec::new());
    }

    let mut filtered: Vec<&DefinitionRef> = record.definitions.iter().filter(|def| import_visible(imports, def)).collect();

    if element.kind == ElementKind::Call {
        if let Some(param_count) = element.param_count {
            let arity_matched: Vec<&DefinitionRef> =
                filtered.iter().copied().filter(|def| def.param_count == Some(param_count)).collect();
            if !arity_matched.is_empty() {
                filtered = arity_matched;
            } else if filtered.iter().any(|def| def.param_count.is_some()) {
                filtered.clear();
            }
        }
    }

    if filtered.is_empty() {
        return Ok(record
            .definitions
            .iter()
            .take(SYMBOL_FALLBACK_LIMIT)
            .map(|def| to_relation(&element.name, def))
            .collect());
    }

    Ok(filtered.into_iter().map(|def| to_relation(&element.name, def)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use crate::types::{ImportKind};

    fn def_element(name: &str, range: Range, param_count: Option<u32>) -> Element {
        let mut el = Element::new(name, ElementKind::Function, range, true);
        el.param_count = param_count;
        el
    }

    fn call_element(name: &str, range: Range, param_count: Option<u32>) -> Element {
        let mut el = Element::new(name, ElementKind::Call, range, false);
        el.param_count = param_count;
        el
    }

    #[test]
    fn phase_a_records_local_symbol_and_dedups() {
        let store = MemStore::new();
        let mut table = FileElementTable::new("a.rs", Language::Rust);
        table.elements.push(def_element("foo", Range::new(0, 0, 2, 0), Some(0)));
        let analyzer = DependencyAnalyzer::new(&store);
        analyzer.phase_a("proj", &[table.clone()]).unwrap();
        analyzer.phase_a("proj", &[table]).unwrap();

        let record: SymbolDefinitionRecord =
            get_record(&store, "proj", &keys::sym_key(Language::Rust, "foo")).unwrap();
        assert_eq!(record.definitions.len(), 1);
    }

    #[test]
    fn phase_b_links_call_to_definition_and_back() {
        let store = MemStore::new();

        let mut def_table = FileElementTable::new("a.rs", Language::Rust);
        def_table.elements.push(def_element("foo", Range::new(9, 0, 14, 1), Some(0)));

        let mut call_table = FileElementTable::new("b.rs", Language::Rust);
        call_table.elements.push(call_element("foo", Range::new(21, 4, 21, 9), Some(0)));

        let analyzer = DependencyAnalyzer::new(&store);
        analyzer.phase_a("proj", std::slice::from_ref(&def_table)).unwrap();

        let mut tables = vec![def_table.clone(), call_table.clone()];
        analyzer.phase_b("proj", &mut tables).unwrap();

        let stored_def: FileElementTable =
            get_record(&store, "proj", &keys::path_key(Language::Rust, "a.rs")).unwrap();
        let stored_call: FileElementTable =
            get_record(&store, "proj", &keys::path_key(Language::Rust, "b.rs")).unwrap();

        let foo_def = stored_def.elements.iter().find(|e| e.name == "foo").unwrap();
        assert_eq!(foo_def.relations.len(), 1);
        assert_eq!(foo_def.relations[0].kind, RelationKind::Reference);
        assert_eq!(foo_def.relations[0].target_path, "b.rs");

        let call = stored_call.elements.iter().find(|e| e.name == "foo").unwrap();
        assert_eq!(call.relations.len(), 1);
        assert_eq!(call.relations[0].kind, RelationKind::Definition);
        assert_eq!(call.relations[0].target_path, "a.rs");
    }

    #[test]
    fn arity_mismatch_falls_back_to_capped_candidates() {
        let store = MemStore::new();

        let mut p1 = FileElementTable::new("p1/a.rs", Language::Rust);
        p1.elements.push(def_element("foo", Range::new(0, 0, 1, 0), Some(2)));
        let mut p2 = FileElementTable::new("p2/a.rs", Language::Rust);
        p2.elements.push(def_element("foo", Range::new(0, 0, 1, 0), Some(3)));

        let analyzer = DependencyAnalyzer::new(&store);
        analyzer.phase_a("proj", &[p1.clone(), p2.clone()]).unwrap();

        let mut call_table = FileElementTable::new("c.rs", Language::Rust);
        call_table.elements.push(call_element("foo", Range::new(5, 0, 5, 5), Some(2)));

        let mut tables = vec![p1, p2, call_table];
        analyzer.phase_b("proj", &mut tables).unwrap();

        let stored_call: FileElementTable =
            get_record(&store, "proj", &keys::path_key(Language::Rust, "c.rs")).unwrap();
        let call = &stored_call.elements[0];
        assert_eq!(call.relations.len(), 1);
        assert_eq!(call.relations[0].target_path, "p1/a.rs");
    }

    #[test]
    fn import_visibility_prefers_matching_path() {
        let store = MemStore::new();

        let mut lib_a = FileElementTable::new("lib_a/foo.rs", Language::Rust);
        lib_a.elements.push(def_element("run", Range::new(0, 0, 1, 0), None));
        let mut lib_b = FileElementTable::new("lib_b/foo.rs", Language::Rust);
        lib_b.elements.push(def_element("run", Range::new(0, 0, 1, 0), None));

        let analyzer = DependencyAnalyzer::new(&store);
        analyzer.phase_a("proj", &[lib_a.clone(), lib_b.clone()]).unwrap();

        let mut caller = FileElementTable::new("main.rs", Language::Rust);
        caller.imports.push(Import {
            name: "run".into(),
            source: "lib_a".into(),
            kind: ImportKind::Use,
            range: Range::new(0, 0, 0, 10),
        });
        caller.elements.push(call_element("run", Range::new(3, 0, 3, 5), None));

        let mut tables = vec![lib_a, lib_b, caller];
        analyzer.phase_b("proj", &mut tables).unwrap();

        let stored_caller: FileElementTable =
            get_record(&store, "proj", &keys::path_key(Language::Rust, "main.rs")).unwrap();
        let call = &stored_caller.elements[0];
        assert_eq!(call.relations.len(), 1);
        assert_eq!(call.relations[0].target_path, "lib_a/foo.rs");
    }
}
