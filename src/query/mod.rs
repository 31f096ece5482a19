//! Query Engine: read-only, project-scoped lookups over the graph
//! store. Layered descent over stored relation edges, with an explicit
//! visited set guarding against cycles.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::analyzer::import_visible;
use crate::error::{QueryError, QueryResult, StoreError};
use crate::store::{GraphStore, decode_record, get_record, keys};
use crate::types::{Element, ElementKind, FileElementTable, Language, Range, RelationKind, SymbolDefinitionRecord};
use crate::workspace::{self, Project};

/// One definition candidate returned by `query_definitions`. `Serialize`
/// is derived here (not just on internal types) because this is also the
/// shape the CLI's `query` subcommands and the HTTP layer hand back to
/// callers directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub path: String,
    pub name: String,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Definition,
    Reference,
}

/// One node of a `query_relations` result tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationNode {
    pub file_path: String,
    pub symbol_name: String,
    pub position: Range,
    pub node_type: NodeType,
    pub children: Vec<RelationNode>,
}

/// One entry of a `get_file_structure` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStructureEntry {
    pub kind: ElementKind,
    pub name: String,
    pub position: Range,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub total_files: usize,
}

pub struct QueryEngine<'s> {
    store: &'s dyn GraphStore,
}

impl<'s> QueryEngine<'s> {
    pub fn new(store: &'s dyn GraphStore) -> Self {
        Self { store }
    }

    fn project_for<'a>(&self, projects: &'a [Project], file_path: &Path) -> QueryResult<&'a Project> {
        workspace::get_project_by_file_path(projects, file_path)
            .ok_or_else(|| QueryError::ProjectNotIndexed { path: file_path.to_path_buf() })
    }

    fn require_indexed(&self, project: &Project) -> QueryResult<()> {
        if !self.store.project_exists(&project.uuid)? {
            return Err(QueryError::ProjectNotIndexed { path: project.path.clone() });
        }
        Ok(())
    }

    fn infer_language(&self, file_path: &Path) -> QueryResult<Language> {
        workspace::infer_language(file_path).ok_or_else(|| QueryError::InvalidArgument {
            reason: format!("cannot infer language for '{}'", file_path.display()),
        })
    }

    fn load_table(&self, project: &Project, language: Language, normalized: &str) -> QueryResult<FileElementTable> {
        let key = keys::path_key(language, normalized);
        match get_record(self.store, &project.uuid, &key) {
            Ok(table) => Ok(table),
            Err(StoreError::KeyNotFound { .. }) => {
                Err(QueryError::InvalidArgument { reason: format!("file '{normalized}' is not indexed") })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `query_definitions(workspace, file_path, start_line?, end_line?, code_snippet?)`.
    /// Line bounds are 0-based, the store's native convention; the HTTP
    /// layer's `to_position`/`from_position` do the 1-based wire translation.
    pub fn query_definitions(
        &self,
        workspace_path: &Path,
        projects: &[Project],
        file_path: &Path,
        start_line: Option<u32>,
        end_line: Option<u32>,
        code_snippet: Option<&str>,
    ) -> QueryResult<Vec<Definition>> {
        let project = self.project_for(projects, file_path)?;
        self.require_indexed(project)?;
        let language = self.infer_language(file_path)?;

        if let Some(snippet) = code_snippet {
            return self.query_definitions_from_snippet(project, language, snippet);
        }

        let normalized = workspace::normalize_path(workspace_path, file_path);
        let table = self.load_table(project, language, &normalized)?;

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for element in &table.elements {
            if let (Some(s), Some(e)) = (start_line, end_line) {
                if element.range.start_line < s || element.range.start_line > e {
                    continue;
                }
            }
            if element.is_definition {
                if seen.insert((table.path.clone(), element.range)) {
                    out.push(Definition { path: table.path.clone(), name: element.name.clone(), range: element.range });
                }
            } else {
                for rel in &element.relations {
                    if rel.kind != RelationKind::Definition {
                        continue;
                    }
                    if seen.insert((rel.target_path.clone(), rel.target_range)) {
                        out.push(Definition {
                            path: rel.target_path.clone(),
                            name: rel.target_name.clone(),
                            range: rel.target_range,
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    fn query_definitions_from_snippet(&self, project: &Project, language: Language, snippet: &str) -> QueryResult<Vec<Definition>> {
        let table = crate::parsing::parse_file(language, Path::new("<snippet>"), snippet.as_bytes())
            .map_err(|e| QueryError::InvalidArgument { reason: e.to_string() })?;

        let mut names: Vec<String> = Vec::new();
        for element in table.elements.iter().filter(|e| e.kind == ElementKind::Call) {
            if !names.contains(&element.name) {
                names.push(element.name.clone());
            }
        }

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for name in names {
            let key = keys::sym_key(language, &name);
            let record: SymbolDefinitionRecord = match get_record(self.store, &project.uuid, &key) {
                Ok(record) => record,
                Err(StoreError::KeyNotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            };

            let filtered: Vec<_> = record.definitions.iter().filter(|def| import_visible(&table.imports, def)).collect();
            let chosen: Vec<_> = if filtered.is_empty() { record.definitions.iter().take(2).collect() } else { filtered };

            for def in chosen {
                if seen.insert((def.path.clone(), def.range)) {
                    out.push(Definition { path: def.path.clone(), name: name.clone(), range: def.range });
                }
            }
        }
        Ok(out)
    }

    /// `query_relations`: layered descent from a root element down to
    /// `max_layer` levels, following REFERENCE edges from definitions and
    /// TYPE_DEFINITION/enclosing-definition lookups from references.
    #[allow(clippy::too_many_arguments)]
    pub fn query_relations(
        &self,
        workspace_path: &Path,
        projects: &[Project],
        file_path: &Path,
        start_line: u32,
        end_line: u32,
        symbol_name: Option<&str>,
        max_layer: u32,
    ) -> QueryResult<Vec<RelationNode>> {
        let project = self.project_for(projects, file_path)?;
        self.require_indexed(project)?;
        let language = self.infer_language(file_path)?;
        let normalized = workspace::normalize_path(workspace_path, file_path);
        let table = self.load_table(project, language, &normalized)?;

        let roots: Vec<&Element> = if let Some(name) = symbol_name {
            table.elements.iter().filter(|e| e.name.contains(name) && e.range.start_line == start_line).collect()
        } else {
            table
                .elements
                .iter()
                .filter(|e| e.range.start_line <= start_line && e.range.end_line >= end_line)
                .collect()
        };

        if roots.is_empty() {
            return Err(QueryError::SymbolNotFound);
        }

        let mut nodes = Vec::new();
        for root in roots {
            if root.is_definition {
                let mut visited = HashSet::new();
                nodes.push(self.build_node(project, &table, root, NodeType::Definition, max_layer, &mut visited)?);
            } else if let Some(rel) = root.relations.iter().find(|r| r.kind == RelationKind::TypeDefinition) {
                if let Some((def_table, def_element)) = self.find_element(project, &rel.target_path, rel.target_range)? {
                    let mut visited = HashSet::new();
                    nodes.push(self.build_node(project, &def_table, &def_element, NodeType::Definition, max_layer, &mut visited)?);
                }
            }
        }
        Ok(nodes)
    }

    fn build_node(
        &self,
        project: &Project,
        table: &FileElementTable,
        element: &Element,
        node_type: NodeType,
        max_layer: u32,
        visited: &mut HashSet<(String, Range)>,
    ) -> QueryResult<RelationNode> {
        let mut node = RelationNode {
            file_path: table.path.clone(),
            symbol_name: element.name.clone(),
            position: element.range,
            node_type,
            children: Vec::new(),
        };

        let id = (table.path.clone(), element.range);
        if max_layer == 0 || !visited.insert(id) {
            return Ok(node);
        }

        match node_type {
            NodeType::Definition => {
                for rel in element.relations.iter().filter(|r| r.kind == RelationKind::Reference) {
                    if let Some((child_table, child_element)) = self.find_element(project, &rel.target_path, rel.target_range)? {
                        let child = self.build_node(project, &child_table, &child_element, NodeType::Reference, max_layer - 1, visited)?;
                        node.children.push(child);
                    }
                }
            }
            NodeType::Reference => {
                let has_reference = element.relations.iter().any(|r| r.kind == RelationKind::Reference);
                if !has_reference {
                    if let Some(enclosing) = table
                        .elements
                        .iter()
                        .find(|e| e.is_definition && e.range != element.range && e.range.contains_line(element.range.start_line))
                    {
                        let child = self.build_node(project, table, enclosing, NodeType::Definition, max_layer - 1, visited)?;
                        node.children.push(child);
                    }
                }
            }
        }
        Ok(node)
    }

    /// Locate the element at an exact `(path, range)`, scanning the
    /// project's `@path:` keyspace since the target's language isn't known
    /// up front.
    fn find_element(&self, project: &Project, path: &str, range: Range) -> QueryResult<Option<(FileElementTable, Element)>> {
        for item in self.store.iter(&project.uuid, keys::PATH_PREFIX, CancellationToken::new())? {
            let (_, bytes) = item?;
            let table: FileElementTable = decode_record(&bytes)?;
            if table.path != path {
                continue;
            }
            return Ok(table.elements.iter().find(|e| e.range == range).cloned().map(|e| (table, e)));
        }
        Ok(None)
    }

    /// `get_file_structure(workspace, file_path, kinds?)`.
    pub fn get_file_structure(
        &self,
        workspace_path: &Path,
        projects: &[Project],
        file_path: &Path,
        kinds: Option<&[ElementKind]>,
    ) -> QueryResult<Vec<FileStructureEntry>> {
        let project = self.project_for(projects, file_path)?;
        self.require_indexed(project)?;
        let language = self.infer_language(file_path)?;
        let normalized = workspace::normalize_path(workspace_path, file_path);
        let table = self.load_table(project, language, &normalized)?;

        Ok(table
            .elements
            .iter()
            .filter(|e| kinds.is_none_or(|ks| ks.contains(&e.kind)))
            .map(|e| FileStructureEntry { kind: e.kind, name: e.name.clone(), position: e.range, content: e.content.clone() })
            .collect())
    }

    /// Find the first indexed definition named `symbol_name` in `project`,
    /// scanning the `@path:` keyspace. Used when a caller has a symbol name
    /// but no file location, e.g. the HTTP reference search's `symbolName`
    /// form.
    pub fn find_definition_by_name(&self, project: &Project, symbol_name: &str) -> QueryResult<Option<Definition>> {
        self.require_indexed(project)?;
        for item in self.store.iter(&project.uuid, keys::PATH_PREFIX, CancellationToken::new())? {
            let (_, bytes) = item?;
            let table: FileElementTable = decode_record(&bytes)?;
            if let Some(element) = table.elements.iter().find(|e| e.is_definition && e.name == symbol_name) {
                return Ok(Some(Definition { path: table.path.clone(), name: element.name.clone(), range: element.range }));
            }
        }
        Ok(None)
    }

    /// `get_summary(workspace)`: aggregate file counts across every project.
    pub fn get_summary(&self, projects: &[Project]) -> QueryResult<Summary> {
        let mut total_files = 0;
        for project in projects {
            total_files += self.store.size(&project.uuid, keys::PATH_PREFIX)?;
        }
        Ok(Summary { total_files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::DependencyAnalyzer;
    use crate::store::MemStore;
    use crate::types::RelationKind;

    fn def_element(name: &str, range: Range) -> Element {
        Element::new(name, ElementKind::Function, range, true)
    }

    fn call_element(name: &str, range: Range) -> Element {
        Element::new(name, ElementKind::Call, range, false)
    }

    fn seeded_project(store: &MemStore) -> Project {
        let mut def_table = FileElementTable::new("a.rs", Language::Rust);
        def_table.elements.push(def_element("foo", Range::new(9, 0, 14, 1)));

        let mut call_table = FileElementTable::new("b.rs", Language::Rust);
        call_table.elements.push(call_element("foo", Range::new(21, 4, 21, 9)));

        let analyzer = DependencyAnalyzer::new(store);
        analyzer.phase_a("proj", std::slice::from_ref(&def_table)).unwrap();
        let mut tables = vec![def_table, call_table];
        analyzer.phase_b("proj", &mut tables).unwrap();

        for table in &tables {
            crate::store::put_record(store, "proj", &keys::path_key(table.language, &table.path), table).unwrap();
        }

        Project { uuid: "proj".into(), path: std::path::PathBuf::from("/ws"), language: Language::Rust, source_roots: vec![] }
    }

    #[test]
    fn query_definitions_resolves_call_to_definition() {
        let store = MemStore::new();
        let project = seeded_project(&store);
        let engine = QueryEngine::new(&store);

        let defs = engine
            .query_definitions(Path::new("/ws"), &[project], Path::new("/ws/b.rs"), Some(21), Some(21), None)
            .unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].path, "a.rs");
        assert_eq!(defs[0].name, "foo");
    }

    #[test]
    fn query_relations_descends_from_definition_to_reference() {
        let store = MemStore::new();
        let project = seeded_project(&store);
        let engine = QueryEngine::new(&store);

        let nodes = engine
            .query_relations(Path::new("/ws"), &[project], Path::new("/ws/a.rs"), 9, 14, Some("foo"), 3)
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, NodeType::Definition);
        assert_eq!(nodes[0].children.len(), 1);
        assert_eq!(nodes[0].children[0].node_type, NodeType::Reference);
        assert_eq!(nodes[0].children[0].file_path, "b.rs");
    }

    #[test]
    fn query_relations_reports_symbol_not_found() {
        let store = MemStore::new();
        let project = seeded_project(&store);
        let engine = QueryEngine::new(&store);

        let result = engine.query_relations(Path::new("/ws"), &[project], Path::new("/ws/a.rs"), 100, 100, Some("nope"), 2);
        assert!(matches!(result, Err(QueryError::SymbolNotFound)));
    }

    #[test]
    fn get_file_structure_filters_by_kind() {
        let store = MemStore::new();
        let project = seeded_project(&store);
        let engine = QueryEngine::new(&store);

        let all = engine.get_file_structure(Path::new("/ws"), &[project.clone()], Path::new("/ws/a.rs"), None).unwrap();
        assert_eq!(all.len(), 1);

        let filtered =
            engine.get_file_structure(Path::new("/ws"), &[project], Path::new("/ws/a.rs"), Some(&[ElementKind::Struct])).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn get_summary_counts_files_across_projects() {
        let store = MemStore::new();
        let project = seeded_project(&store);
        let engine = QueryEngine::new(&store);

        let summary = engine.get_summary(&[project]).unwrap();
        assert_eq!(summary.total_files, 2);
    }

    #[test]
    fn find_definition_by_name_locates_symbol_without_a_file_hint() {
        let store = MemStore::new();
        let project = seeded_project(&store);
        let engine = QueryEngine::new(&store);

        let found = engine.find_definition_by_name(&project, "foo").unwrap().unwrap();
        assert_eq!(found.path, "a.rs");

        let missing = engine.find_definition_by_name(&project, "nope").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn unindexed_project_is_a_hard_error() {
        let store = MemStore::new();
        let engine = QueryEngine::new(&store);
        let project = Project { uuid: "missing".into(), path: std::path::PathBuf::from("/ws"), language: Language::Rust, source_roots: vec![] };

        let result = engine.query_definitions(Path::new("/ws"), &[project], Path::new("/ws/a.rs"), None, None, None);
        assert!(matches!(result, Err(QueryError::ProjectNotIndexed { .. })));
    }

    #[test]
    fn relation_kind_is_exercised() {
        // sanity: RelationKind is re-exported and usable from this module's tests
        let _ = RelationKind::Definition;
    }
}
