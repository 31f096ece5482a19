//! Core data-model types shared by every component: the element table,
//! relations, and the language tag that keys the store's namespaces.
//!
//! These are the wire types persisted into the graph store and
//! produced by the source parser; component-internal types live in
//! their own modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Supported programming languages. A tagged enum, not a registry of
/// dynamic plugins — see DESIGN.md on parser dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
}

impl Language {
    /// Detect a language from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(Language::Rust),
            "py" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    /// Detect a language from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Default source extensions for this language, used to build the
    /// visit-pattern's `include_exts` default set.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Rust => &["rs"],
            Language::Python => &["py", "pyi"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::TypeScript => &["ts", "tsx", "mts", "cts"],
            Language::Go => &["go"],
            Language::Java => &["java"],
        }
    }

    /// The lowercase tag used in composite store keys (`@path:<tag>:...`).
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
        }
    }

    /// Parse a language back from its store-key tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "rust" => Some(Language::Rust),
            "python" => Some(Language::Python),
            "javascript" => Some(Language::JavaScript),
            "typescript" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A 0-based half-open-by-column, inclusive-by-line source range. Stored
/// 0-based; the HTTP layer's `to_position` is the single point that adds 1
/// for the 1-based API contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Range {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// True for a non-empty, internally consistent range (the parser's contract:
    /// `startLine <= endLine`, and `startCol <= endCol` on the same line).
    pub fn is_well_formed(&self) -> bool {
        if self.start_line > self.end_line {
            return false;
        }
        if self.start_line == self.end_line && self.start_col > self.end_col {
            return false;
        }
        true
    }

    /// Does this range strictly contain `line` (0-based)? Used to find an
    /// enclosing definition for a reference node during query resolution.
    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// The kind of a table element. Most variants are definitions of a
/// top-level or member construct; `Call` and `Reference` are non-definition
/// pseudo-kinds emitted at call sites and use sites respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Function,
    Method,
    Struct,
    Enum,
    Trait,
    Class,
    Interface,
    Module,
    Constant,
    Field,
    TypeAlias,
    Macro,
    Call,
    Reference,
}

impl ElementKind {
    /// Whether this kind, when emitted by a parser, denotes a top-level or
    /// member construct rather than a reference. Locals are never
    /// definitions, so there is no `Variable`/`Parameter` variant here.
    pub fn is_definition_kind(&self) -> bool {
        !matches!(self, ElementKind::Call | ElementKind::Reference)
    }

    /// The lowercase, snake_case label used on the wire (HTTP `types[]`
    /// filter, CLI `--kinds`) and parsed back by [`ElementKind::from_label`].
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::Function => "function",
            ElementKind::Method => "method",
            ElementKind::Struct => "struct",
            ElementKind::Enum => "enum",
            ElementKind::Trait => "trait",
            ElementKind::Class => "class",
            ElementKind::Interface => "interface",
            ElementKind::Module => "module",
            ElementKind::Constant => "constant",
            ElementKind::Field => "field",
            ElementKind::TypeAlias => "type_alias",
            ElementKind::Macro => "macro",
            ElementKind::Call => "call",
            ElementKind::Reference => "reference",
        }
    }

    /// Parse a kind back from its wire label, case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "function" => Some(ElementKind::Function),
            "method" => Some(ElementKind::Method),
            "struct" => Some(ElementKind::Struct),
            "enum" => Some(ElementKind::Enum),
            "trait" => Some(ElementKind::Trait),
            "class" => Some(ElementKind::Class),
            "interface" => Some(ElementKind::Interface),
            "module" => Some(ElementKind::Module),
            "constant" => Some(ElementKind::Constant),
            "field" => Some(ElementKind::Field),
            "typealias" | "type_alias" => Some(ElementKind::TypeAlias),
            "macro" => Some(ElementKind::Macro),
            "call" => Some(ElementKind::Call),
            "reference" => Some(ElementKind::Reference),
            _ => None,
        }
    }
}

/// The kind of a typed directed relation edge between two elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    Definition,
    TypeDefinition,
    Implementation,
    Reference,
}

/// An import statement recorded on a file element table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub name: String,
    pub source: String,
    pub kind: ImportKind,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportKind {
    Use,
    Import,
    Require,
    From,
}

/// A typed directed edge from one element to another. At a reference
/// element its relations point to the element's definition(s); at a
/// definition element its relations point to each referrer (denormalized
/// on both endpoints after Phase B, per the GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub target_path: String,
    pub target_name: String,
    pub target_range: Range,
}

/// One syntactic construct exposed by the parser: a definition, a
/// reference, or a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub kind: ElementKind,
    pub range: Range,
    pub is_definition: bool,
    pub signature: Option<String>,
    pub content: Option<String>,
    pub owner: Option<String>,
    pub relations: Vec<Relation>,
    /// Parameter count, known for callables; used by Phase B's arity
    /// disambiguation and the callee map.
    pub param_count: Option<u32>,
}

impl Element {
    pub fn new(name: impl Into<String>, kind: ElementKind, range: Range, is_definition: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            range,
            is_definition,
            signature: None,
            content: None,
            owner: None,
            relations: Vec::new(),
            param_count: None,
        }
    }
}

/// Persisted per-file record: one per source file that parses successfully.
/// `path` is normalized to forward-slash separators, workspace-relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileElementTable {
    pub path: String,
    pub language: Language,
    pub imports: Vec<Import>,
    pub elements: Vec<Element>,
}

impl FileElementTable {
    pub fn new(path: impl Into<String>, language: Language) -> Self {
        Self {
            path: path.into(),
            language,
            imports: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Ensure elements are in ascending start-line order, ties broken by
    /// start-column, per the parser's contract.
    pub fn sort_elements(&mut self) {
        self.elements.sort_by(|a, b| {
            (a.range.start_line, a.range.start_col).cmp(&(b.range.start_line, b.range.start_col))
        });
    }
}

/// One recorded definition inside a symbol-definition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRef {
    pub path: String,
    pub range: Range,
    pub element_kind: ElementKind,
    pub param_count: Option<u32>,
}

/// Per-language index from symbol name to its known definitions, the
/// resolver's cross-file lookup table (`@sym:<language>:<name>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDefinitionRecord {
    pub language: Language,
    pub name: String,
    pub definitions: Vec<DefinitionRef>,
}

impl SymbolDefinitionRecord {
    pub fn new(language: Language, name: impl Into<String>) -> Self {
        Self {
            language,
            name: name.into(),
            definitions: Vec::new(),
        }
    }

    /// Append a definition, deduplicating by `(path, range)` as Phase A
    /// requires.
    pub fn add_definition(&mut self, def: DefinitionRef) {
        if !self
            .definitions
            .iter()
            .any(|d| d.path == def.path && d.range == def.range)
        {
            self.definitions.push(def);
        }
    }

    /// Drop every definition whose path is in `deleted_paths`.
    pub fn retain_paths_not_in(&mut self, deleted_paths: &[String]) {
        self.definitions
            .retain(|d| !deleted_paths.iter().any(|p| p == &d.path));
    }
}

/// Auxiliary index from `(project, symbol_name, param_count)` to candidate
/// definitions, used to disambiguate call targets by arity
/// (`@callee:<project_uuid>:<symbol_name>:<param_count>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalleeMapRecord {
    pub symbol_name: String,
    pub param_count: u32,
    pub definitions: Vec<DefinitionRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_round_trips_through_tag() {
        for lang in [
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Go,
            Language::Java,
        ] {
            assert_eq!(Language::from_tag(lang.tag()), Some(lang));
        }
    }

    #[test]
    fn extension_detection() {
        assert_eq!(Language::from_extension("RS"), Some(Language::Rust));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("txt"), None);
    }

    #[test]
    fn range_well_formed() {
        assert!(Range::new(1, 0, 1, 5).is_well_formed());
        assert!(Range::new(1, 5, 3, 0).is_well_formed());
        assert!(!Range::new(3, 0, 1, 0).is_well_formed());
        assert!(!Range::new(1, 5, 1, 2).is_well_formed());
    }

    #[test]
    fn definition_record_dedups_by_path_and_range() {
        let mut rec = SymbolDefinitionRecord::new(Language::Rust, "foo");
        let def = DefinitionRef {
            path: "a.rs".into(),
            range: Range::new(0, 0, 2, 0),
            element_kind: ElementKind::Function,
            param_count: Some(1),
        };
        rec.add_definition(def.clone());
        rec.add_definition(def);
        assert_eq!(rec.definitions.len(), 1);
    }
}
