//! Go source parser, tree-sitter based.

use std::path::Path;
use tree_sitter::{Node, Parser};

use super::parser::{check_recursion_depth, decode_utf8, safe_truncate_str, LanguageParser};
use crate::error::{ParseError, ParseResult};
use crate::types::{Element, ElementKind, FileElementTable, Import, ImportKind, Language, Range};

const MAX_SIGNATURE_BYTES: usize = 256;

pub struct GoParser;

impl LanguageParser for GoParser {
    fn language(&self) -> Language {
        Language::Go
    }

    fn parse_file(&self, path: &Path, bytes: &[u8]) -> ParseResult<FileElementTable> {
        let code = decode_utf8(bytes, path)?;

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| ParseError::ParseFailure {
                path: path.to_path_buf(),
                reason: format!("failed to load grammar: {e}"),
            })?;

        let tree = parser.parse(code, None).ok_or_else(|| ParseError::ParseFailure {
            path: path.to_path_buf(),
            reason: "tree-sitter returned no parse tree".into(),
        })?;

        let mut table = FileElementTable::new(path.to_string_lossy().replace('\\', "/"), Language::Go);
        extract_imports(tree.root_node(), code, &mut table.imports);
        extract_elements(tree.root_node(), code, path, &mut table.elements, 0);
        table.sort_elements();
        Ok(table)
    }
}

fn node_text<'a>(node: Node, code: &'a str) -> &'a str {
    code.get(node.byte_range()).unwrap_or("")
}

fn range_of(node: Node) -> Range {
    let start = node.start_position();
    let end = node.end_position();
    Range::new(start.row as u32, start.column as u32, end.row as u32, end.column as u32)
}

fn count_params(node: Node) -> Option<u32> {
    node.child_by_field_name("parameters")
        .map(|params| params.named_children(&mut params.walk()).count() as u32)
}

fn extract_imports(node: Node, code: &str, imports: &mut Vec<Import>) {
    if node.kind() == "import_spec" {
        if let Some(path_node) = node.child_by_field_name("path") {
            let raw = node_text(path_node, code);
            let trimmed = raw.trim_matches('"');
            let name = node
                .child_by_field_name("name")
                .map(|n| node_text(n, code).to_string())
                .unwrap_or_else(|| trimmed.rsplit('/').next().unwrap_or(trimmed).to_string());
            imports.push(Import {
                name,
                source: trimmed.to_string(),
                kind: ImportKind::Import,
                range: range_of(node),
            });
        }
        return;
    }
    for child in node.children(&mut node.walk()) {
        extract_imports(child, code, imports);
    }
}

fn extract_elements(node: Node, code: &str, path: &Path, elements: &mut Vec<Element>, depth: usize) {
    if !check_recursion_depth(depth, node, path) {
        return;
    }

    match node.kind() {
        "function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(elements, name_node, code, ElementKind::Function, node, count_params(node), None);
            }
        }
        "method_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let receiver_type = node
                    .child_by_field_name("receiver")
                    .and_then(receiver_type_name(code));
                push_definition(
                    elements,
                    name_node,
                    code,
                    ElementKind::Method,
                    node,
                    count_params(node),
                    receiver_type,
                );
            }
        }
        "type_spec" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let kind = match node.child_by_field_name("type").map(|t| t.kind()) {
                    Some("struct_type") => ElementKind::Struct,
                    Some("interface_type") => ElementKind::Interface,
                    _ => ElementKind::TypeAlias,
                };
                push_definition(elements, name_node, code, kind, node, None, None);
            }
        }
        "const_spec" | "var_spec" => {
            for name_node in node.children_by_field_name("name", &mut node.walk()) {
                push_definition(elements, name_node, code, ElementKind::Constant, node, None, None);
            }
        }
        "call_expression" => {
            if let Some(function_node) = node.child_by_field_name("function") {
                let callee_node = match function_node.kind() {
                    "selector_expression" => function_node.child_by_field_name("field"),
                    "identifier" => Some(function_node),
                    _ => None,
                };
                if let Some(callee_node) = callee_node {
                    let name = node_text(callee_node, code);
                    if !name.is_empty() {
                        let mut el = Element::new(name, ElementKind::Call, range_of(node), false);
                        if let Some(args) = node.child_by_field_name("arguments") {
                            el.param_count = Some(args.named_children(&mut args.walk()).count() as u32);
                        }
                        elements.push(el);
                    }
                }
            }
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        extract_elements(child, code, path, elements, depth + 1);
    }
}

fn receiver_type_name(code: &str) -> impl Fn(Node) -> Option<String> + '_ {
    move |receiver: Node| {
        let mut cursor = receiver.walk();
        for param in receiver.named_children(&mut cursor) {
            if param.kind() == "parameter_declaration" {
                if let Some(type_node) = param.child_by_field_name("type") {
                    let text = node_text(type_node, code).trim_start_matches('*');
                    return Some(text.to_string());
                }
            }
        }
        None
    }
}

fn push_definition(
    elements: &mut Vec<Element>,
    name_node: Node,
    code: &str,
    kind: ElementKind,
    decl_node: Node,
    param_count: Option<u32>,
    owner: Option<String>,
) {
    let name = node_text(name_node, code);
    if name.is_empty() {
        return;
    }
    let mut el = Element::new(name, kind, range_of(decl_node), true);
    el.signature = Some(safe_truncate_str(node_text(decl_node, code), MAX_SIGNATURE_BYTES).to_string());
    el.param_count = param_count;
    el.owner = owner;
    elements.push(el);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_and_struct_definitions() {
        let code = b"package main\n\ntype Foo struct{}\n\nfunc bar() {\n\tfoo()\n}\n";
        let table = GoParser.parse_file(Path::new("a.go"), code).unwrap();
        let names: Vec<_> = table.elements.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"bar"));
        assert!(names.contains(&"foo"));
    }

    #[test]
    fn method_has_receiver_as_owner() {
        let code = b"package main\n\ntype S struct{}\n\nfunc (s *S) M() {}\n";
        let table = GoParser.parse_file(Path::new("a.go"), code).unwrap();
        let m = table.elements.iter().find(|e| e.name == "M").unwrap();
        assert_eq!(m.kind, ElementKind::Method);
        assert_eq!(m.owner.as_deref(), Some("S"));
    }

    #[test]
    fn extracts_import_spec() {
        let code = b"package main\n\nimport \"fmt\"\n";
        let table = GoParser.parse_file(Path::new("a.go"), code).unwrap();
        assert!(table.imports.iter().any(|i| i.source == "fmt"));
    }
}
