//! Python source parser, tree-sitter based.

use std::path::Path;
use tree_sitter::{Node, Parser};

use super::parser::{check_recursion_depth, decode_utf8, safe_truncate_str, LanguageParser};
use crate::error::{ParseError, ParseResult};
use crate::types::{Element, ElementKind, FileElementTable, Import, ImportKind, Language, Range};

const MAX_SIGNATURE_BYTES: usize = 256;

pub struct PythonParser;

impl LanguageParser for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse_file(&self, path: &Path, bytes: &[u8]) -> ParseResult<FileElementTable> {
        let code = decode_utf8(bytes, path)?;

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseError::ParseFailure {
                path: path.to_path_buf(),
                reason: format!("failed to load grammar: {e}"),
            })?;

        let tree = parser.parse(code, None).ok_or_else(|| ParseError::ParseFailure {
            path: path.to_path_buf(),
            reason: "tree-sitter returned no parse tree".into(),
        })?;

        let mut table = FileElementTable::new(path.to_string_lossy().replace('\\', "/"), Language::Python);
        extract(tree.root_node(), code, path, &mut table, 0, None);
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
    node.child_by_field_name("parameters").map(|params| {
        params
            .named_children(&mut params.walk())
            .filter(|c| c.kind() != "comment")
            .count() as u32
    })
}

fn extract(
    node: Node,
    code: &str,
    path: &Path,
    table: &mut FileElementTable,
    depth: usize,
    enclosing_class: Option<&str>,
) {
    if !check_recursion_depth(depth, node, path) {
        return;
    }

    match node.kind() {
        "import_statement" => {
            for child in node.named_children(&mut node.walk()) {
                push_dotted_import(child, code, node, &mut table.imports);
            }
        }
        "import_from_statement" => {
            let module = node
                .child_by_field_name("module_name")
                .map(|m| node_text(m, code).to_string())
                .unwrap_or_default();
            let mut cursor = node.walk();
            let mut saw_name = false;
            for child in node.named_children(&mut cursor) {
                if child.kind() == "dotted_name" && !saw_name {
                    saw_name = true;
                    continue;
                }
                if child.kind() == "dotted_name" || child.kind() == "identifier" {
                    let name = node_text(child, code).to_string();
                    table.imports.push(Import {
                        name,
                        source: module.clone(),
                        kind: ImportKind::From,
                        range: range_of(node),
                    });
                } else if child.kind() == "aliased_import" {
                    if let Some(alias) = child.child_by_field_name("alias") {
                        table.imports.push(Import {
                            name: node_text(alias, code).to_string(),
                            source: module.clone(),
                            kind: ImportKind::From,
                            range: range_of(node),
                        });
                    }
                } else if child.kind() == "wildcard_import" {
                    table.imports.push(Import {
                        name: "*".to_string(),
                        source: module.clone(),
                        kind: ImportKind::From,
                        range: range_of(node),
                    });
                }
            }
        }
        "function_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, code);
                if !name.is_empty() {
                    let kind = if enclosing_class.is_some() { ElementKind::Method } else { ElementKind::Function };
                    let mut el = Element::new(name, kind, range_of(node), true);
                    el.signature = Some(safe_truncate_str(signature_line(node, code), MAX_SIGNATURE_BYTES).to_string());
                    el.param_count = count_params(node);
                    el.owner = enclosing_class.map(|s| s.to_string());
                    table.elements.push(el);
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                for child in body.children(&mut body.walk()) {
                    extract(child, code, path, table, depth + 1, enclosing_class);
                }
            }
            return;
        }
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, code);
                if !name.is_empty() {
                    let mut el = Element::new(name, ElementKind::Class, range_of(node), true);
                    el.signature = Some(safe_truncate_str(signature_line(node, code), MAX_SIGNATURE_BYTES).to_string());
                    table.elements.push(el);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    for child in body.children(&mut body.walk()) {
                        extract(child, code, path, table, depth + 1, Some(name));
                    }
                }
                return;
            }
        }
        "call" => {
            if let Some(function_node) = node.child_by_field_name("function") {
                let callee = match function_node.kind() {
                    "attribute" => function_node.child_by_field_name("attribute"),
                    "identifier" => Some(function_node),
                    _ => None,
                };
                if let Some(callee) = callee {
                    let name = node_text(callee, code);
                    if !name.is_empty() {
                        let mut el = Element::new(name, ElementKind::Call, range_of(node), false);
                        if let Some(args) = node.child_by_field_name("arguments") {
                            el.param_count = Some(
                                args.named_children(&mut args.walk())
                                    .filter(|c| c.kind() != "comment")
                                    .count() as u32,
                            );
                        }
                        table.elements.push(el);
                    }
                }
            }
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        extract(child, code, path, table, depth + 1, enclosing_class);
    }
}

fn push_dotted_import(node: Node, code: &str, decl_node: Node, imports: &mut Vec<Import>) {
    match node.kind() {
        "dotted_name" => {
            let path = node_text(node, code).to_string();
            let name = path.rsplit('.').next().unwrap_or(&path).to_string();
            imports.push(Import {
                name,
                source: path,
                kind: ImportKind::Import,
                range: range_of(decl_node),
            });
        }
        "aliased_import" => {
            if let (Some(name_node), Some(alias_node)) =
                (node.child_by_field_name("name"), node.child_by_field_name("alias"))
            {
                imports.push(Import {
                    name: node_text(alias_node, code).to_string(),
                    source: node_text(name_node, code).to_string(),
                    kind: ImportKind::Import,
                    range: range_of(decl_node),
                });
            }
        }
        _ => {}
    }
}

fn signature_line<'a>(node: Node, code: &'a str) -> &'a str {
    let text = node_text(node, code);
    text.split(':').next().unwrap_or(text).lines().next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_and_class_definitions() {
        let code = b"class Foo:\n    def bar(self):\n        baz()\n";
        let table = PythonParser.parse_file(Path::new("a.py"), code).unwrap();
        let names: Vec<_> = table.elements.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"bar"));
        assert!(names.contains(&"baz"));
    }

    #[test]
    fn method_inside_class_has_owner_set() {
        let code = b"class Foo:\n    def bar(self):\n        pass\n";
        let table = PythonParser.parse_file(Path::new("a.py"), code).unwrap();
        let bar = table.elements.iter().find(|e| e.name == "bar").unwrap();
        assert_eq!(bar.kind, ElementKind::Method);
        assert_eq!(bar.owner.as_deref(), Some("Foo"));
    }

    #[test]
    fn extracts_import_and_from_import() {
        let code = b"import os\nfrom typing import List\n";
        let table = PythonParser.parse_file(Path::new("a.py"), code).unwrap();
        assert!(table.imports.iter().any(|i| i.name == "os"));
        assert!(table.imports.iter().any(|i| i.name == "List" && i.source == "typing"));
    }
}
