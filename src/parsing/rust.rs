//! Rust source parser, tree-sitter based.

use std::path::Path;
use tree_sitter::{Node, Parser};

use super::parser::{check_recursion_depth, decode_utf8, safe_truncate_str, LanguageParser};
use crate::error::{ParseError, ParseResult};
use crate::types::{Element, ElementKind, FileElementTable, Import, ImportKind, Language, Range};

const MAX_SIGNATURE_BYTES: usize = 256;

pub struct RustParser;

impl LanguageParser for RustParser {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn parse_file(&self, path: &Path, bytes: &[u8]) -> ParseResult<FileElementTable> {
        let code = decode_utf8(bytes, path)?;

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| ParseError::ParseFailure {
                path: path.to_path_buf(),
                reason: format!("failed to load grammar: {e}"),
            })?;

        let tree = parser.parse(code, None).ok_or_else(|| ParseError::ParseFailure {
            path: path.to_path_buf(),
            reason: "tree-sitter returned no parse tree".into(),
        })?;

        let mut table = FileElementTable::new(path.to_string_lossy().replace('\\', "/"), Language::Rust);
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
    if node.kind() == "use_declaration" {
        if let Some(use_tree) = node.child(1) {
            collect_use_tree(use_tree, code, String::new(), node, imports);
        }
        return;
    }
    for child in node.children(&mut node.walk()) {
        extract_imports(child, code, imports);
    }
}

fn collect_use_tree(node: Node, code: &str, prefix: String, decl_node: Node, imports: &mut Vec<Import>) {
    match node.kind() {
        "scoped_identifier" | "identifier" => {
            let segment = node_text(node, code);
            let path = if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{prefix}::{segment}")
            };
            imports.push(Import {
                name: path.rsplit("::").next().unwrap_or(&path).to_string(),
                source: path,
                kind: ImportKind::Use,
                range: range_of(decl_node),
            });
        }
        "use_as_clause" => {
            if let (Some(path_node), Some(alias_node)) =
                (node.child_by_field_name("path"), node.child_by_field_name("alias"))
            {
                let source = node_text(path_node, code).to_string();
                imports.push(Import {
                    name: node_text(alias_node, code).to_string(),
                    source,
                    kind: ImportKind::Use,
                    range: range_of(decl_node),
                });
            }
        }
        "use_wildcard" => {
            imports.push(Import {
                name: "*".to_string(),
                source: prefix,
                kind: ImportKind::Use,
                range: range_of(decl_node),
            });
        }
        "use_list" => {
            for child in node.named_children(&mut node.walk()) {
                collect_use_tree(child, code, prefix.clone(), decl_node, imports);
            }
        }
        "scoped_use_list" => {
            let new_prefix = node
                .child_by_field_name("path")
                .map(|p| node_text(p, code).to_string())
                .unwrap_or(prefix);
            if let Some(list) = node.child_by_field_name("list") {
                for child in list.named_children(&mut list.walk()) {
                    collect_use_tree(child, code, new_prefix.clone(), decl_node, imports);
                }
            }
        }
        _ => {
            for child in node.named_children(&mut node.walk()) {
                collect_use_tree(child, code, prefix.clone(), decl_node, imports);
            }
        }
    }
}

fn extract_elements(node: Node, code: &str, path: &Path, elements: &mut Vec<Element>, depth: usize) {
    if !check_recursion_depth(depth, node, path) {
        return;
    }

    match node.kind() {
        "function_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let mut in_impl = false;
                let mut parent = node.parent();
                while let Some(p) = parent {
                    if p.kind() == "impl_item" {
                        in_impl = true;
                        break;
                    }
                    parent = p.parent();
                }
                let kind = if in_impl { ElementKind::Method } else { ElementKind::Function };
                push_definition(elements, name_node, code, kind, node, count_params(node));
            }
        }
        "struct_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(elements, name_node, code, ElementKind::Struct, node, None);
            }
        }
        "enum_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(elements, name_node, code, ElementKind::Enum, node, None);
            }
        }
        "trait_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(elements, name_node, code, ElementKind::Trait, node, None);
            }
        }
        "type_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(elements, name_node, code, ElementKind::TypeAlias, node, None);
            }
        }
        "const_item" | "static_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(elements, name_node, code, ElementKind::Constant, node, None);
            }
        }
        "macro_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(elements, name_node, code, ElementKind::Macro, node, None);
            }
        }
        "call_expression" => {
            if let Some(function_node) = node.child_by_field_name("function") {
                let callee_node = tail_identifier(function_node);
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

fn tail_identifier(node: Node) -> Option<Node> {
    match node.kind() {
        "identifier" => Some(node),
        "field_expression" => node.child_by_field_name("field"),
        "scoped_identifier" => node.child_by_field_name("name").or(Some(node)),
        _ => node.child_by_field_name("field").or_else(|| {
            let mut cursor = node.walk();
            node.children(&mut cursor).last()
        }),
    }
}

fn push_definition(
    elements: &mut Vec<Element>,
    name_node: Node,
    code: &str,
    kind: ElementKind,
    decl_node: Node,
    param_count: Option<u32>,
) {
    let name = node_text(name_node, code);
    if name.is_empty() {
        return;
    }
    let mut el = Element::new(name, kind, range_of(decl_node), true);
    el.signature = Some(safe_truncate_str(node_text(decl_node, code), MAX_SIGNATURE_BYTES).to_string());
    el.param_count = param_count;
    elements.push(el);
}
