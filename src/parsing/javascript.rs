//! JavaScript and TypeScript source parser, tree-sitter based. One struct
//! covers both dialects since their grammars share almost every node kind
//! we care about; only the grammar handle and the `Language` tag differ.

use std::path::Path;
use tree_sitter::{Node, Parser};

use super::parser::{check_recursion_depth, decode_utf8, safe_truncate_str, LanguageParser};
use crate::error::{ParseError, ParseResult};
use crate::types::{Element, ElementKind, FileElementTable, Import, ImportKind, Language, Range};

const MAX_SIGNATURE_BYTES: usize = 256;

enum Dialect {
    JavaScript,
    TypeScript,
}

pub struct JavaScriptParser {
    dialect: Dialect,
}

impl JavaScriptParser {
    pub fn javascript() -> Self {
        Self { dialect: Dialect::JavaScript }
    }

    pub fn typescript() -> Self {
        Self { dialect: Dialect::TypeScript }
    }
}

impl LanguageParser for JavaScriptParser {
    fn language(&self) -> Language {
        match self.dialect {
            Dialect::JavaScript => Language::JavaScript,
            Dialect::TypeScript => Language::TypeScript,
        }
    }

    fn parse_file(&self, path: &Path, bytes: &[u8]) -> ParseResult<FileElementTable> {
        let code = decode_utf8(bytes, path)?;

        let mut parser = Parser::new();
        let grammar = match self.dialect {
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        };
        parser.set_language(&grammar).map_err(|e| ParseError::ParseFailure {
            path: path.to_path_buf(),
            reason: format!("failed to load grammar: {e}"),
        })?;

        let tree = parser.parse(code, None).ok_or_else(|| ParseError::ParseFailure {
            path: path.to_path_buf(),
            reason: "tree-sitter returned no parse tree".into(),
        })?;

        let mut table = FileElementTable::new(path.to_string_lossy().replace('\\', "/"), self.language());
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
    node.child_by_field_name("parameters")
        .map(|params| params.named_children(&mut params.walk()).count() as u32)
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
            extract_import(node, code, table);
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(table, name_node, code, ElementKind::Function, node, count_params(node), None);
            }
        }
        "method_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(
                    table,
                    name_node,
                    code,
                    ElementKind::Method,
                    node,
                    count_params(node),
                    enclosing_class.map(|s| s.to_string()),
                );
            }
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, code);
                if !name.is_empty() {
                    push_definition(table, name_node, code, ElementKind::Class, node, None, None);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    for child in body.children(&mut body.walk()) {
                        extract(child, code, path, table, depth + 1, Some(name));
                    }
                }
                return;
            }
        }
        "interface_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(table, name_node, code, ElementKind::Interface, node, None, None);
            }
        }
        "type_alias_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                push_definition(table, name_node, code, ElementKind::TypeAlias, node, None, None);
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            for declarator in node.named_children(&mut node.walk()) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(value) = declarator.child_by_field_name("value") {
                    if matches!(value.kind(), "arrow_function" | "function_expression") {
                        if let Some(name_node) = declarator.child_by_field_name("name") {
                            push_definition(
                                table,
                                name_node,
                                code,
                                ElementKind::Function,
                                declarator,
                                count_params(value),
                                None,
                            );
                        }
                    }
                }
            }
        }
        "call_expression" => {
            if let Some(function_node) = node.child_by_field_name("function") {
                let callee_node = match function_node.kind() {
                    "member_expression" => function_node.child_by_field_name("property"),
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

fn extract_import(node: Node, code: &str, table: &mut FileElementTable) {
    let source = node
        .child_by_field_name("source")
        .map(|s| node_text(s, code).trim_matches(|c| c == '"' || c == '\'').to_string())
        .unwrap_or_default();

    let Some(clause) = node.child_by_field_name("import_clause") else {
        return;
    };

    for child in clause.children(&mut clause.walk()) {
        match child.kind() {
            "identifier" => table.imports.push(Import {
                name: node_text(child, code).to_string(),
                source: source.clone(),
                kind: ImportKind::Import,
                range: range_of(node),
            }),
            "namespace_import" => table.imports.push(Import {
                name: "*".to_string(),
                source: source.clone(),
                kind: ImportKind::Import,
                range: range_of(node),
            }),
            "named_imports" => {
                for spec in child.named_children(&mut child.walk()) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let name_node = spec.child_by_field_name("alias").or_else(|| spec.child_by_field_name("name"));
                    if let Some(name_node) = name_node {
                        table.imports.push(Import {
                            name: node_text(name_node, code).to_string(),
                            source: source.clone(),
                            kind: ImportKind::Import,
                            range: range_of(node),
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_definition(
    table: &mut FileElementTable,
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
    table.elements.push(el);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_and_class_definitions() {
        let code = b"class Foo {\n  bar() {\n    baz();\n  }\n}\n";
        let table = JavaScriptParser::javascript().parse_file(Path::new("a.js"), code).unwrap();
        let names: Vec<_> = table.elements.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"bar"));
        assert!(names.contains(&"baz"));
    }

    #[test]
    fn method_has_owner_set_to_class_name() {
        let code = b"class Foo {\n  bar() {}\n}\n";
        let table = JavaScriptParser::javascript().parse_file(Path::new("a.js"), code).unwrap();
        let bar = table.elements.iter().find(|e| e.name == "bar").unwrap();
        assert_eq!(bar.owner.as_deref(), Some("Foo"));
    }

    #[test]
    fn arrow_function_assigned_to_const_is_a_function_definition() {
        let code = b"const add = (a, b) => a + b;\n";
        let table = JavaScriptParser::javascript().parse_file(Path::new("a.js"), code).unwrap();
        let add = table.elements.iter().find(|e| e.name == "add").unwrap();
        assert_eq!(add.kind, ElementKind::Function);
    }

    #[test]
    fn extracts_named_and_default_imports() {
        let code = b"import React from 'react';\nimport { useState, useEffect } from 'react';\n";
        let table = JavaScriptParser::javascript().parse_file(Path::new("a.js"), code).unwrap();
        assert!(table.imports.iter().any(|i| i.name == "React"));
        assert!(table.imports.iter().any(|i| i.name == "useState"));
    }

    #[test]
    fn typescript_dialect_parses_interface_declarations() {
        let code = b"interface Point {\n  x: number;\n  y: number;\n}\n";
        let table = JavaScriptParser::typescript().parse_file(Path::new("a.ts"), code).unwrap();
        assert!(table.elements.iter().any(|e| e.name == "Point" && e.kind == ElementKind::Interface));
        assert_eq!(table.language, Language::TypeScript);
    }
}
