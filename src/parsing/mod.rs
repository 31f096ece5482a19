//! Source Parser: for one `(path, bytes, language)`, produce a
//! `FileElementTable` — imports, elements, and their ranges — or fail with
//! `UnsupportedLanguage`/`ParseFailure`. Dispatches to a per-language
//! tree-sitter binding through a registry keyed by `Language`.

mod factory;
mod go;
mod javascript;
mod parser;
mod python;
mod rust;

pub use factory::{parse_file, parser_for};
pub use go::GoParser;
pub use javascript::JavaScriptParser;
pub use parser::{
    check_recursion_depth, decode_utf8, safe_substring_window, safe_truncate_str,
    truncate_for_display, LanguageParser, MAX_AST_DEPTH,
};
pub use python::PythonParser;
pub use rust::RustParser;
