//! Composite key scheme: `@path:`, `@sym:`, `@callee:` prefixed, colon
//! separated UTF-8 strings. Any other prefix is rejected on construction.

use crate::error::{StoreError, StoreResult};
use crate::types::Language;

pub const PATH_PREFIX: &str = "@path";
pub const SYM_PREFIX: &str = "@sym";
pub const CALLEE_PREFIX: &str = "@callee";

/// `@path:<language>:<normalized_path>`
pub fn path_key(language: Language, normalized_path: &str) -> String {
    format!("{PATH_PREFIX}:{}:{normalized_path}", language.tag())
}

/// `@sym:<language>:<symbol_name>`
pub fn sym_key(language: Language, symbol_name: &str) -> String {
    format!("{SYM_PREFIX}:{}:{symbol_name}", language.tag())
}

/// `@callee:<project_uuid>:<symbol_name>:<param_count>`
pub fn callee_key(project_uuid: &str, symbol_name: &str, param_count: u32) -> String {
    format!("{CALLEE_PREFIX}:{project_uuid}:{symbol_name}:{param_count}")
}

/// Reject any key that doesn't start with one of the three known prefixes
/// followed by its separating colon, so e.g. `@pathological:...` isn't
/// mistaken for a `@path:` key.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let starts_with_known_prefix = [PATH_PREFIX, SYM_PREFIX, CALLEE_PREFIX]
        .iter()
        .any(|prefix| key.starts_with(*prefix) && key[prefix.len()..].starts_with(':'));
    if starts_with_known_prefix {
        Ok(())
    } else {
        Err(StoreError::InvalidKey { key: key.to_string() })
    }
}

/// Parse a `@path:<language>:<path>` key back into its parts.
pub fn parse_path_key(key: &str) -> Option<(Language, &str)> {
    let rest = key.strip_prefix(PATH_PREFIX)?.strip_prefix(':')?;
    let (lang_tag, path) = rest.split_once(':')?;
    let language = Language::from_tag(lang_tag)?;
    Some((language, path))
}

/// Parse a `@sym:<language>:<name>` key back into its parts.
pub fn parse_sym_key(key: &str) -> Option<(Language, &str)> {
    let rest = key.strip_prefix(SYM_PREFIX)?.strip_prefix(':')?;
    let (lang_tag, name) = rest.split_once(':')?;
    let language = Language::from_tag(lang_tag)?;
    Some((language, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_key_round_trips() {
        let key = path_key(Language::Rust, "src/main.rs");
        assert_eq!(parse_path_key(&key), Some((Language::Rust, "src/main.rs")));
    }

    #[test]
    fn sym_key_round_trips() {
        let key = sym_key(Language::Python, "foo");
        assert_eq!(parse_sym_key(&key), Some((Language::Python, "foo")));
    }

    #[test]
    fn callee_key_shape() {
        let key = callee_key("proj_abc", "foo", 2);
        assert_eq!(key, "@callee:proj_abc:foo:2");
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        assert!(validate_key("@bogus:rust:foo").is_err());
        assert!(validate_key(&path_key(Language::Go, "x.go")).is_ok());
    }

    #[test]
    fn prefix_must_be_colon_terminated() {
        assert!(validate_key("@pathological:rust:foo").is_err());
        assert!(validate_key("@symmetric:rust:foo").is_err());
        assert!(validate_key("@callees:p:foo:1").is_err());
    }
}
