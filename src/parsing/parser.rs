//! The `LanguageParser` trait: the single-entry-point contract the
//! orchestrator and query engine rely on, and the
//! never-panic-on-malformed-input helpers every implementation shares.

use std::path::Path;
use tree_sitter::Node;

use crate::error::{ParseError, ParseResult};
use crate::types::{FileElementTable, Language};

/// One parser per language. `parse_file` never panics; malformed input
/// becomes a `ParseError::ParseFailure` the orchestrator folds into batch
/// metrics rather than propagating.
pub trait LanguageParser: Send + Sync {
    fn language(&self) -> Language;

    fn parse_file(&self, path: &Path, bytes: &[u8]) -> ParseResult<FileElementTable>;
}

/// Maximum recursion depth for AST traversal, protecting against stack
/// overflow on pathologically nested source (huge array literals, deeply
/// chained calls). 500 levels at ~4KB/frame stays well under a 2MB stack.
pub const MAX_AST_DEPTH: usize = 500;

/// Centralized depth guard every recursive extractor calls at its entry
/// point. Returns `false` when the caller should stop descending.
#[inline]
pub fn check_recursion_depth(depth: usize, node: Node, path: &Path) -> bool {
    if depth > MAX_AST_DEPTH {
        tracing::warn!(
            path = %path.display(),
            line = node.start_position().row + 1,
            "maximum AST depth ({}) exceeded, skipping subtree",
            MAX_AST_DEPTH
        );
        return false;
    }
    true
}

/// Slice `s` at the last valid UTF-8 character boundary at or before
/// `max_bytes`, never panicking on a multi-byte boundary.
#[inline]
pub fn safe_truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &s[..boundary]
}

/// A window of at most `window_size` bytes ending at `end_byte`, UTF-8
/// boundary safe in both directions.
pub fn safe_substring_window(code: &str, end_byte: usize, window_size: usize) -> &str {
    let end = end_byte.min(code.len());
    let start_raw = end.saturating_sub(window_size);
    let start = if start_raw > 0 && !code.is_char_boundary(start_raw) {
        (start_raw..=start_raw.saturating_add(3).min(end))
            .find(|&i| code.is_char_boundary(i))
            .unwrap_or(end)
    } else {
        start_raw
    };
    &code[start..end]
}

/// A truncated preview with a trailing ellipsis when truncation occurred.
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    let truncated = safe_truncate_str(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

/// Decode `bytes` as UTF-8, mapping an invalid encoding to `ParseFailure`
/// rather than letting a caller call `.unwrap()` on a source file that may
/// be binary or mis-encoded.
pub fn decode_utf8<'a>(bytes: &'a [u8], path: &Path) -> ParseResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8 {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_truncate_does_not_split_multibyte_chars() {
        let text = "Status: 🔍 Active";
        let result = safe_truncate_str(text, 10);
        assert_eq!(result, "Status: ");
        assert!(result.len() <= 10);
    }

    #[test]
    fn safe_truncate_exact_boundary() {
        assert_eq!(safe_truncate_str("Hello, World!", 7), "Hello, ");
    }

    #[test]
    fn truncate_for_display_adds_ellipsis() {
        assert_eq!(truncate_for_display("abcdefghij", 5), "abcde...");
        assert_eq!(truncate_for_display("abc", 5), "abc");
    }

    #[test]
    fn decode_utf8_rejects_invalid_bytes() {
        let bytes = vec![0xff, 0xfe, 0x00];
        let result = decode_utf8(&bytes, Path::new("x.bin"));
        assert!(matches!(result, Err(ParseError::InvalidUtf8 { .. })));
    }
}
