//! Utility functions shared by the expression parser, data loader and CLI

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn bracket_index_regex() -> &'static Regex {
    static BRACKET_INDEX: OnceLock<Regex> = OnceLock::new();
    BRACKET_INDEX.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("bracket index pattern is valid"))
}

/// Rewrite bracketed numeric indices as dot segments: `a[0].b` -> `a.0.b`
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    bracket_index_regex().replace_all(path, ".$1")
}

/// Strip matching surrounding quotes (single or double).
/// Returns the inner text and whether the value was quoted.
pub fn clean_and_quote_value(value: &str) -> (&str, bool) {
    let trimmed = value.trim();
    let was_quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));

    if was_quoted {
        (&trimmed[1..trimmed.len() - 1], true)
    } else {
        (trimmed, false)
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Byte offset of the first occurrence of `needle` that is not inside a quoted
/// string, searching from `from`.
pub fn find_outside_quotes(text: &str, needle: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;

    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None => {
                if i >= from && text[i..].starts_with(needle) {
                    return Some(i);
                }
            }
        }
    }

    None
}

/// Split a `NAME=VALUE` definition from the command line or config
pub fn parse_define(define: &str) -> Option<(&str, &str)> {
    let (name, value) = define.split_once('=')?;
    let name = name.trim();
    if is_valid_identifier(name) {
        Some((name, value))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("items[0].name"), "items.0.name");
        assert_eq!(normalize_path("a[1][2]"), "a.1.2");
        assert_eq!(normalize_path("plain.path"), "plain.path");
        assert_eq!(normalize_path("a[x]"), "a[x]");
    }

    #[test]
    fn test_clean_and_quote_value() {
        assert_eq!(clean_and_quote_value(r#""hello world""#), ("hello world", true));
        assert_eq!(clean_and_quote_value("'active'"), ("active", true));
        assert_eq!(clean_and_quote_value("  unquoted "), ("unquoted", false));
        assert_eq!(clean_and_quote_value("'"), ("'", false));
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("item"));
        assert!(is_valid_identifier("_private9"));
        assert!(!is_valid_identifier("9lives"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn test_find_outside_quotes() {
        assert_eq!(find_outside_quotes("a ? 'b?' : c", "?", 0), Some(2));
        assert_eq!(find_outside_quotes("a ? 'x:y' : c", ":", 4), Some(10));
        assert_eq!(find_outside_quotes("'only ? quoted'", "?", 0), None);
    }

    #[test]
    fn test_parse_define() {
        assert_eq!(parse_define("title=Hello=World"), Some(("title", "Hello=World")));
        assert_eq!(parse_define("bad name=x"), None);
        assert_eq!(parse_define("novalue"), None);
    }
}
