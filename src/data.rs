//! Data context loading
//!
//! Data comes in as JSON or TOML text. JSON exported from a Mongo shell often
//! carries constructor literals such as `ObjectId('...')` that are not valid
//! JSON, so those are rewritten to plain strings and numbers before parsing.

use crate::error::{Result, TemplateError};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    #[default]
    Json,
    Toml,
}

impl DataFormat {
    /// Format by file extension; anything but `.toml` is read as JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => DataFormat::Toml,
            _ => DataFormat::Json,
        }
    }
}

struct ShellLiterals {
    quoted: Regex,
    integer: Regex,
    timestamp: Regex,
}

fn shell_literals() -> &'static ShellLiterals {
    static PATTERNS: OnceLock<ShellLiterals> = OnceLock::new();
    PATTERNS.get_or_init(|| ShellLiterals {
        quoted: Regex::new(r#"(?:ObjectId|ISODate)\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
            .expect("quoted literal pattern is valid"),
        integer: Regex::new(r"(?:NumberLong|NumberInt)\s*\(\s*(\d+)\s*\)")
            .expect("integer literal pattern is valid"),
        timestamp: Regex::new(r"Timestamp\s*\(\s*(\d+)\s*,\s*\d+\s*\)")
            .expect("timestamp literal pattern is valid"),
    })
}

/// Rewrite Mongo-shell constructors: `ObjectId('x')` and `ISODate('x')`
/// become `"x"`, `NumberLong(n)`, `NumberInt(n)` and `Timestamp(n, m)` become `n`.
pub fn clean_shell_literals(text: &str) -> Cow<'_, str> {
    let patterns = shell_literals();
    let mut cleaned = patterns.quoted.replace_all(text, "\"$1\"");
    for pattern in [&patterns.integer, &patterns.timestamp] {
        let replaced = match pattern.replace_all(&cleaned, "$1") {
            Cow::Owned(replaced) => Some(replaced),
            Cow::Borrowed(_) => None,
        };
        if let Some(replaced) = replaced {
            cleaned = Cow::Owned(replaced);
        }
    }
    cleaned
}

/// Parse a data context. The top-level value must be an object.
pub fn parse_data(text: &str, format: DataFormat) -> Result<Value> {
    let value = match format {
        DataFormat::Json => {
            let cleaned = clean_shell_literals(text);
            serde_json::from_str::<Value>(&cleaned).map_err(|e| TemplateError::InvalidFormat {
                message: format!("Invalid JSON data: {}", e),
            })?
        }
        DataFormat::Toml => {
            let table: toml::Table = toml::from_str(text).map_err(|e| TemplateError::InvalidFormat {
                message: format!("Invalid TOML data: {}", e),
            })?;
            serde_json::to_value(table).map_err(|e| TemplateError::InvalidFormat {
                message: format!("TOML data cannot be represented as JSON: {}", e),
            })?
        }
    };

    if !value.is_object() {
        return Err(TemplateError::invalid_context("data must be a JSON object at the top level"));
    }
    Ok(value)
}

pub fn load_data_file<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| TemplateError::FileNotFound {
        path: format!("Data file {}: {}", path.display(), e),
    })?;

    log::info!("Loaded data from {}", path.display());
    parse_data(&text, DataFormat::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_clean_shell_literals() {
        let text = r#"{"_id": ObjectId("5f1a"), "at": ISODate( '2024-01-02T00:00:00Z' ), "n": NumberLong(42), "i": NumberInt( 7 ), "ts": Timestamp(1700000000, 1)}"#;
        assert_eq!(
            clean_shell_literals(text),
            r#"{"_id": "5f1a", "at": "2024-01-02T00:00:00Z", "n": 42, "i": 7, "ts": 1700000000}"#
        );
        assert!(matches!(clean_shell_literals(r#"{"a": 1}"#), Cow::Borrowed(_)));
    }

    #[test]
    fn test_parse_shell_json() {
        let value = parse_data(r#"{"_id": ObjectId('abc'), "count": NumberInt(3)}"#, DataFormat::Json).unwrap();
        assert_eq!(value, json!({"_id": "abc", "count": 3}));
    }

    #[test]
    fn test_parse_toml() {
        let value = parse_data("name = \"Tom\"\n[order]\ntotal = 12.5\n", DataFormat::Toml).unwrap();
        assert_eq!(value, json!({"name": "Tom", "order": {"total": 12.5}}));
    }

    #[test]
    fn test_top_level_must_be_object() {
        assert!(matches!(
            parse_data("[1, 2]", DataFormat::Json),
            Err(TemplateError::InvalidContext { .. })
        ));
        assert!(matches!(
            parse_data("{not json", DataFormat::Json),
            Err(TemplateError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_load_data_file_by_extension() {
        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json_file, r#"{{"items": [1, 2]}}"#).unwrap();
        assert_eq!(load_data_file(json_file.path()).unwrap(), json!({"items": [1, 2]}));

        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(toml_file, "flag = true").unwrap();
        assert_eq!(load_data_file(toml_file.path()).unwrap(), json!({"flag": true}));

        assert!(matches!(
            load_data_file("/definitely/not/here.json"),
            Err(TemplateError::FileNotFound { .. })
        ));
    }
}
