//! Value coercion rules shared by conditions, comparisons and substitution
//!
//! Context values are plain `serde_json::Value`s. A lookup that falls off the
//! data (missing key, index out of range, path through `null`) is represented
//! as `None` ("absent"), which is distinct from an explicit `null`.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// A context mapping: identifier -> value
pub type Mapping = Map<String, Value>;

/// Comparison operators understood by conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    /// Operators in matching order: longer spellings before their prefixes
    pub const ALL: [(&'static str, CompareOp); 8] = [
        ("===", CompareOp::StrictEq),
        ("!==", CompareOp::StrictNe),
        ("==", CompareOp::LooseEq),
        ("!=", CompareOp::LooseNe),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::StrictEq => "===",
            CompareOp::StrictNe => "!==",
            CompareOp::LooseEq => "==",
            CompareOp::LooseNe => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }

    /// Apply the operator to two (possibly absent) operands
    pub fn apply(self, left: Option<&Value>, right: Option<&Value>) -> bool {
        match self {
            CompareOp::StrictEq => strict_equals(left, right),
            CompareOp::StrictNe => !strict_equals(left, right),
            CompareOp::LooseEq => loose_equals(left, right),
            CompareOp::LooseNe => !loose_equals(left, right),
            CompareOp::Lt => matches!(compare_order(left, right), Some(Ordering::Less)),
            CompareOp::Gt => matches!(compare_order(left, right), Some(Ordering::Greater)),
            CompareOp::Le => matches!(
                compare_order(left, right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            CompareOp::Ge => matches!(
                compare_order(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// Canonical decimal text for a number: integers stay integers and
/// integral floats drop their fraction (`2.0` -> `2`).
pub fn format_number(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        i.to_string()
    } else if let Some(u) = number.as_u64() {
        u.to_string()
    } else {
        number.as_f64().map(|f| f.to_string()).unwrap_or_default()
    }
}

/// Text inserted into the output for a value. Absent and `null` render empty,
/// mappings and sequences render as compact JSON.
pub fn to_display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => format_number(n),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Loose truthiness: absent, `null`, `false`, `0` and `""` are false
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Numeric coercion used by loose equality and ordering.
/// Strings coerce only when they hold a plain decimal number (or are blank).
pub fn to_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(0.0);
            }
            let numeric = trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
            if numeric {
                trimmed.parse::<f64>().ok()
            } else {
                None
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Equality without coercion. Numbers compare by value (`1 === 1.0`),
/// everything else structurally. Absent only equals absent.
pub fn strict_equals(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Equality with coercion: absent and `null` are equal to each other only,
/// mixed number/string/boolean operands compare numerically.
pub fn loose_equals(left: Option<&Value>, right: Option<&Value>) -> bool {
    let nullish = |v: Option<&Value>| matches!(v, None | Some(Value::Null));
    if nullish(left) || nullish(right) {
        return nullish(left) && nullish(right);
    }
    match (left, right) {
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        (Some(Value::Array(_) | Value::Object(_)), _) | (_, Some(Value::Array(_) | Value::Object(_))) => {
            strict_equals(left, right)
        }
        _ => match (to_number(left), to_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Ordering for `< > <= >=`: lexicographic for two strings, numeric when both
/// sides coerce to numbers, otherwise unordered (every comparison is false).
pub fn compare_order(left: Option<&Value>, right: Option<&Value>) -> Option<Ordering> {
    if let (Some(Value::String(a)), Some(Value::String(b))) = (left, right) {
        return Some(a.cmp(b));
    }
    let a = to_number(left)?;
    let b = to_number(right)?;
    a.partial_cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_number() {
        assert_eq!(to_display(Some(&json!(42))), "42");
        assert_eq!(to_display(Some(&json!(2.0))), "2");
        assert_eq!(to_display(Some(&json!(1.5))), "1.5");
        assert_eq!(to_display(Some(&json!(-3))), "-3");
    }

    #[test]
    fn test_display_of_containers_and_missing() {
        assert_eq!(to_display(None), "");
        assert_eq!(to_display(Some(&Value::Null)), "");
        assert_eq!(to_display(Some(&json!(true))), "true");
        assert_eq!(to_display(Some(&json!([1, "a"]))), r#"[1,"a"]"#);
        assert_eq!(to_display(Some(&json!({"k": 1}))), r#"{"k":1}"#);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!("0"))));
        assert!(is_truthy(Some(&json!([]))));
        assert!(is_truthy(Some(&json!({}))));
    }

    #[test]
    fn test_strict_vs_loose_equality() {
        assert!(strict_equals(Some(&json!(1)), Some(&json!(1.0))));
        assert!(!strict_equals(Some(&json!("1")), Some(&json!(1))));
        assert!(loose_equals(Some(&json!("1")), Some(&json!(1))));
        assert!(loose_equals(None, Some(&Value::Null)));
        assert!(!strict_equals(None, Some(&Value::Null)));
        assert!(!loose_equals(Some(&json!(0)), None));
        assert!(strict_equals(Some(&json!({"a": [1]})), Some(&json!({"a": [1]}))));
    }

    #[test]
    fn test_ordering() {
        assert!(CompareOp::Gt.apply(Some(&json!(20)), Some(&json!(18))));
        assert!(CompareOp::Lt.apply(Some(&json!("apple")), Some(&json!("banana"))));
        assert!(CompareOp::Ge.apply(Some(&json!("10")), Some(&json!(5))));
        assert!(!CompareOp::Lt.apply(None, Some(&json!(1))));
        assert!(!CompareOp::Gt.apply(Some(&json!("abc")), Some(&json!(1))));
        assert!(!CompareOp::Le.apply(Some(&json!([1])), Some(&json!(1))));
    }
}
