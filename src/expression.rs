//! Expression parsing and evaluation
//!
//! Grammar (whitespace around tokens is ignored):
//!
//! ```text
//! expression := condition "?" operand ":" operand
//!             | path comparison-op operand
//!             | "!" path
//!             | operand
//! condition  := path comparison-op operand | ["!"] path
//! operand    := 'text' | "text" | number | true | false | null | path
//! path       := segment ("." segment | "[" digits "]")*
//! ```
//!
//! There is no arithmetic, no function call and no boolean composition.

use crate::ast::{Condition, Expr, Operand, Path};
use crate::context::Context;
use crate::error::{Result, TemplateError};
use crate::utils::{clean_and_quote_value, find_outside_quotes, normalize_path};
use crate::value::{is_truthy, CompareOp};
use serde_json::{Number, Value};
use std::borrow::Cow;

/// Parse the source of an interpolation or `<let>` expression
pub fn parse_expression(source: &str) -> Result<Expr> {
    let source = source.trim();
    if source.is_empty() {
        return Err(TemplateError::expression("empty expression"));
    }

    if let Some((condition, when_true, when_false)) = split_ternary(source) {
        return Ok(Expr::Ternary {
            condition: parse_condition(condition)?,
            when_true: parse_operand(when_true)?,
            when_false: parse_operand(when_false)?,
        });
    }

    if split_comparison(source).is_some() || is_negation(source) {
        return Ok(Expr::Condition(parse_condition(source)?));
    }

    Ok(Expr::Operand(parse_operand(source)?))
}

/// Parse the condition of `<if(...)>`, `<else-if(...)>` or a ternary
pub fn parse_condition(source: &str) -> Result<Condition> {
    let source = source.trim();

    if let Some((left, op, right)) = split_comparison(source) {
        return Ok(Condition::Compare {
            left: parse_path(left)?,
            op,
            right: parse_operand(right)?,
        });
    }

    match source.strip_prefix('!') {
        Some(rest) => Ok(Condition::Truthy {
            path: parse_path(rest)?,
            negated: true,
        }),
        None => Ok(Condition::Truthy {
            path: parse_path(source)?,
            negated: false,
        }),
    }
}

pub fn parse_operand(source: &str) -> Result<Operand> {
    let (cleaned, was_quoted) = clean_and_quote_value(source);
    if was_quoted {
        return Ok(Operand::Literal(Value::String(cleaned.to_string())));
    }

    match cleaned {
        "true" => return Ok(Operand::Literal(Value::Bool(true))),
        "false" => return Ok(Operand::Literal(Value::Bool(false))),
        "null" => return Ok(Operand::Literal(Value::Null)),
        _ => {}
    }

    if let Some(number) = parse_number(cleaned) {
        return Ok(Operand::Literal(Value::Number(number)));
    }

    Ok(Operand::Path(parse_path(cleaned)?))
}

/// Parse a dot/bracket path; `items[0].name` becomes `items.0.name`
pub fn parse_path(source: &str) -> Result<Path> {
    let source = source.trim();
    if source.is_empty() {
        return Err(TemplateError::expression("empty path"));
    }

    let normalized = normalize_path(source);
    let mut segments = Vec::new();
    for segment in normalized.split('.') {
        let valid = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '-'));
        if !valid {
            return Err(TemplateError::expression(format!("malformed path '{}'", source)));
        }
        segments.push(segment.to_string());
    }

    Ok(Path::new(segments))
}

/// Integer or decimal literal with an optional sign
fn parse_number(source: &str) -> Option<Number> {
    let digits = source.strip_prefix(['-', '+']).unwrap_or(source);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next()?;
    let fraction = parts.next();

    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || fraction.map_or(false, |f| !all_digits(f)) {
        return None;
    }

    if fraction.is_none() {
        if let Ok(i) = source.parse::<i64>() {
            return Some(Number::from(i));
        }
    }
    source.parse::<f64>().ok().and_then(Number::from_f64)
}

fn is_negation(source: &str) -> bool {
    source.starts_with('!') && !source.starts_with("!=")
}

/// Find the leftmost comparison operator outside quotes with a non-empty
/// left side, preferring the longest spelling at that position.
fn split_comparison(source: &str) -> Option<(&str, CompareOp, &str)> {
    let mut quote: Option<char> = None;

    for (i, ch) in source.char_indices() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                continue;
            }
            Some(_) => continue,
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                continue;
            }
            None => {}
        }
        if i == 0 {
            continue;
        }

        let rest = &source[i..];
        for (symbol, op) in CompareOp::ALL {
            if rest.starts_with(symbol) {
                let left = source[..i].trim();
                let right = source[i + symbol.len()..].trim();
                if left.is_empty() || right.is_empty() {
                    return None;
                }
                return Some((left, op, right));
            }
        }
    }

    None
}

/// Split `condition ? a : b` on the first `?` and the following `:` outside quotes
fn split_ternary(source: &str) -> Option<(&str, &str, &str)> {
    let question = find_outside_quotes(source, "?", 1)?;
    let colon = find_outside_quotes(source, ":", question + 1)?;

    let condition = source[..question].trim();
    let when_true = source[question + 1..colon].trim();
    let when_false = source[colon + 1..].trim();
    if condition.is_empty() || when_true.is_empty() || when_false.is_empty() {
        return None;
    }

    Some((condition, when_true, when_false))
}

/// Evaluate a condition. Missing values and type mismatches are simply false.
pub fn evaluate_condition(condition: &Condition, ctx: &Context<'_>) -> bool {
    match condition {
        Condition::Compare { left, op, right } => {
            let left_value = ctx.resolve(left);
            let right_value = evaluate_operand(right, ctx);
            let result = op.apply(left_value.as_deref(), right_value.as_deref());
            log::trace!("Condition '{} {} ...' -> {}", left, op.symbol(), result);
            result
        }
        Condition::Truthy { path, negated } => {
            let truthy = is_truthy(ctx.resolve(path).as_deref());
            truthy != *negated
        }
    }
}

pub fn evaluate_operand<'c>(operand: &'c Operand, ctx: &'c Context<'_>) -> Option<Cow<'c, Value>> {
    match operand {
        Operand::Literal(value) => Some(Cow::Borrowed(value)),
        Operand::Path(path) => ctx.resolve(path),
    }
}
