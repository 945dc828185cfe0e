//! Stage 4: `${...}` substitution

use super::Renderer;
use crate::ast::{Expr, Interpolation, Operand};
use crate::context::Context;
use crate::error::{Result, TemplateError};
use crate::expression::{evaluate_condition, evaluate_operand, parse_expression};
use crate::value::to_display;
use serde_json::Value;

impl Renderer<'_> {
    pub(super) fn substitute(&mut self, interpolation: &Interpolation, ctx: &Context<'_>) -> Result<String> {
        self.stats.interpolations += 1;
        let expr = parse_expression(&interpolation.source)?;
        render_expression(&expr, ctx)
    }
}

/// Text an expression renders to. Absent and `null` values render empty.
pub fn render_expression(expr: &Expr, ctx: &Context<'_>) -> Result<String> {
    match expr {
        Expr::Operand(operand) => Ok(to_display(evaluate_operand(operand, ctx).as_deref())),
        Expr::Condition(condition) => Ok(evaluate_condition(condition, ctx).to_string()),
        Expr::Ternary { .. } => ternary_text(expr, ctx),
    }
}

/// Evaluate a ternary and stringify only the winning branch. A branch that
/// resolves to a mapping or sequence is an error.
pub fn ternary_text(expr: &Expr, ctx: &Context<'_>) -> Result<String> {
    let Expr::Ternary { condition, when_true, when_false } = expr else {
        return render_expression(expr, ctx);
    };

    let branch = if evaluate_condition(condition, ctx) {
        when_true
    } else {
        when_false
    };

    let value = evaluate_operand(branch, ctx);
    match value.as_deref() {
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            let name = match branch {
                Operand::Path(path) => path.to_string(),
                Operand::Literal(value) => value.to_string(),
            };
            Err(TemplateError::expression(format!(
                "ternary branch '{}' is a mapping or sequence",
                name
            )))
        }
        other => Ok(to_display(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Mapping;
    use serde_json::json;

    fn render(source: &str, data: Value) -> Result<String> {
        let map: Mapping = data.as_object().cloned().unwrap();
        let ctx = Context::new(&map);
        render_expression(&parse_expression(source)?, &ctx)
    }

    #[test]
    fn test_plain_lookups() {
        let data = json!({"user": {"name": "Tom", "age": 30}, "items": [{"n": "a"}], "none": null});
        assert_eq!(render("user.name", data.clone()).unwrap(), "Tom");
        assert_eq!(render("user.age", data.clone()).unwrap(), "30");
        assert_eq!(render("items[0].n", data.clone()).unwrap(), "a");
        assert_eq!(render("none", data.clone()).unwrap(), "");
        assert_eq!(render("none.deeper", data.clone()).unwrap(), "");
        assert_eq!(render("items.length", data).unwrap(), "1");
    }

    #[test]
    fn test_ternaries() {
        assert_eq!(render("a === 1 ? 'x' : 'y'", json!({"a": 1})).unwrap(), "x");
        assert_eq!(render("a === 1 ? 'x' : 'y'", json!({"a": 2})).unwrap(), "y");
        assert_eq!(render("ok ? name : \"anon\"", json!({"ok": true, "name": "Ann"})).unwrap(), "Ann");
        assert_eq!(render("ok ? count : 0", json!({"ok": false})).unwrap(), "0");
        assert_eq!(render("ok ? flag : 'n'", json!({"ok": true, "flag": false})).unwrap(), "false");
        assert_eq!(render("ok ? missing : 'n'", json!({"ok": true})).unwrap(), "");
    }

    #[test]
    fn test_ternary_container_is_error() {
        assert!(render("ok ? list : 'none'", json!({"ok": true, "list": [1, 2]})).is_err());
        // Only the winning branch is evaluated
        assert_eq!(render("ok ? list : 'none'", json!({"ok": false, "list": [1, 2]})).unwrap(), "none");
    }

    #[test]
    fn test_conditions_and_literals_render() {
        assert_eq!(render("a > 1", json!({"a": 2})).unwrap(), "true");
        assert_eq!(render("!a", json!({"a": 2})).unwrap(), "false");
        assert_eq!(render("'quoted'", json!({})).unwrap(), "quoted");
        assert_eq!(render("tags", json!({"tags": ["a", "b"]})).unwrap(), r#"["a","b"]"#);
    }
}
