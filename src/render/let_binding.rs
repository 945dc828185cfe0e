//! Stage 1: `<let name=${expression}>` bindings
//!
//! Bindings are evaluated in source order against the context as it stands at
//! that point, so a later binding can use an earlier one. Only the bindings of
//! the block itself are resolved here; bindings inside a loop body or a
//! conditional branch belong to that sub-block and are resolved when (and if)
//! it renders.

use super::{ternary_text, Renderer};
use crate::ast::{Expr, LetBinding, Node};
use crate::context::Context;
use crate::error::Result;
use crate::expression::{evaluate_condition, evaluate_operand, parse_expression};
use serde_json::Value;
use std::borrow::Cow;

impl Renderer<'_> {
    pub(super) fn resolve_bindings(&mut self, block: &[Node], ctx: &mut Context<'_>) -> Result<()> {
        for node in block {
            let Node::Let(binding) = node else {
                continue;
            };

            let result = binding_value(binding, ctx).map(Some);
            if let Some(value) = self.recover(binding.line, "<let>", result)? {
                if self.options.debug_mode {
                    log::debug!("Binding '{}' = {}", binding.name, value);
                }
                ctx.bind(binding.name.clone(), value);
                self.stats.bindings += 1;
            }
        }

        if self.options.debug_mode {
            log::debug!(
                "{:?} scope binds {:?}",
                ctx.scope_kind(),
                ctx.get_current_scope_bindings()
            );
        }

        Ok(())
    }
}

/// Value bound by a `<let>`. Paths keep the type of the referenced value
/// (absent binds `null`), conditions bind a boolean and ternaries bind the
/// text of the winning branch.
pub(super) fn binding_value(binding: &LetBinding, ctx: &Context<'_>) -> Result<Value> {
    let expr = parse_expression(&binding.expression)?;
    match &expr {
        Expr::Operand(operand) => Ok(evaluate_operand(operand, ctx)
            .map(Cow::into_owned)
            .unwrap_or(Value::Null)),
        Expr::Condition(condition) => Ok(Value::Bool(evaluate_condition(condition, ctx))),
        Expr::Ternary { .. } => ternary_text(&expr, ctx).map(Value::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Mapping;
    use serde_json::json;

    fn binding(expression: &str) -> LetBinding {
        LetBinding {
            name: "v".to_string(),
            expression: expression.to_string(),
            line: 1,
        }
    }

    #[test]
    fn test_binding_values() {
        let data: Mapping = json!({"order": {"total": 12.5}, "n": 3}).as_object().cloned().unwrap();
        let ctx = Context::new(&data);

        assert_eq!(binding_value(&binding("order.total"), &ctx).unwrap(), json!(12.5));
        assert_eq!(binding_value(&binding("order"), &ctx).unwrap(), json!({"total": 12.5}));
        assert_eq!(binding_value(&binding("n > 2"), &ctx).unwrap(), json!(true));
        assert_eq!(binding_value(&binding("n > 2 ? 'many' : 'few'"), &ctx).unwrap(), json!("many"));
        assert_eq!(binding_value(&binding("'literal'"), &ctx).unwrap(), json!("literal"));
        assert_eq!(binding_value(&binding("missing"), &ctx).unwrap(), Value::Null);
        assert!(binding_value(&binding("a..b"), &ctx).is_err());
    }
}
