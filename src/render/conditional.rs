//! Stage 3: `<if>` / `<else-if>` / `<else>` chains

use super::Renderer;
use crate::ast::{BranchKind, ConditionalDirective};
use crate::context::Context;
use crate::error::Result;
use crate::expression::{evaluate_condition, parse_condition};

impl Renderer<'_> {
    /// Evaluate branch conditions in order and render the first match in its
    /// own scope. Branches that are not selected are never rendered, so their
    /// bindings never happen.
    pub(super) fn resolve_conditional(
        &mut self,
        directive: &ConditionalDirective,
        ctx: &mut Context<'_>,
    ) -> Result<String> {
        self.stats.conditionals += 1;

        for branch in &directive.branches {
            let selected = match (&branch.kind, &branch.condition) {
                (BranchKind::Else, _) | (_, None) => true,
                (_, Some(source)) => {
                    let condition = parse_condition(source).map_err(|e| e.at_line(branch.line))?;
                    evaluate_condition(&condition, ctx)
                }
            };

            if selected {
                if self.options.debug_mode {
                    log::debug!("Line {}: selected {:?} branch", branch.line, branch.kind);
                }
                return ctx.with_branch(|scope| self.render_block(&branch.body, scope));
            }
        }

        Ok(String::new())
    }
}
