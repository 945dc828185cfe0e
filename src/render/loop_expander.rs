//! Stage 2: `<for|index, item| of=path>` expansion

use super::Renderer;
use crate::ast::LoopDirective;
use crate::context::Context;
use crate::error::Result;
use crate::expression::parse_path;
use serde_json::Value;

impl Renderer<'_> {
    /// Render the body once per element and join the results with `\n`.
    /// A path that is missing or not a sequence renders nothing.
    pub(super) fn expand_loop(&mut self, directive: &LoopDirective, ctx: &Context<'_>) -> Result<String> {
        let path = parse_path(&directive.array_path)?;
        let resolved = ctx.resolve(&path);
        let Some(Value::Array(items)) = resolved.as_deref() else {
            log::debug!(
                "Line {}: '{}' is not a sequence, loop renders empty",
                directive.line,
                directive.array_path
            );
            return Ok(String::new());
        };

        self.stats.loops += 1;
        if self.options.debug_mode {
            log::debug!(
                "Expanding <for|{}| of={}> over {} elements",
                directive.item_var,
                directive.array_path,
                items.len()
            );
        }

        let index_var = directive.index_var.as_deref();
        let mut rendered = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let mut scope = Context::for_iteration(item, &directive.item_var, index_var.map(|name| (name, index)));
            rendered.push(self.render_block(&directive.body, &mut scope)?);
            self.stats.iterations += 1;
        }

        Ok(rendered.join("\n"))
    }
}
