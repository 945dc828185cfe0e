//! Block renderer
//!
//! Every block (the whole template, one loop iteration, one selected
//! conditional branch) goes through the same pipeline:
//!
//! 1. **Bindings** - `<let>` directives of this block, in source order
//! 2. **Loops** - `<for>` directives, one sub-block per element
//! 3. **Conditionals** - `<if>` chains, only the selected branch is rendered
//! 4. **Substitution** - `${...}` interpolations
//!
//! Bindings must see the whole block before anything renders, so stage 1 runs
//! as its own pass. Loops, conditionals and interpolations each produce a
//! disjoint span of output, so stages 2-4 run in a single walk over the block.
//!
//! Directive failures surface as `Err` from the stage functions and are mapped
//! to output in exactly one place, [`Renderer::recover`].

mod conditional;
mod let_binding;
mod loop_expander;
mod substitute;

pub use substitute::{render_expression, ternary_text};

use crate::ast::Node;
use crate::context::Context;
use crate::error::{Result, TemplateError};
use crate::parser::MAX_NESTING_DEPTH;
use crate::{RenderOptions, RenderStats};

pub struct Renderer<'o> {
    options: &'o RenderOptions,
    stats: RenderStats,
    depth: usize,
}

impl<'o> Renderer<'o> {
    pub fn new(options: &'o RenderOptions) -> Self {
        Self {
            options,
            stats: RenderStats::default(),
            depth: 0,
        }
    }

    pub fn into_stats(self) -> RenderStats {
        self.stats
    }

    /// Render one block against its context
    pub fn render_block(&mut self, block: &[Node], ctx: &mut Context<'_>) -> Result<String> {
        if self.depth > MAX_NESTING_DEPTH {
            return Err(TemplateError::expression(format!(
                "blocks nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth);
        let result = self.render_stages(block, ctx);
        self.depth -= 1;
        result
    }

    fn render_stages(&mut self, block: &[Node], ctx: &mut Context<'_>) -> Result<String> {
        // Stage 1
        self.resolve_bindings(block, ctx)?;

        // Stages 2-4
        let mut output = String::new();
        for node in block {
            match node {
                Node::Text(text) => output.push_str(text),
                Node::Let(_) => {}
                Node::Loop(directive) => {
                    let result = self.expand_loop(directive, ctx);
                    output.push_str(&self.recover(directive.line, "<for>", result)?);
                }
                Node::Conditional(directive) => {
                    let result = self.resolve_conditional(directive, ctx);
                    output.push_str(&self.recover(directive.line, "<if>", result)?);
                }
                Node::Interpolation(interpolation) => {
                    let result = self.substitute(interpolation, ctx);
                    output.push_str(&self.recover(interpolation.line, "${...}", result)?);
                }
            }
        }

        Ok(output)
    }

    /// The single point where a directive error becomes output: in strict mode
    /// it propagates, otherwise it is logged and the directive renders empty.
    fn recover<T: Default>(&mut self, line: usize, directive: &str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if self.options.strict => Err(e.at_line(line)),
            Err(e) => {
                log::warn!("Line {}: dropping {}: {}", line, directive, e);
                self.stats.suppressed_errors += 1;
                Ok(T::default())
            }
        }
    }
}
