//! Tmplr template renderer
//!
//! Renders text templates against a JSON-like data context. Templates use a
//! small tag syntax:
//!
//! - Interpolation: `${user.name}`, `${items[0].title}`, `${age >= 18 ? 'adult' : 'minor'}`
//! - Loops: `<for|item| of=items>...</for>` or `<for|index, item| of=items>...</for>`
//! - Conditionals: `<if(cond)>...<else-if(cond)>...<else>...</if>`
//! - Local bindings: `<let total=${order.total}>`
//!
//! # Basic Usage
//!
//! ```rust
//! use serde_json::json;
//!
//! let output = tmplr::render("Hello ${name}!", &json!({"name": "Tom"}));
//! assert_eq!(output, "Hello Tom!");
//! ```
//!
//! # Rendering Pipeline
//!
//! 1. **Lexer** - split the template into text, interpolations and directive tags
//! 2. **Parser** - build the block tree (`Text | Interpolation | Loop | Conditional | Let`)
//! 3. **Renderer** - render each block through bindings, loops, conditionals
//!    and substitution, recursing into loop bodies and selected branches
//!
//! Nothing is cached between calls: every render re-parses the template.
//!
//! # Error Contract
//!
//! [`render`] is best effort: a failing directive is logged and renders as
//! empty text. [`render_safe`] renders in strict mode and reports the first
//! failing directive (or an invalid data context) in its result instead.
//! Missing values and type mismatches are never errors in either mode.

pub mod ast;
pub mod cli;
pub mod context;
pub mod data;
pub mod error;
pub mod expression;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod utils;
pub mod value;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Instant;

// Re-export commonly used types and functions
pub use ast::{Block, Node};
pub use context::Context;
pub use data::{load_data_file, parse_data, DataFormat};
pub use error::{Result, SourcePos, TemplateError};
pub use lexer::{Lexer, Token, TokenType};
pub use parser::Parser;
pub use render::Renderer;
pub use value::Mapping;

/// Renderer version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Rendering options
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Propagate the first directive error instead of rendering it as empty text
    pub strict: bool,

    /// Log each pipeline stage at debug level
    pub debug_mode: bool,

    /// Extra string variables for the root context. Keys already present in
    /// the data win.
    pub variables: HashMap<String, String>,
}

impl RenderOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Rendering statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderStats {
    /// Template size in bytes
    pub template_size: usize,

    /// Rendered output size in bytes
    pub output_size: usize,

    /// Interpolations substituted
    pub interpolations: usize,

    /// Loops expanded (over an actual sequence)
    pub loops: usize,

    /// Loop iterations rendered
    pub iterations: usize,

    /// Conditional chains evaluated
    pub conditionals: usize,

    /// `<let>` bindings that produced a value
    pub bindings: usize,

    /// Directive errors rendered as empty text
    pub suppressed_errors: usize,

    /// Deepest block nesting reached
    pub max_depth: usize,

    /// Render time in microseconds
    pub render_time_us: u64,
}

/// Result object of [`render_safe`]; serializes as
/// `{"success": true, "output": ...}` or `{"success": false, "error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderResult {
    pub fn ok(output: String) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.to_string()),
        }
    }

    pub fn into_result(self) -> std::result::Result<String, String> {
        match (self.success, self.output, self.error) {
            (true, Some(output), _) => Ok(output),
            (_, _, Some(error)) => Err(error),
            _ => Err("render produced no output".to_string()),
        }
    }
}

impl From<Result<String>> for RenderResult {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(output) => Self::ok(output),
            Err(e) => Self::failed(e),
        }
    }
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    block: Block,
    source_size: usize,
}

impl Template {
    pub fn parse(source: &str, options: &RenderOptions) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize();
        if options.debug_mode {
            log::debug!("Tokenized {} tokens", tokens.len());
        }

        let block = parser::parse_tokens(tokens, options.strict)?;
        if options.debug_mode {
            log::debug!("Parsed {:?}", ast::NodeCounts::of(&block));
        }
        Ok(Self {
            block,
            source_size: source.len(),
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.block
    }

    /// Whether the template contains anything besides literal text
    pub fn has_directives(&self) -> bool {
        self.block.iter().any(Node::is_directive)
    }

    /// Render against a data context, which must be a JSON object
    pub fn render(&self, data: &Value, options: &RenderOptions) -> Result<(String, RenderStats)> {
        let start = Instant::now();
        let root = root_mapping(data, options)?;
        let mut ctx = Context::new(&root);

        let mut renderer = Renderer::new(options);
        let output = renderer.render_block(&self.block, &mut ctx)?;

        let mut stats = renderer.into_stats();
        stats.template_size = self.source_size;
        stats.output_size = output.len();
        stats.render_time_us = start.elapsed().as_micros() as u64;

        if options.debug_mode {
            log::debug!("Render complete: {:?}", stats);
        }
        Ok((output, stats))
    }
}

/// Build the root context from the caller's data plus injected variables
fn root_mapping<'d>(data: &'d Value, options: &RenderOptions) -> Result<Cow<'d, Mapping>> {
    let Value::Object(map) = data else {
        return Err(TemplateError::invalid_context(format!(
            "data context must be an object, got {}",
            type_name(data)
        )));
    };

    if options.variables.is_empty() {
        return Ok(Cow::Borrowed(map));
    }

    let mut root = map.clone();
    for (name, value) in &options.variables {
        root.entry(name.clone())
            .or_insert_with(|| Value::String(value.clone()));
    }
    Ok(Cow::Owned(root))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render with explicit options, returning statistics alongside the output
pub fn render_with_options(
    template: &str,
    data: &Value,
    options: &RenderOptions,
) -> Result<(String, RenderStats)> {
    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::debug!("Template length: {} bytes", template.len());
        log::debug!("Render options: {:?}", options);
    }

    Template::parse(template, options)?.render(data, options)
}

/// Best-effort render. Never fails: directives that cannot be evaluated render
/// as empty text, and a data context that is not an object is treated as empty.
pub fn render(template: &str, data: &Value) -> String {
    let options = RenderOptions::default();
    let empty = Value::Object(Mapping::new());
    let data = if data.is_object() {
        data
    } else {
        log::warn!("Data context is {}, rendering against an empty context", type_name(data));
        &empty
    };

    match render_with_options(template, data, &options) {
        Ok((output, _)) => output,
        Err(e) => {
            log::warn!("Render failed: {}", e);
            String::new()
        }
    }
}

/// Strict render that reports failures in the result instead of hiding them
pub fn render_safe(template: &str, data: &Value) -> RenderResult {
    render_with_options(template, data, &RenderOptions::strict())
        .map(|(output, _)| output)
        .into()
}

/// Best-effort render of raw template bytes; fails fast when they are not
/// valid UTF-8 text.
pub fn render_bytes(template: &[u8], data: &Value) -> Result<String> {
    let text = std::str::from_utf8(template).map_err(|e| TemplateError::InvalidText {
        message: e.to_string(),
    })?;
    Ok(render(text, data))
}
