//! Error types for the template renderer

use thiserror::Error;
use std::fmt;

/// Line/column of a token in the template source (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse { line: usize, column: usize, message: String },

    #[error("Expression error: {message}")]
    Expression { message: String },

    #[error("Directive error at line {line}: {message}")]
    Directive { line: usize, message: String },

    #[error("Invalid context: {message}")]
    InvalidContext { message: String },

    #[error("Template is not valid text: {message}")]
    InvalidText { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, TemplateError>;

impl TemplateError {
    pub fn parse(pos: SourcePos, message: impl Into<String>) -> Self {
        Self::Parse {
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression {
            message: message.into(),
        }
    }

    pub fn directive(line: usize, message: impl Into<String>) -> Self {
        Self::Directive {
            line,
            message: message.into(),
        }
    }

    pub fn invalid_context(message: impl Into<String>) -> Self {
        Self::InvalidContext {
            message: message.into(),
        }
    }

    /// Attach the directive's line to an expression error raised while evaluating it
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::Expression { message } => Self::directive(line, message),
            other => other,
        }
    }
}
