//! Syntax tree types for templates
//!
//! A template parses into a [`Block`]: a sequence of [`Node`]s. Loop bodies and
//! conditional branches are blocks of their own, rendered recursively through
//! the same pipeline. Directive expressions are kept as source text and parsed
//! into [`Expr`]/[`Condition`] each time they are evaluated.

use crate::value::CompareOp;
use serde_json::Value;
use std::fmt;

/// A contiguous span of template content rendered as one unit
pub type Block = Vec<Node>;

/// Template node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text copied to the output
    Text(String),

    /// `${expression}`
    Interpolation(Interpolation),

    /// `<for|index, item| of=path> body </for>`
    Loop(LoopDirective),

    /// `<if(cond)> ... <else-if(cond)> ... <else> ... </if>`
    Conditional(ConditionalDirective),

    /// `<let name=${expression}>`
    Let(LetBinding),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation {
    pub source: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding {
    pub name: String,
    pub expression: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopDirective {
    pub index_var: Option<String>,
    pub item_var: String,
    pub array_path: String,
    pub body: Block,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalDirective {
    /// Branches in source order; at most one is rendered
    pub branches: Vec<Branch>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    ElseIf,
    Else,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: BranchKind,
    /// `None` only for `Else`
    pub condition: Option<String>,
    pub body: Block,
    pub line: usize,
}

/// Dot-separated lookup path; `a.b[0].c` is stored as `["a", "b", "0", "c"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<String>,
}

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Right-hand side of a comparison or a ternary branch
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Path(Path),
}

/// A condition as used by `<if>`, `<else-if>` and ternaries
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Path,
        op: CompareOp,
        right: Operand,
    },
    Truthy {
        path: Path,
        negated: bool,
    },
}

/// Expression inside `${...}` or a `<let>` binding
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Operand(Operand),
    Condition(Condition),
    Ternary {
        condition: Condition,
        when_true: Operand,
        when_false: Operand,
    },
}

impl Node {
    /// Anything but literal text
    pub fn is_directive(&self) -> bool {
        !matches!(self, Node::Text(_))
    }
}

/// Count nodes of each kind in a block, recursing into bodies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounts {
    pub interpolations: usize,
    pub loops: usize,
    pub conditionals: usize,
    pub bindings: usize,
}

impl NodeCounts {
    pub fn of(block: &[Node]) -> Self {
        let mut counts = Self::default();
        counts.visit(block);
        counts
    }

    fn visit(&mut self, block: &[Node]) {
        for node in block {
            match node {
                Node::Text(_) => {}
                Node::Interpolation(_) => self.interpolations += 1,
                Node::Let(_) => self.bindings += 1,
                Node::Loop(directive) => {
                    self.loops += 1;
                    self.visit(&directive.body);
                }
                Node::Conditional(directive) => {
                    self.conditionals += 1;
                    for branch in &directive.branches {
                        self.visit(&branch.body);
                    }
                }
            }
        }
    }
}
