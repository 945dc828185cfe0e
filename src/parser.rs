//! Recursive descent parser for template tokens
//!
//! Produces the block tree the renderer walks. In lenient mode a directive
//! whose structure is broken (an unclosed `<for>`/`<if>`, a stray closing tag,
//! `<else-if>` after `<else>`, nesting deeper than [`MAX_NESTING_DEPTH`]) is
//! kept as literal text and parsing carries on. In strict mode the same
//! situations are parse errors.
//!
//! Which opening tags are closed is settled by [`match_closing_tags`] before
//! parsing starts, so an unclosed tag is turned into text without parsing its
//! body first.

use crate::ast::*;
use crate::error::{Result, TemplateError};
use crate::lexer::{Token, TokenType};

/// Deepest nesting of `<for>` and `<if>` a template may use
pub const MAX_NESTING_DEPTH: usize = 64;

/// Where the block being parsed sits; decides which tokens end it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enclosing {
    Top,
    Loop,
    Branch,
}

impl Enclosing {
    const ALL: [Enclosing; 3] = [Enclosing::Top, Enclosing::Loop, Enclosing::Branch];

    fn ends_at(self, token_type: &TokenType) -> bool {
        match token_type {
            TokenType::Eof => true,
            TokenType::ForClose => self == Enclosing::Loop,
            TokenType::ElseIf(_) | TokenType::Else | TokenType::IfClose => self == Enclosing::Branch,
            _ => false,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    // For each opening tag, the index just past its closing tag
    closes: Vec<Option<usize>>,
    current: usize,
    depth: usize,
    strict: bool,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>, strict: bool) -> Self {
        if !matches!(tokens.last(), Some(Token { token_type: TokenType::Eof, .. })) {
            let pos = tokens.last().map(|token| token.pos).unwrap_or_default();
            tokens.push(Token {
                token_type: TokenType::Eof,
                pos,
                raw: String::new(),
            });
        }
        Self {
            closes: match_closing_tags(&tokens),
            tokens,
            current: 0,
            depth: 0,
            strict,
        }
    }

    pub fn parse(&mut self) -> Result<Block> {
        let block = self.parse_block(Enclosing::Top)?;
        log::debug!("Parsed {} top-level nodes", block.len());
        Ok(block)
    }

    /// Parse nodes until a token that ends a block of this kind. The ending
    /// token is left for the caller.
    fn parse_block(&mut self, enclosing: Enclosing) -> Result<Block> {
        let mut block = Vec::new();

        loop {
            let token = self.peek().clone();
            if enclosing.ends_at(&token.token_type) {
                break;
            }

            match &token.token_type {
                TokenType::Text(text) => {
                    self.advance();
                    push_text(&mut block, text);
                }
                TokenType::Interpolation(source) => {
                    self.advance();
                    block.push(Node::Interpolation(Interpolation {
                        source: source.clone(),
                        line: token.pos.line,
                    }));
                }
                TokenType::Let { name, expression } => {
                    self.advance();
                    block.push(Node::Let(LetBinding {
                        name: name.clone(),
                        expression: expression.clone(),
                        line: token.pos.line,
                    }));
                }
                TokenType::ForOpen { .. } | TokenType::IfOpen(_) => {
                    if let Some(problem) = self.open_problem() {
                        self.unexpected(&token, problem)?;
                        self.advance();
                        push_text(&mut block, &token.raw);
                        continue;
                    }

                    self.depth += 1;
                    let node = match token.token_type {
                        TokenType::ForOpen { .. } => self.parse_loop().map(Node::Loop),
                        _ => self.parse_conditional().map(Node::Conditional),
                    };
                    self.depth -= 1;
                    block.push(node?);
                }
                TokenType::ForClose
                | TokenType::ElseIf(_)
                | TokenType::Else
                | TokenType::IfClose
                | TokenType::Eof => {
                    self.unexpected(&token, "without a matching opening tag")?;
                    self.advance();
                    push_text(&mut block, &token.raw);
                }
            }
        }

        Ok(block)
    }

    /// Why the opening tag at the current position cannot start a directive
    fn open_problem(&self) -> Option<&'static str> {
        let unclosed = self.closes.get(self.current).copied().flatten().is_none();
        match &self.peek().token_type {
            TokenType::ForOpen { .. } if unclosed => Some("is never closed with </for>"),
            TokenType::IfOpen(_) if unclosed => Some("is never closed with </if>"),
            _ if self.depth >= MAX_NESTING_DEPTH => Some("is nested too deeply"),
            _ => None,
        }
    }

    /// `<for|...| of=path>` body `</for>`
    fn parse_loop(&mut self) -> Result<LoopDirective> {
        let open = self.advance().clone();
        let TokenType::ForOpen { index, item, path } = open.token_type.clone() else {
            return Err(TemplateError::parse(open.pos, "Expected <for> tag"));
        };

        let mut body = self.parse_block(Enclosing::Loop)?;
        if !self.check_close(&TokenType::ForClose) {
            return Err(TemplateError::parse(open.pos, format!("{} is never closed with </for>", open.token_type)));
        }
        self.advance();

        trim_loop_body(&mut body);
        Ok(LoopDirective {
            index_var: index,
            item_var: item,
            array_path: path,
            body,
            line: open.pos.line,
        })
    }

    /// `<if(cond)>` ... [`<else-if(cond)>` ...]* [`<else>` ...] `</if>`
    fn parse_conditional(&mut self) -> Result<ConditionalDirective> {
        let open = self.advance().clone();
        let TokenType::IfOpen(condition) = open.token_type.clone() else {
            return Err(TemplateError::parse(open.pos, "Expected <if> tag"));
        };

        let mut branches = vec![Branch {
            kind: BranchKind::If,
            condition: Some(condition),
            body: self.parse_block(Enclosing::Branch)?,
            line: open.pos.line,
        }];
        let mut seen_else = false;

        loop {
            let token = self.peek().clone();
            match &token.token_type {
                TokenType::IfClose => {
                    self.advance();
                    break;
                }
                TokenType::ElseIf(_) | TokenType::Else if seen_else => {
                    self.unexpected(&token, "after <else>")?;
                    self.advance();
                    // Keep the stray tag as text inside the else branch
                    if let Some(last) = branches.last_mut() {
                        push_text(&mut last.body, &token.raw);
                        let rest = self.parse_block(Enclosing::Branch)?;
                        append_block(&mut last.body, rest);
                    }
                }
                TokenType::ElseIf(condition) => {
                    self.advance();
                    branches.push(Branch {
                        kind: BranchKind::ElseIf,
                        condition: Some(condition.clone()),
                        body: self.parse_block(Enclosing::Branch)?,
                        line: token.pos.line,
                    });
                }
                TokenType::Else => {
                    self.advance();
                    seen_else = true;
                    branches.push(Branch {
                        kind: BranchKind::Else,
                        condition: None,
                        body: self.parse_block(Enclosing::Branch)?,
                        line: token.pos.line,
                    });
                }
                _ => {
                    return Err(TemplateError::parse(open.pos, format!("{} is never closed with </if>", open.token_type)));
                }
            }
        }

        Ok(ConditionalDirective {
            branches,
            line: open.pos.line,
        })
    }

    /// Report a structural problem: an error in strict mode, a warning otherwise
    fn unexpected(&self, token: &Token, problem: &str) -> Result<()> {
        let message = format!("{} {}", token.token_type, problem);
        if self.strict {
            return Err(TemplateError::parse(token.pos, message));
        }
        log::warn!("Line {}: {}; keeping it as text", token.pos.line, message);
        Ok(())
    }

    fn check_close(&self, token_type: &TokenType) -> bool {
        &self.peek().token_type == token_type
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof
        &self.tokens[self.current.min(self.tokens.len().saturating_sub(1))]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }
}

/// For every `<for>` and `<if>` token, the index just past its closing `</for>`
/// or `</if>`, or `None` when the tag is never closed.
///
/// This mirrors `parse_block` without building nodes. Walking right to left,
/// `stop[k][i]` is where a block of kind `k` starting at token `i` ends, and
/// `chain[seen_else][i]` is where an `<if>` chain resumed at branch tag `i`
/// ends. Every entry only looks further right, so one pass settles every tag.
pub fn match_closing_tags(tokens: &[Token]) -> Vec<Option<usize>> {
    let len = tokens.len();
    let mut closes = vec![None; len];
    let mut stop = [vec![len; len + 1], vec![len; len + 1], vec![len; len + 1]];
    let mut chain = [vec![None; len + 1], vec![None; len + 1]];
    let branch = Enclosing::Branch as usize;

    for i in (0..len).rev() {
        let token_type = &tokens[i].token_type;

        match token_type {
            TokenType::ForOpen { .. } => {
                let end = stop[Enclosing::Loop as usize][i + 1];
                if matches!(tokens.get(end), Some(Token { token_type: TokenType::ForClose, .. })) {
                    closes[i] = Some(end + 1);
                }
            }
            TokenType::IfOpen(_) => closes[i] = chain[0][stop[branch][i + 1]],
            TokenType::IfClose => {
                chain[0][i] = Some(i + 1);
                chain[1][i] = Some(i + 1);
            }
            TokenType::ElseIf(_) | TokenType::Else => {
                let next = stop[branch][i + 1];
                let is_else = matches!(token_type, TokenType::Else);
                chain[0][i] = chain[usize::from(is_else)][next];
                chain[1][i] = chain[1][next];
            }
            _ => {}
        }

        for kind in Enclosing::ALL {
            let k = kind as usize;
            stop[k][i] = if kind.ends_at(token_type) {
                i
            } else {
                match closes[i] {
                    Some(after) => stop[k][after],
                    None => stop[k][i + 1],
                }
            };
        }
    }

    closes
}

/// Parse a token stream in one go
pub fn parse_tokens(tokens: Vec<Token>, strict: bool) -> Result<Block> {
    Parser::new(tokens, strict).parse()
}

fn push_text(block: &mut Block, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(existing)) = block.last_mut() {
        existing.push_str(text);
    } else {
        block.push(Node::Text(text.to_string()));
    }
}

fn append_block(block: &mut Block, rest: Block) {
    for node in rest {
        match node {
            Node::Text(text) => push_text(block, &text),
            other => block.push(other),
        }
    }
}

/// Drop exactly one line break right after `<for>` and one right before `</for>`
fn trim_loop_body(body: &mut Block) {
    if let Some(Node::Text(first)) = body.first_mut() {
        if first.starts_with("\r\n") {
            first.replace_range(..2, "");
        } else if first.starts_with('\n') {
            first.remove(0);
        }
    }
    if let Some(Node::Text(last)) = body.last_mut() {
        if last.ends_with("\r\n") {
            last.truncate(last.len() - 2);
        } else if last.ends_with('\n') {
            last.pop();
        }
    }
    body.retain(|node| !matches!(node, Node::Text(text) if text.is_empty()));
}
