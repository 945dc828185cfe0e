//! Lexical analysis for template source
//!
//! The lexer splits template text into literal text runs, `${...}`
//! interpolations and directive tags. Anything that looks like the start of a
//! tag but does not match its pattern stays literal text.

use crate::error::SourcePos;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    Text(String),

    /// `${expression}` (the expression source, untrimmed)
    Interpolation(String),

    // Directives
    ForOpen {
        index: Option<String>,
        item: String,
        path: String,
    },
    ForClose,
    IfOpen(String),
    ElseIf(String),
    Else,
    IfClose,
    Let {
        name: String,
        expression: String,
    },

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub pos: SourcePos,
    /// Exact source text of the token, used when a tag is demoted back to text
    pub raw: String,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Text(t) => write!(f, "text({:?})", t),
            TokenType::Interpolation(e) => write!(f, "${{{}}}", e),
            TokenType::ForOpen { index: Some(index), item, path } => {
                write!(f, "<for|{}, {}| of={}>", index, item, path)
            }
            TokenType::ForOpen { index: None, item, path } => write!(f, "<for|{}| of={}>", item, path),
            TokenType::ForClose => write!(f, "</for>"),
            TokenType::IfOpen(c) => write!(f, "<if({})>", c),
            TokenType::ElseIf(c) => write!(f, "<else-if({})>", c),
            TokenType::Else => write!(f, "<else>"),
            TokenType::IfClose => write!(f, "</if>"),
            TokenType::Let { name, expression } => write!(f, "<let {}=${{{}}}>", name, expression),
            TokenType::Eof => write!(f, "EOF"),
        }
    }
}

struct TagPatterns {
    for_open: Regex,
    let_open: Regex,
}

// `<if(...)>`, `<else-if(...)>` and the body of `${...}` are matched by hand
// against the next `)` / `}` so a long run of unterminated tags stays linear.
fn tag_patterns() -> &'static TagPatterns {
    static PATTERNS: OnceLock<TagPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TagPatterns {
        for_open: Regex::new(r#"^<for\s*\|(?:(\w+),\s*)?(\w+)\|\s+of=["']?(\w+(?:\.\w+|\[\d+\])*)["']?>"#)
            .expect("for tag pattern is valid"),
        let_open: Regex::new(r"^<let\s+(\w+)\s*=\s*\$\{").expect("let tag pattern is valid"),
    })
}

/// Next occurrence of a byte at or after a forward-moving position
#[derive(Debug, Clone, Copy)]
struct NextByte {
    byte: u8,
    // (position the last search started from, what it found)
    cached: Option<(usize, Option<usize>)>,
}

impl NextByte {
    fn new(byte: u8) -> Self {
        Self { byte, cached: None }
    }

    fn find(&mut self, input: &str, from: usize) -> Option<usize> {
        if let Some((searched_from, found)) = self.cached {
            if from >= searched_from && found.map_or(true, |at| at >= from) {
                return found;
            }
        }
        let found = input.as_bytes()[from.min(input.len())..]
            .iter()
            .position(|&b| b == self.byte)
            .map(|offset| from + offset);
        self.cached = Some((from, found));
        found
    }
}

pub struct Lexer<'s> {
    input: &'s str,
    position: usize,
    line: usize,
    column: usize,
    next_brace: NextByte,
    next_paren: NextByte,
}

impl<'s> Lexer<'s> {
    pub fn new(input: &'s str) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            column: 1,
            next_brace: NextByte::new(b'}'),
            next_paren: NextByte::new(b')'),
        }
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut text = String::new();
        let mut text_pos = self.pos();

        while !self.is_at_end() {
            let start = self.pos();
            if let Some((token_type, len)) = self.match_tag() {
                if !text.is_empty() {
                    tokens.push(Token {
                        token_type: TokenType::Text(std::mem::take(&mut text)),
                        pos: text_pos,
                        raw: String::new(),
                    });
                }
                let raw = self.advance_by(len).to_string();
                tokens.push(Token { token_type, pos: start, raw });
                text_pos = self.pos();
                continue;
            }

            if text.is_empty() {
                text_pos = start;
            }
            let ch = self.advance_char();
            text.push(ch);
        }

        if !text.is_empty() {
            tokens.push(Token {
                token_type: TokenType::Text(text),
                pos: text_pos,
                raw: String::new(),
            });
        }

        tokens.push(Token {
            token_type: TokenType::Eof,
            pos: self.pos(),
            raw: String::new(),
        });

        log::trace!("Tokenized {} tokens", tokens.len());
        tokens
    }

    /// Try every tag pattern at the current position; returns the token and
    /// its length in bytes.
    fn match_tag(&mut self) -> Option<(TokenType, usize)> {
        let input = self.input;
        let rest = &input[self.position..];

        if rest.starts_with("${") {
            let (body, len) = self.enclosed(2, &TERMINATED_BY_BRACE)?;
            return Some((TokenType::Interpolation(body), len));
        }

        if !rest.starts_with('<') {
            return None;
        }

        if rest.starts_with("</for>") {
            return Some((TokenType::ForClose, "</for>".len()));
        }
        if rest.starts_with("</if>") {
            return Some((TokenType::IfClose, "</if>".len()));
        }
        if rest.starts_with("<else>") {
            return Some((TokenType::Else, "<else>".len()));
        }
        if rest.starts_with("<if(") {
            let (condition, len) = self.enclosed("<if(".len(), &TERMINATED_BY_PAREN)?;
            return Some((TokenType::IfOpen(condition), len));
        }
        if rest.starts_with("<else-if(") {
            let (condition, len) = self.enclosed("<else-if(".len(), &TERMINATED_BY_PAREN)?;
            return Some((TokenType::ElseIf(condition), len));
        }

        let patterns = tag_patterns();
        if let Some(caps) = patterns.for_open.captures(rest) {
            let token_type = TokenType::ForOpen {
                index: caps.get(1).map(|m| m.as_str().to_string()),
                item: group(&caps, 2),
                path: group(&caps, 3),
            };
            return Some((token_type, full_len(&caps)));
        }
        if let Some(caps) = patterns.let_open.captures(rest) {
            let name = group(&caps, 1);
            let (expression, mut len) = self.enclosed(full_len(&caps), &TERMINATED_BY_LET)?;
            // One line break after the tag belongs to it
            let after = &rest[len..];
            if after.starts_with("\r\n") {
                len += 2;
            } else if after.starts_with('\n') {
                len += 1;
            }
            return Some((TokenType::Let { name, expression }, len));
        }

        None
    }

    /// Non-empty text from `offset` (relative to the current position) up to the
    /// first closing character, which must be followed by `terminator.suffix`.
    /// Returns the text and the length of the whole tag.
    fn enclosed(&mut self, offset: usize, terminator: &Terminator) -> Option<(String, usize)> {
        let input = self.input;
        let from = self.position + offset;
        let cache = match terminator.close {
            b'}' => &mut self.next_brace,
            _ => &mut self.next_paren,
        };
        let close = cache.find(input, from)?;
        if close == from || !input[close + 1..].starts_with(terminator.suffix) {
            return None;
        }

        let body = input[from..close].to_string();
        Some((body, close + 1 + terminator.suffix.len() - self.position))
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn advance_char(&mut self) -> char {
        let ch = self.input[self.position..].chars().next().unwrap_or_default();
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    /// Consume `len` bytes, keeping line/column in step; returns the consumed slice
    fn advance_by(&mut self, len: usize) -> &'s str {
        let input = self.input;
        let start = self.position;
        let end = start + len;
        while self.position < end {
            self.advance_char();
        }
        &input[start..end]
    }
}

/// How an enclosed tag body ends: its closing character and what must follow it
struct Terminator {
    close: u8,
    suffix: &'static str,
}

const TERMINATED_BY_BRACE: Terminator = Terminator { close: b'}', suffix: "" };
const TERMINATED_BY_PAREN: Terminator = Terminator { close: b')', suffix: ">" };
const TERMINATED_BY_LET: Terminator = Terminator { close: b'}', suffix: ">" };

fn group(caps: &Captures<'_>, index: usize) -> String {
    caps.get(index).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn full_len(caps: &Captures<'_>) -> usize {
    caps.get(0).map_or(0, |m| m.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(input);
        lexer.tokenize().into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            types("Hello world"),
            vec![TokenType::Text("Hello world".to_string()), TokenType::Eof]
        );
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            types("Hello ${name}!"),
            vec![
                TokenType::Text("Hello ".to_string()),
                TokenType::Interpolation("name".to_string()),
                TokenType::Text("!".to_string()),
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_empty_and_unterminated_interpolation_are_text() {
        assert_eq!(
            types("${} and ${open"),
            vec![TokenType::Text("${} and ${open".to_string()), TokenType::Eof]
        );
    }

    #[test]
    fn test_for_tags() {
        let tokens = types("<for|ix, emp| of=company.staff[0]>x</for>");
        assert_eq!(
            tokens[0],
            TokenType::ForOpen {
                index: Some("ix".to_string()),
                item: "emp".to_string(),
                path: "company.staff[0]".to_string(),
            }
        );
        assert_eq!(tokens[1], TokenType::Text("x".to_string()));
        assert_eq!(tokens[2], TokenType::ForClose);

        let tokens = types(r#"<for |item| of="items">"#);
        assert_eq!(
            tokens[0],
            TokenType::ForOpen {
                index: None,
                item: "item".to_string(),
                path: "items".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_for_is_text() {
        assert_eq!(
            types("<for item of=items>"),
            vec![TokenType::Text("<for item of=items>".to_string()), TokenType::Eof]
        );
    }

    #[test]
    fn test_conditional_tags() {
        assert_eq!(
            types("<if(a === 1)>X<else-if(!b)>Y<else>Z</if>"),
            vec![
                TokenType::IfOpen("a === 1".to_string()),
                TokenType::Text("X".to_string()),
                TokenType::ElseIf("!b".to_string()),
                TokenType::Text("Y".to_string()),
                TokenType::Else,
                TokenType::Text("Z".to_string()),
                TokenType::IfClose,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_let_consumes_trailing_newline() {
        let mut lexer = Lexer::new("<let total = ${order.total}>\r\nDone");
        let tokens = lexer.tokenize();
        assert_eq!(
            tokens[0].token_type,
            TokenType::Let {
                name: "total".to_string(),
                expression: "order.total".to_string(),
            }
        );
        assert_eq!(tokens[1].token_type, TokenType::Text("Done".to_string()));
        assert_eq!(tokens[1].pos, SourcePos::new(2, 1));
    }

    #[test]
    fn test_positions_and_raw() {
        let mut lexer = Lexer::new("line one\n  <if(x)>é</if>");
        let tokens = lexer.tokenize();
        assert_eq!(tokens[1].pos, SourcePos::new(2, 3));
        assert_eq!(tokens[1].raw, "<if(x)>");
        assert_eq!(tokens[3].pos, SourcePos::new(2, 11));
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    }
    #[test]
    fn test_unterminated_tags_are_text() {
        assert_eq!(
            types("<if()> <if(a> <else-if(b)x <let v=${a>"),
            vec![TokenType::Text("<if()> <if(a> <else-if(b)x <let v=${a>".to_string()), TokenType::Eof]
        );
        assert_eq!(
            types("<if(a)x)>"),
            vec![TokenType::Text("<if(a)x)>".to_string()), TokenType::Eof]
        );
    }

    #[test]
    fn test_long_run_of_unterminated_interpolations() {
        let input = "${a ".repeat(20_000);
        let tokens = types(&input);
        assert_eq!(tokens, vec![TokenType::Text(input.clone()), TokenType::Eof]);

        let input = format!("{}x)", "<if(a ".repeat(20_000));
        let tokens = types(&input);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], TokenType::Text(input.clone()));
    }

    #[test]
    fn test_closing_character_is_found_once_per_run() {
        let mut next = NextByte::new(b'}');
        let input = "a}b}c";
        assert_eq!(next.find(input, 0), Some(1));
        assert_eq!(next.find(input, 1), Some(1));
        assert_eq!(next.find(input, 2), Some(3));
        assert_eq!(next.find(input, 4), None);
        assert_eq!(next.find(input, 5), None);
        // Searching behind the cached start is answered afresh
        assert_eq!(next.find(input, 0), Some(1));
    }
}
