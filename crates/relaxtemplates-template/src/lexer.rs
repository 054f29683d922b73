//! Template lexer (tokenizer).
//!
//! Converts raw template source text into a flat stream of [`Token`]s. Text
//! outside delimiters becomes [`TokenKind::Text`]; `{{ ... }}` and `{% ... %}`
//! regions are bracketed by open/close tokens with their contents split into
//! identifiers, literals, operators and punctuation; `{# ... #}` comments
//! become a single [`TokenKind::Comment`] token.
//!
//! Whitespace inside a region is insignificant, so `{%each x%}` and
//! `{% each x %}` produce the same token kinds and values. The only lexing
//! failures are unterminated delimiters and unterminated string literals;
//! everything else is left for the parser to judge.

use std::fmt;

use relaxtemplates_core::error::{Position, TemplateError};

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Literal text outside any delimiter.
    Text,
    /// `{%`
    TagOpen,
    /// `%}`
    TagClose,
    /// `{{`
    ExprOpen,
    /// `}}`
    ExprClose,
    /// An identifier or dotted path (`name`, `it.field`, `..name`, `items.0`).
    Ident,
    /// A numeric literal.
    Number,
    /// A string literal, with quotes removed and escapes processed.
    Str,
    /// A comparison, assignment or other operator character sequence.
    Operator,
    /// `,`
    Comma,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// The trimmed content of a `{# ... #}` comment.
    Comment,
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// The token's text (delimiters keep their literal spelling).
    pub value: String,
    /// Where the token starts in the source.
    pub position: Position,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            value: value.into(),
            position,
        }
    }

    /// Returns `true` if this is the operator `op`.
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == op
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Text => write!(f, "text {:?}", self.value),
            TokenKind::Str => write!(f, "string {:?}", self.value),
            TokenKind::Comment => f.write_str("comment"),
            TokenKind::Ident => write!(f, "identifier '{}'", self.value),
            TokenKind::Number => write!(f, "number {}", self.value),
            _ => write!(f, "'{}'", self.value),
        }
    }
}

/// Tokenizes a template source string.
///
/// # Errors
///
/// Returns a `LexError` if a `{{`, `{%` or `{#` is never closed, or a string
/// literal inside a region is never terminated.
pub fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut lexer = Lexer::new(source);
    lexer.run()?;
    Ok(lexer.tokens)
}

#[derive(Debug, Clone, Copy)]
enum TagType {
    Variable, // {{
    Block,    // {%
    Comment,  // {#
}

/// Finds the next template delimiter opening in `s`.
fn find_next_open(s: &str) -> Option<(usize, TagType)> {
    let bytes = s.as_bytes();
    s.match_indices('{').find_map(|(pos, _)| {
        let tag_type = match bytes.get(pos + 1) {
            Some(b'{') => TagType::Variable,
            Some(b'%') => TagType::Block,
            Some(b'#') => TagType::Comment,
            _ => return None,
        };
        Some((pos, tag_type))
    })
}

struct Lexer<'s> {
    source: &'s str,
    offset: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    const fn here(&self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }

    fn rest(&self) -> &'s str {
        &self.source[self.offset..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Advances over `len` bytes, keeping line and column current.
    fn advance(&mut self, len: usize) {
        let target = self.offset + len;
        while self.offset < target && self.bump().is_some() {}
    }

    fn push(&mut self, kind: TokenKind, value: impl Into<String>, position: Position) {
        self.tokens.push(Token::new(kind, value, position));
    }

    fn run(&mut self) -> Result<(), TemplateError> {
        while !self.rest().is_empty() {
            let Some((pos, tag_type)) = find_next_open(self.rest()) else {
                // Rest is plain text
                let start = self.here();
                let text = self.rest();
                self.advance(text.len());
                self.push(TokenKind::Text, text, start);
                break;
            };

            if pos > 0 {
                let start = self.here();
                let text = &self.rest()[..pos];
                self.advance(pos);
                self.push(TokenKind::Text, text, start);
            }

            let open = self.here();
            match tag_type {
                TagType::Comment => {
                    let after_open = &self.rest()[2..];
                    let end = after_open.find("#}").ok_or_else(|| {
                        TemplateError::lex("unclosed comment: expected '#}'", open)
                    })?;
                    let content = after_open[..end].trim();
                    self.push(TokenKind::Comment, content, open);
                    self.advance(end + 4);
                }
                TagType::Variable => {
                    self.advance(2);
                    self.push(TokenKind::ExprOpen, "{{", open);
                    self.lex_region("}}", TokenKind::ExprClose, open)?;
                }
                TagType::Block => {
                    self.advance(2);
                    self.push(TokenKind::TagOpen, "{%", open);
                    self.lex_region("%}", TokenKind::TagClose, open)?;
                }
            }
        }
        Ok(())
    }

    /// Tokenizes the inside of a `{{ }}` or `{% %}` region up to and including
    /// its closer.
    fn lex_region(
        &mut self,
        closer: &'static str,
        close_kind: TokenKind,
        open: Position,
    ) -> Result<(), TemplateError> {
        loop {
            while self.peek_char().is_some_and(char::is_whitespace) {
                self.bump();
            }

            let start = self.here();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(TemplateError::lex(
                    format!("unclosed delimiter: expected '{closer}'"),
                    open,
                ));
            }
            if rest.starts_with(closer) {
                self.advance(2);
                self.push(close_kind, closer, start);
                return Ok(());
            }

            let Some(c) = self.peek_char() else {
                continue;
            };
            match c {
                '"' | '\'' => self.lex_string(c, start)?,
                '0'..='9' => self.lex_number(start),
                '-' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                    self.lex_number(start);
                }
                c if c.is_alphabetic() || c == '_' || c == '.' => self.lex_ident(start),
                ',' => self.single(TokenKind::Comma, start),
                '[' => self.single(TokenKind::LBracket, start),
                ']' => self.single(TokenKind::RBracket, start),
                '(' => self.single(TokenKind::LParen, start),
                ')' => self.single(TokenKind::RParen, start),
                '=' | '!' | '<' | '>' if self.peek_second() == Some('=') => {
                    let op = &rest[..2];
                    self.advance(2);
                    self.push(TokenKind::Operator, op, start);
                }
                _ => self.single(TokenKind::Operator, start),
            }
        }
    }

    fn single(&mut self, kind: TokenKind, start: Position) {
        if let Some(c) = self.bump() {
            self.push(kind, c.to_string(), start);
        }
    }

    fn lex_ident(&mut self, start: Position) {
        let begin = self.offset;
        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.bump();
        }
        let ident = &self.source[begin..self.offset];
        self.push(TokenKind::Ident, ident, start);
    }

    fn lex_number(&mut self, start: Position) {
        let begin = self.offset;
        if self.peek_char() == Some('-') {
            self.bump();
        }
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek_char() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let number = &self.source[begin..self.offset];
        self.push(TokenKind::Number, number, start);
    }

    fn lex_string(&mut self, quote: char, start: Position) -> Result<(), TemplateError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(TemplateError::lex("unterminated string literal", start)),
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                    None => return Err(TemplateError::lex("unterminated string literal", start)),
                },
                Some(c) => value.push(c),
            }
        }
        self.push(TokenKind::Str, value, start);
        Ok(())
    }
}
