//! Tokenizer for edit-script source.
//!
//! Lexing errors do not abort the scan immediately: they surface as a
//! [`TokenKind::Invalid`] token and the parser reports it once it is
//! reached. That includes the token right after the expression read by
//! [`crate::parser::parse_expression_at`], since the lookahead is always
//! scanned.

use crate::ast::Span;
use crate::parser::{ParseError, ParseErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Question,
    Colon,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AndAnd,
    OrOr,
    PlusPlus,
    MinusMinus,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    UShr,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
}

impl Punct {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Semicolon => ";",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::StarAssign => "*=",
            Self::SlashAssign => "/=",
            Self::PercentAssign => "%=",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::PlusPlus => "++",
            Self::MinusMinus => "--",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::UShr => ">>>",
            Self::AmpAssign => "&=",
            Self::PipeAssign => "|=",
            Self::CaretAssign => "^=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
            Self::UShrAssign => ">>>=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    /// Identifier or keyword; the parser distinguishes the two by context.
    Name(String),
    Punct(Punct),
    Eof,
    Invalid(ParseError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, punct: Punct) -> bool {
        self.kind == TokenKind::Punct(punct)
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Name(n) if n == name)
    }

    /// Short rendering used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::String(_) => "string".to_string(),
            TokenKind::Name(name) => format!("'{name}'"),
            TokenKind::Punct(punct) => format!("'{}'", punct.as_str()),
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Invalid(error) => error.message.clone(),
        }
    }
}

pub fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_identifier_start(ch: char) -> bool {
    ch == '$' || ch == '_' || ch.is_alphabetic()
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_alphanumeric()
}

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Start scanning `source` at byte `offset` (clamped to a char boundary
    /// at or before the end of input).
    pub fn new(source: &'a str, offset: usize) -> Self {
        let mut pos = offset.min(source.len());
        while !source.is_char_boundary(pos) {
            pos -= 1;
        }
        Self { source, pos }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(ahead)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error_token(
        &mut self,
        code: ParseErrorCode,
        message: &str,
        at: usize,
        newline: bool,
    ) -> Token {
        let error = ParseError::at(code, message, self.source, at);
        // Nothing after a lexing error is scanned.
        self.pos = self.source.len();
        Token {
            kind: TokenKind::Invalid(error),
            span: Span::new(at, at),
            newline_before: newline,
        }
    }

    /// Skip whitespace and comments. Returns whether a line terminator was
    /// crossed, or the offset of an unterminated block comment.
    fn skip_trivia(&mut self) -> Result<bool, usize> {
        let mut newline = false;
        while let Some(ch) = self.peek() {
            if is_line_terminator(ch) {
                newline = true;
                self.bump();
            } else if ch.is_whitespace() || ch == '\u{feff}' {
                self.bump();
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if is_line_terminator(c) {
                        break;
                    }
                    self.bump();
                }
            } else if ch == '/' && self.peek_at(1) == Some('*') {
                let start = self.pos;
                self.pos += 2;
                match self.source[self.pos..].find("*/") {
                    Some(rel) => {
                        let body = &self.source[self.pos..self.pos + rel];
                        if body.chars().any(is_line_terminator) {
                            newline = true;
                        }
                        self.pos += rel + 2;
                    }
                    None => return Err(start),
                }
            } else {
                break;
            }
        }
        Ok(newline)
    }

    pub fn next_token(&mut self) -> Token {
        let newline = match self.skip_trivia() {
            Ok(newline) => newline,
            Err(at) => {
                return self.error_token(
                    ParseErrorCode::UnterminatedComment,
                    "Unterminated comment",
                    at,
                    false,
                );
            }
        };
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
                newline_before: newline,
            };
        };

        let kind = if ch.is_ascii_digit()
            || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            match self.scan_number() {
                Ok(value) => TokenKind::Number(value),
                Err((code, message)) => return self.error_token(code, message, start, newline),
            }
        } else if ch == '\'' || ch == '"' {
            match self.scan_string(ch) {
                Ok(value) => TokenKind::String(value),
                Err((code, message, at)) => return self.error_token(code, message, at, newline),
            }
        } else if is_identifier_start(ch) {
            while self.peek().is_some_and(is_identifier_part) {
                self.bump();
            }
            TokenKind::Name(self.source[start..self.pos].to_string())
        } else {
            match self.scan_punct() {
                Some(punct) => TokenKind::Punct(punct),
                None => {
                    return self.error_token(
                        ParseErrorCode::UnexpectedCharacter,
                        &format!("Unexpected character '{ch}'"),
                        start,
                        newline,
                    );
                }
            }
        };

        Token {
            kind,
            span: Span::new(start, self.pos),
            newline_before: newline,
        }
    }

    fn scan_number(&mut self) -> Result<f64, (ParseErrorCode, &'static str)> {
        let start = self.pos;
        let value = if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &self.source[digits_start..self.pos];
            if digits.is_empty() {
                return Err((ParseErrorCode::InvalidNumber, "Expected number in radix 16"));
            }
            digits.chars().fold(0.0_f64, |acc, c| {
                acc * 16.0 + f64::from(c.to_digit(16).unwrap_or(0))
            })
        } else {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.peek() == Some('.') {
                self.bump();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                let exponent_start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
                if self.pos == exponent_start {
                    return Err((ParseErrorCode::InvalidNumber, "Invalid number"));
                }
            }
            self.source[start..self.pos]
                .parse::<f64>()
                .map_err(|_| (ParseErrorCode::InvalidNumber, "Invalid number"))?
        };
        if self.peek().is_some_and(is_identifier_part) {
            return Err((
                ParseErrorCode::InvalidNumber,
                "Identifier directly after number",
            ));
        }
        Ok(value)
    }

    fn scan_hex_escape(&mut self, digits: usize) -> Option<char> {
        let text = self.source.get(self.pos..self.pos + digits)?;
        if !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let code = u32::from_str_radix(text, 16).ok()?;
        self.pos += digits;
        char::from_u32(code)
    }

    fn scan_string(
        &mut self,
        quote: char,
    ) -> Result<String, (ParseErrorCode, &'static str, usize)> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err((
                    ParseErrorCode::UnterminatedString,
                    "Unterminated string constant",
                    start,
                ));
            };
            if ch == quote {
                return Ok(out);
            }
            if ch == '\n' || ch == '\r' {
                return Err((
                    ParseErrorCode::UnterminatedString,
                    "Unterminated string constant",
                    start,
                ));
            }
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            let escape_at = self.pos - 1;
            let Some(escaped) = self.bump() else {
                return Err((
                    ParseErrorCode::UnterminatedString,
                    "Unterminated string constant",
                    start,
                ));
            };
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'v' => out.push('\u{b}'),
                '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
                'x' => match self.scan_hex_escape(2) {
                    Some(c) => out.push(c),
                    None => {
                        return Err((
                            ParseErrorCode::InvalidEscape,
                            "Bad character escape sequence",
                            escape_at,
                        ));
                    }
                },
                'u' => match self.scan_hex_escape(4) {
                    Some(c) => out.push(c),
                    None => {
                        return Err((
                            ParseErrorCode::InvalidEscape,
                            "Bad Unicode escape sequence",
                            escape_at,
                        ));
                    }
                },
                '\r' => {
                    if self.peek() == Some('\n') {
                        self.bump();
                    }
                }
                '\n' | '\u{2028}' | '\u{2029}' => {}
                other => out.push(other),
            }
        }
    }

    fn scan_punct(&mut self) -> Option<Punct> {
        let rest = &self.source.as_bytes()[self.pos..];
        // Longest match first.
        let table: [(&[u8], Punct); 48] = [
            (b">>>=", Punct::UShrAssign),
            (b">>>", Punct::UShr),
            (b"<<=", Punct::ShlAssign),
            (b">>=", Punct::ShrAssign),
            (b"===", Punct::StrictEq),
            (b"!==", Punct::StrictNotEq),
            (b"==", Punct::Eq),
            (b"!=", Punct::NotEq),
            (b"<=", Punct::LtEq),
            (b">=", Punct::GtEq),
            (b"+=", Punct::PlusAssign),
            (b"-=", Punct::MinusAssign),
            (b"*=", Punct::StarAssign),
            (b"/=", Punct::SlashAssign),
            (b"%=", Punct::PercentAssign),
            (b"&&", Punct::AndAnd),
            (b"||", Punct::OrOr),
            (b"++", Punct::PlusPlus),
            (b"--", Punct::MinusMinus),
            (b"&=", Punct::AmpAssign),
            (b"|=", Punct::PipeAssign),
            (b"^=", Punct::CaretAssign),
            (b"<<", Punct::Shl),
            (b">>", Punct::Shr),
            (b"{", Punct::LBrace),
            (b"}", Punct::RBrace),
            (b"(", Punct::LParen),
            (b")", Punct::RParen),
            (b"[", Punct::LBracket),
            (b"]", Punct::RBracket),
            (b";", Punct::Semicolon),
            (b",", Punct::Comma),
            (b".", Punct::Dot),
            (b"?", Punct::Question),
            (b":", Punct::Colon),
            (b"<", Punct::Lt),
            (b">", Punct::Gt),
            (b"+", Punct::Plus),
            (b"-", Punct::Minus),
            (b"*", Punct::Star),
            (b"/", Punct::Slash),
            (b"%", Punct::Percent),
            (b"!", Punct::Bang),
            (b"=", Punct::Assign),
            (b"&", Punct::Amp),
            (b"|", Punct::Pipe),
            (b"^", Punct::Caret),
            (b"~", Punct::Tilde),
        ];
        let (text, punct) = table.iter().find(|(text, _)| rest.starts_with(text))?;
        self.pos += text.len();
        Some(*punct)
    }
}
