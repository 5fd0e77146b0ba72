//! Recursive-descent parser for edit-script source.
//!
//! Two entry points:
//!
//! - [`parse_expression_at`] parses exactly one expression starting at a
//!   byte offset and stops at the first token that cannot continue it.
//!   Whatever follows is never looked at beyond that one token.
//! - [`parse_script`] parses a statement list up to end of input.
//!
//! A `{` in statement position opens a block, so object literals only parse
//! as values in expression position.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{
    AssignOp, BinaryOp, Expression, FunctionLiteral, LogicalOp, MemberProperty, Program, Span,
    Statement, UnaryOp, VarDeclarator,
};
use crate::interpreter::number_to_string;
use crate::lexer::{Lexer, Punct, Token, TokenKind};

pub type ParseResult<T> = Result<T, ParseError>;

/// Stable parse error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorCode {
    EmptySource,
    UnexpectedToken,
    UnexpectedCharacter,
    UnterminatedString,
    UnterminatedComment,
    InvalidNumber,
    InvalidEscape,
    InvalidAssignmentTarget,
    UnsupportedSyntax,
    NestingTooDeep,
    SourceTooLarge,
}

/// Parse failure with the byte offset and one-based line / zero-based
/// column it was detected at. Display matches the familiar
/// `Unexpected token (1:4)` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub message: String,
    pub offset: usize,
    pub line: u64,
    pub column: u64,
}

impl ParseError {
    pub(crate) fn at(
        code: ParseErrorCode,
        message: impl Into<String>,
        source: &str,
        offset: usize,
    ) -> Self {
        let (line, column) = line_column(source, offset);
        Self {
            code,
            message: message.into(),
            offset,
            line,
            column,
        }
    }

    pub fn source_too_large(len: usize, max: usize) -> Self {
        Self {
            code: ParseErrorCode::SourceTooLarge,
            message: format!("source is {len} bytes, limit is {max}"),
            offset: 0,
            line: 1,
            column: 0,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

fn line_column(source: &str, offset: usize) -> (u64, u64) {
    let mut line = 1u64;
    let mut column = 0u64;
    for (index, ch) in source.char_indices() {
        if index >= offset {
            break;
        }
        if ch == '\n' {
            line = line.saturating_add(1);
            column = 0;
        } else {
            column = column.saturating_add(1);
        }
    }
    (line, column)
}

/// Parser resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserLimits {
    /// Maximum nesting of expressions and statements.
    pub max_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with",
];

pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Parse one expression beginning at byte `offset` of `source`.
///
/// Leading whitespace and comments are skipped; the returned span covers the
/// expression itself. Well-formed tokens after the expression are ignored,
/// but a malformed one directly after it is an error.
pub fn parse_expression_at(
    source: &str,
    offset: usize,
    limits: ParserLimits,
) -> ParseResult<(Expression, Span)> {
    let mut parser = Parser::new(source, offset, limits);
    if parser.current.kind == TokenKind::Eof {
        return Err(parser.error_here(ParseErrorCode::EmptySource, "Unexpected end of input"));
    }
    let start = parser.current.span.start;
    let expression = parser.parse_expression()?;
    if let TokenKind::Invalid(error) = &parser.current.kind {
        return Err(error.clone());
    }
    Ok((expression, Span::new(start, parser.previous_end)))
}

/// Parse a whole script.
pub fn parse_script(source: &str, limits: ParserLimits) -> ParseResult<Program> {
    let mut parser = Parser::new(source, 0, limits);
    let mut body = Vec::new();
    while parser.current.kind != TokenKind::Eof {
        body.push(parser.parse_statement()?);
    }
    Ok(Program {
        body,
        span: Span::new(0, source.len()),
    })
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous_end: usize,
    depth: usize,
    in_function: bool,
    limits: ParserLimits,
}

fn binary_precedence(token: &Token) -> Option<(u8, BinaryOrLogical)> {
    use BinaryOrLogical::{Binary, Logical};
    let entry = match &token.kind {
        TokenKind::Punct(punct) => match punct {
            Punct::OrOr => (1, Logical(LogicalOp::Or)),
            Punct::AndAnd => (2, Logical(LogicalOp::And)),
            Punct::Pipe => (3, Binary(BinaryOp::BitOr)),
            Punct::Caret => (4, Binary(BinaryOp::BitXor)),
            Punct::Amp => (5, Binary(BinaryOp::BitAnd)),
            Punct::Eq => (6, Binary(BinaryOp::Eq)),
            Punct::NotEq => (6, Binary(BinaryOp::NotEq)),
            Punct::StrictEq => (6, Binary(BinaryOp::StrictEq)),
            Punct::StrictNotEq => (6, Binary(BinaryOp::StrictNotEq)),
            Punct::Lt => (7, Binary(BinaryOp::Lt)),
            Punct::Gt => (7, Binary(BinaryOp::Gt)),
            Punct::LtEq => (7, Binary(BinaryOp::LtEq)),
            Punct::GtEq => (7, Binary(BinaryOp::GtEq)),
            Punct::Shl => (8, Binary(BinaryOp::Shl)),
            Punct::Shr => (8, Binary(BinaryOp::Shr)),
            Punct::UShr => (8, Binary(BinaryOp::UShr)),
            Punct::Plus => (9, Binary(BinaryOp::Add)),
            Punct::Minus => (9, Binary(BinaryOp::Sub)),
            Punct::Star => (10, Binary(BinaryOp::Mul)),
            Punct::Slash => (10, Binary(BinaryOp::Div)),
            Punct::Percent => (10, Binary(BinaryOp::Rem)),
            _ => return None,
        },
        TokenKind::Name(name) if name == "in" => (7, Binary(BinaryOp::In)),
        TokenKind::Name(name) if name == "instanceof" => (7, Binary(BinaryOp::InstanceOf)),
        _ => return None,
    };
    Some(entry)
}

#[derive(Clone, Copy)]
enum BinaryOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn assign_op(token: &Token) -> Option<AssignOp> {
    let op = match token.kind {
        TokenKind::Punct(Punct::Assign) => AssignOp::Assign,
        TokenKind::Punct(Punct::PlusAssign) => AssignOp::Compound(BinaryOp::Add),
        TokenKind::Punct(Punct::MinusAssign) => AssignOp::Compound(BinaryOp::Sub),
        TokenKind::Punct(Punct::StarAssign) => AssignOp::Compound(BinaryOp::Mul),
        TokenKind::Punct(Punct::SlashAssign) => AssignOp::Compound(BinaryOp::Div),
        TokenKind::Punct(Punct::PercentAssign) => AssignOp::Compound(BinaryOp::Rem),
        TokenKind::Punct(Punct::AmpAssign) => AssignOp::Compound(BinaryOp::BitAnd),
        TokenKind::Punct(Punct::PipeAssign) => AssignOp::Compound(BinaryOp::BitOr),
        TokenKind::Punct(Punct::CaretAssign) => AssignOp::Compound(BinaryOp::BitXor),
        TokenKind::Punct(Punct::ShlAssign) => AssignOp::Compound(BinaryOp::Shl),
        TokenKind::Punct(Punct::ShrAssign) => AssignOp::Compound(BinaryOp::Shr),
        TokenKind::Punct(Punct::UShrAssign) => AssignOp::Compound(BinaryOp::UShr),
        _ => return None,
    };
    Some(op)
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, offset: usize, limits: ParserLimits) -> Self {
        let mut lexer = Lexer::new(source, offset);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous_end: offset.min(source.len()),
            depth: 0,
            in_function: false,
            limits,
        }
    }

    fn source(&self) -> &'a str {
        self.lexer.source()
    }

    fn advance(&mut self) -> ParseResult<Token> {
        if let TokenKind::Invalid(error) = &self.current.kind {
            return Err(error.clone());
        }
        let next = self.lexer.next_token();
        let token = std::mem::replace(&mut self.current, next);
        self.previous_end = token.span.end;
        Ok(token)
    }

    fn error_here(&self, code: ParseErrorCode, message: &str) -> ParseError {
        ParseError::at(code, message, self.source(), self.current.span.start)
    }

    fn unexpected(&self) -> ParseError {
        match &self.current.kind {
            TokenKind::Invalid(error) => error.clone(),
            TokenKind::Eof => {
                self.error_here(ParseErrorCode::UnexpectedToken, "Unexpected end of input")
            }
            _ => self.error_here(
                ParseErrorCode::UnexpectedToken,
                &format!("Unexpected token {}", self.current.describe()),
            ),
        }
    }

    fn eat_punct(&mut self, punct: Punct) -> ParseResult<bool> {
        if self.current.is_punct(punct) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punct(&mut self, punct: Punct) -> ParseResult<()> {
        if self.eat_punct(punct)? {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> ParseResult<bool> {
        if self.current.is_name(keyword) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        if self.depth >= self.limits.max_depth {
            return Err(self.error_here(
                ParseErrorCode::NestingTooDeep,
                &format!("nesting exceeds {} levels", self.limits.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn binding_identifier(&mut self) -> ParseResult<String> {
        match &self.current.kind {
            TokenKind::Name(name) if !is_reserved_word(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            TokenKind::Name(name) => {
                let message = format!("Unexpected keyword '{name}'");
                Err(self.error_here(ParseErrorCode::UnexpectedToken, &message))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Automatic semicolon insertion for statement ends.
    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.eat_punct(Punct::Semicolon)? {
            return Ok(());
        }
        if self.current.is_punct(Punct::RBrace)
            || self.current.kind == TokenKind::Eof
            || (self.current.newline_before && !matches!(self.current.kind, TokenKind::Invalid(_)))
        {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // -- Statements ---------------------------------------------------------

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.enter()?;
        let statement = self.parse_statement_inner();
        self.leave();
        statement
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Statement> {
        if self.eat_punct(Punct::LBrace)? {
            return self.parse_block_tail().map(Statement::Block);
        }
        if self.eat_punct(Punct::Semicolon)? {
            return Ok(Statement::Empty);
        }
        let keyword = match &self.current.kind {
            TokenKind::Name(name) => name.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "var" => {
                self.advance()?;
                let mut declarators = Vec::new();
                loop {
                    let name = self.binding_identifier()?;
                    let init = if self.eat_punct(Punct::Assign)? {
                        Some(self.parse_assignment()?)
                    } else {
                        None
                    };
                    declarators.push(VarDeclarator { name, init });
                    if !self.eat_punct(Punct::Comma)? {
                        break;
                    }
                }
                self.consume_semicolon()?;
                Ok(Statement::Var(declarators))
            }
            "function" => {
                let literal = self.parse_function(true)?;
                Ok(Statement::Function(literal))
            }
            "if" => {
                self.advance()?;
                self.expect_punct(Punct::LParen)?;
                let test = self.parse_expression()?;
                self.expect_punct(Punct::RParen)?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.eat_keyword("else")? {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Statement::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            "while" => {
                self.advance()?;
                self.expect_punct(Punct::LParen)?;
                let test = self.parse_expression()?;
                self.expect_punct(Punct::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::While { test, body })
            }
            "return" => {
                if !self.in_function {
                    return Err(self.error_here(
                        ParseErrorCode::UnexpectedToken,
                        "'return' outside of function",
                    ));
                }
                self.advance()?;
                let argument = if self.current.is_punct(Punct::Semicolon)
                    || self.current.is_punct(Punct::RBrace)
                    || self.current.kind == TokenKind::Eof
                    || self.current.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Statement::Return(argument))
            }
            "throw" => {
                self.advance()?;
                if self.current.newline_before {
                    return Err(self.error_here(
                        ParseErrorCode::UnexpectedToken,
                        "Illegal newline after throw",
                    ));
                }
                let argument = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Statement::Throw(argument))
            }
            "for" | "do" | "switch" | "try" | "break" | "continue" | "with" | "debugger"
            | "class" | "const" | "import" | "export" => {
                let message = format!("'{keyword}' statements are not supported");
                Err(self.error_here(ParseErrorCode::UnsupportedSyntax, &message))
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Statement::Expression(expression))
            }
        }
    }

    /// Statements up to and including the closing brace.
    fn parse_block_tail(&mut self) -> ParseResult<Vec<Statement>> {
        let mut body = Vec::new();
        while !self.current.is_punct(Punct::RBrace) {
            if self.current.kind == TokenKind::Eof {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(body)
    }

    fn parse_function(&mut self, require_name: bool) -> ParseResult<FunctionLiteral> {
        let start = self.current.span.start;
        self.advance()?;
        let name = if matches!(self.current.kind, TokenKind::Name(_)) {
            Some(self.binding_identifier()?)
        } else if require_name {
            return Err(self.unexpected());
        } else {
            None
        };
        self.expect_punct(Punct::LParen)?;
        let mut params = Vec::new();
        if !self.current.is_punct(Punct::RParen) {
            loop {
                params.push(self.binding_identifier()?);
                if !self.eat_punct(Punct::Comma)? {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen)?;
        if !self.current.is_punct(Punct::LBrace) {
            return Err(self.unexpected());
        }
        let was_in_function = std::mem::replace(&mut self.in_function, true);
        self.advance()?;
        let body = self.parse_block_tail();
        self.in_function = was_in_function;
        let body = body?;
        let source = self
            .source()
            .get(start..self.previous_end)
            .unwrap_or_default()
            .to_string();
        Ok(FunctionLiteral {
            name,
            params,
            body,
            source,
        })
    }

    // -- Expressions --------------------------------------------------------

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let first = self.parse_assignment()?;
        if !self.current.is_punct(Punct::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(Punct::Comma)? {
            items.push(self.parse_assignment()?);
        }
        Ok(Expression::Sequence(items))
    }

    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        self.enter()?;
        let result = self.parse_assignment_inner();
        self.leave();
        result
    }

    fn parse_assignment_inner(&mut self) -> ParseResult<Expression> {
        let start = self.current.span.start;
        let target = self.parse_conditional()?;
        let Some(op) = assign_op(&self.current) else {
            return Ok(target);
        };
        if !target.is_assignable() {
            return Err(ParseError::at(
                ParseErrorCode::InvalidAssignmentTarget,
                "Assigning to rvalue",
                self.source(),
                start,
            ));
        }
        self.advance()?;
        let value = self.parse_assignment()?;
        Ok(Expression::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let test = self.parse_binary(1)?;
        if !self.eat_punct(Punct::Question)? {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(Punct::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;
        while let Some((precedence, op)) = binary_precedence(&self.current) {
            if precedence < min_precedence {
                break;
            }
            self.advance()?;
            let right = self.parse_binary(precedence + 1)?;
            left = match op {
                BinaryOrLogical::Binary(op) => Expression::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                BinaryOrLogical::Logical(op) => Expression::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = match &self.current.kind {
            TokenKind::Punct(Punct::Bang) => Some(UnaryOp::Not),
            TokenKind::Punct(Punct::Minus) => Some(UnaryOp::Minus),
            TokenKind::Punct(Punct::Plus) => Some(UnaryOp::Plus),
            TokenKind::Punct(Punct::Tilde) => Some(UnaryOp::BitNot),
            TokenKind::Punct(Punct::PlusPlus | Punct::MinusMinus) => {
                return Err(self.error_here(
                    ParseErrorCode::UnsupportedSyntax,
                    "update expressions are not supported",
                ));
            }
            TokenKind::Name(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Name(name) if name == "void" => Some(UnaryOp::Void),
            TokenKind::Name(name) if name == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.enter()?;
        let argument = self.advance().and_then(|_| self.parse_unary());
        self.leave();
        Ok(Expression::Unary {
            op,
            argument: Box::new(argument?),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expression = if self.current.is_name("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat_punct(Punct::Dot)? {
                let name = self.property_identifier()?;
                expression = Expression::Member {
                    object: Box::new(expression),
                    property: MemberProperty::Named(name),
                };
            } else if self.eat_punct(Punct::LBracket)? {
                let property = self.parse_expression()?;
                self.expect_punct(Punct::RBracket)?;
                expression = Expression::Member {
                    object: Box::new(expression),
                    property: MemberProperty::Computed(Box::new(property)),
                };
            } else if self.current.is_punct(Punct::LParen) {
                let arguments = self.parse_arguments()?;
                expression = Expression::Call {
                    callee: Box::new(expression),
                    arguments,
                };
            } else if matches!(
                self.current.kind,
                TokenKind::Punct(Punct::PlusPlus | Punct::MinusMinus)
            ) && !self.current.newline_before
            {
                return Err(self.error_here(
                    ParseErrorCode::UnsupportedSyntax,
                    "update expressions are not supported",
                ));
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_new(&mut self) -> ParseResult<Expression> {
        self.enter()?;
        let result = self.parse_new_inner();
        self.leave();
        result
    }

    fn parse_new_inner(&mut self) -> ParseResult<Expression> {
        self.advance()?;
        let mut callee = if self.current.is_name("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat_punct(Punct::Dot)? {
                let name = self.property_identifier()?;
                callee = Expression::Member {
                    object: Box::new(callee),
                    property: MemberProperty::Named(name),
                };
            } else if self.eat_punct(Punct::LBracket)? {
                let property = self.parse_expression()?;
                self.expect_punct(Punct::RBracket)?;
                callee = Expression::Member {
                    object: Box::new(callee),
                    property: MemberProperty::Computed(Box::new(property)),
                };
            } else {
                break;
            }
        }
        let arguments = if self.current.is_punct(Punct::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect_punct(Punct::LParen)?;
        let mut arguments = Vec::new();
        if self.eat_punct(Punct::RParen)? {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_assignment()?);
            if self.eat_punct(Punct::RParen)? {
                return Ok(arguments);
            }
            self.expect_punct(Punct::Comma)?;
        }
    }

    /// Any identifier name, reserved words included (`o.default`).
    fn property_identifier(&mut self) -> ParseResult<String> {
        match &self.current.kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match &self.current.kind {
            TokenKind::Number(value) => {
                let value = *value;
                self.advance()?;
                Ok(Expression::Number(value))
            }
            TokenKind::String(value) => {
                let value = value.clone();
                self.advance()?;
                Ok(Expression::String(value))
            }
            TokenKind::Name(name) => {
                let name = name.clone();
                match name.as_str() {
                    "true" => self.advance().map(|_| Expression::Bool(true)),
                    "false" => self.advance().map(|_| Expression::Bool(false)),
                    "null" => self.advance().map(|_| Expression::Null),
                    "this" => self.advance().map(|_| Expression::This),
                    "function" => {
                        let literal = self.parse_function(false)?;
                        Ok(Expression::Function(Box::new(literal)))
                    }
                    _ => self.binding_identifier().map(Expression::Identifier),
                }
            }
            TokenKind::Punct(Punct::LParen) => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect_punct(Punct::RParen)?;
                Ok(inner)
            }
            TokenKind::Punct(Punct::LBracket) => self.parse_array_literal(),
            TokenKind::Punct(Punct::LBrace) => self.parse_object_literal(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        self.advance()?;
        let mut elements = Vec::new();
        loop {
            if self.eat_punct(Punct::RBracket)? {
                return Ok(Expression::Array(elements));
            }
            if self.eat_punct(Punct::Comma)? {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_assignment()?));
            if !self.current.is_punct(Punct::RBracket) {
                self.expect_punct(Punct::Comma)?;
            }
        }
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        self.advance()?;
        let mut properties = Vec::new();
        loop {
            if self.eat_punct(Punct::RBrace)? {
                return Ok(Expression::Object(properties));
            }
            let key = match &self.current.kind {
                TokenKind::Name(name) => name.clone(),
                TokenKind::String(value) => value.clone(),
                TokenKind::Number(value) => number_to_string(*value),
                _ => return Err(self.unexpected()),
            };
            self.advance()?;
            self.expect_punct(Punct::Colon)?;
            let value = self.parse_assignment()?;
            properties.push((key, value));
            if !self.current.is_punct(Punct::RBrace) {
                self.expect_punct(Punct::Comma)?;
            }
        }
    }
}
