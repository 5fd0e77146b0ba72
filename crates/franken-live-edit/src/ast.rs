//! Syntax tree for edit-script source.
//!
//! The parser in `parser.rs` emits this representation. Expressions carry no
//! per-node spans; the only spans the live-edit path needs are the bounds of
//! a whole extracted expression and the source text of function literals,
//! which is kept verbatim so a function can be rendered back for editing.

use serde::{Deserialize, Serialize};

/// Byte range `[start, end)` into the parsed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice `source` by this span, or `None` if the span is out of bounds
    /// or not on a char boundary.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    TypeOf,
    Void,
    Delete,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
    InstanceOf,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

/// Assignment operator; compound forms carry the binary operator they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberProperty {
    /// `object.name`
    Named(String),
    /// `object[expression]`
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionLiteral {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    /// Verbatim source from `function` through the closing brace.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    This,
    Identifier(String),
    /// Array literal; `None` marks an elision hole.
    Array(Vec<Option<Expression>>),
    /// Object literal as ordered `(key, value)` pairs; later keys win.
    Object(Vec<(String, Expression)>),
    Function(Box<FunctionLiteral>),
    Unary {
        op: UnaryOp,
        argument: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Sequence(Vec<Expression>),
    Member {
        object: Box<Expression>,
        property: MemberProperty,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    New {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// Is this expression a valid assignment target?
    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Identifier(_) | Self::Member { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDeclarator {
    pub name: String,
    pub init: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Var(Vec<VarDeclarator>),
    Function(FunctionLiteral),
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    While {
        test: Expression,
        body: Box<Statement>,
    },
    Return(Option<Expression>),
    Throw(Expression),
    Block(Vec<Statement>),
    Empty,
    Expression(Expression),
}

/// A parsed script: statements evaluated in order at global scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Statement>,
    pub span: Span,
}
