// Abstract Syntax Tree for the statement language

use crate::instruction::BinOp;
use crate::var::VarKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub position: usize,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Label(String),
    Goto(Target),
    Unless {
        condition: Condition,
        target: Target,
    },
    /// `target = value` and the compound forms; `symbol` is the operator text.
    Assign {
        target: Expr,
        symbol: &'static str,
        value: Expr,
    },
    /// `target++` / `target--`
    Step {
        target: Expr,
        symbol: &'static str,
    },
    Call(CallChain),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Label(String),
    Offset(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `!v`
    Zero(Expr),
    /// `v` or `call(...)`
    Truth(Expr),
    Compare(Expr, &'static str, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub position: usize,
}

/// `head(args).setter(args)...`
#[derive(Debug, Clone, PartialEq)]
pub struct CallChain {
    pub head: Call,
    pub setters: Vec<Call>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarIndex {
    Literal(i64),
    Var(VarRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub kind: VarKind,
    pub index: i64,
    pub offset: Option<Box<VarIndex>>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64, usize),
    /// Raw markup text and the position of its first character.
    String(String, usize),
    Var(VarRef),
    Identifier(String, usize),
    Call(CallChain),
    List(Vec<Expr>, usize),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Paren(Box<Expr>, usize),
}

impl Expr {
    pub fn position(&self) -> usize {
        match self {
            Expr::Integer(_, at)
            | Expr::String(_, at)
            | Expr::Identifier(_, at)
            | Expr::List(_, at)
            | Expr::Paren(_, at) => *at,
            Expr::Var(var) => var.position,
            Expr::Call(chain) => chain.head.position,
            Expr::Binary(left, _, _) => left.position(),
        }
    }
}
