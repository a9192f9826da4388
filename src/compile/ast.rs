//! KnightCode syntax tree. Produced by the parser, consumed read-only by codegen.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    Integer,
    Text,
}

impl VarType {
    pub fn default_value(self) -> Value {
        match self {
            VarType::Integer => Value::Integer(0),
            VarType::Text => Value::Text(String::new()),
        }
    }

    /// JVM field descriptor of the storage type.
    pub fn descriptor(self) -> &'static str {
        match self {
            VarType::Integer => "I",
            VarType::Text => "Ljava/lang/String;",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Integer => write!(f, "INTEGER"),
            VarType::Text => write!(f, "STRING"),
        }
    }
}

/// A compile-time value recorded on a variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    Text(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Eq,
    Ne,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(i32),
    Ident(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Paren(Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// One side of an `IF`/`WHILE` test.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Number(i32),
    Ident(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PrintArg {
    Text(String),
    Variable(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SetValue {
    Expr(Expr),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Print(PrintArg),
    Read {
        name: String,
    },
    Setvar {
        name: String,
        value: SetValue,
    },
    Decision {
        condition: Condition,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    Loop {
        condition: Condition,
        body: Vec<Stmt>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub ty: VarType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub name: String,
    pub declare: Option<Vec<Declaration>>,
    pub body: Vec<Stmt>,
}
