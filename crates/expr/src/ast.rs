//! Defines the Abstract Syntax Tree (AST) for template expressions.
//!
//! The language is a small, side-effect free subset of Python expressions:
//! literals, container displays, arithmetic, comparisons, boolean logic,
//! attribute/subscript access, calls, lambdas and comprehensions.

use std::sync::Arc;

/// The top-level expression that can be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A direct reference, resolved against lambda/comprehension locals first.
    Name(String),
    /// A lookup against the render values, produced by the rewriter for free names.
    Lookup(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    /// Short-circuiting `and` / `or`, returning the deciding operand.
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
    },
    /// A (possibly chained) comparison such as `a < b <= c`.
    Compare {
        left: Box<Expr>,
        ops: Vec<(CompareOperator, Expr)>,
    },
    Conditional {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Index>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Lambda(Arc<LambdaDef>),
    ListComp {
        element: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
}

impl Expr {
    /// Short name of the node kind, used by the sandbox allow-list and in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "Literal",
            Expr::Name(_) => "Name",
            Expr::Lookup(_) => "Lookup",
            Expr::List(_) => "List",
            Expr::Tuple(_) => "Tuple",
            Expr::Dict(_) => "Dict",
            Expr::Unary { .. } => "UnaryOp",
            Expr::Binary { .. } => "BinOp",
            Expr::BoolOp { .. } => "BoolOp",
            Expr::Compare { .. } => "Compare",
            Expr::Conditional { .. } => "IfExp",
            Expr::Attribute { .. } => "Attribute",
            Expr::Subscript { .. } => "Subscript",
            Expr::Call { .. } => "Call",
            Expr::Lambda(_) => "Lambda",
            Expr::ListComp { .. } => "ListComp",
            Expr::DictComp { .. } => "DictComp",
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, Expr::Lookup(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Item(Expr),
    Slice {
        lower: Option<Expr>,
        upper: Option<Expr>,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

/// Binding target of a comprehension clause: `for x in ...` or `for k, v in ...`.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Tuple(Vec<String>),
}

impl Target {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Target::Name(n) => vec![n.as_str()],
            Target::Tuple(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// One `for target in iter [if cond]*` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Target,
    pub iter: Expr,
    pub conditions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaDef {
    pub params: Vec<Param>,
    pub vararg: Option<String>,
    pub kwarg: Option<String>,
    pub body: Expr,
}

impl LambdaDef {
    /// Every name the lambda binds, including `*args` / `**kwargs`.
    pub fn bound_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.vararg.as_deref())
            .chain(self.kwarg.as_deref())
    }
}
