//! Expression tree for the host language.
//!
//! Nodes are stored flat in an `ExprArena` and refer to their children by
//! `ExprId`. A compiled expression owns its arena behind an `Arc`, so lambdas
//! created during evaluation can keep a handle to the code they close over.

use std::fmt;
use std::ops::Range;

/// Byte range in the source text.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span {
            start: u32::try_from(start).unwrap_or(u32::MAX),
            end: u32::try_from(end).unwrap_or(u32::MAX),
        }
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn range(self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Index of a node in an `ExprArena`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    /// `$name`
    Variable(String),
    /// `$`, the current input.
    Context,
    /// `$$`, the input the evaluation started with.
    Root,
    /// Bare identifier, navigates a field of the current input.
    Field(String),
    /// `target.field`
    Path { target: ExprId, field: String },
    /// `target[index]`
    Index { target: ExprId, index: ExprId },
    /// `callee(args...)`
    Call { callee: ExprId, args: Vec<ExprId> },
    /// `-operand`
    Negate(ExprId),
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    /// `test ? then : otherwise`
    Condition {
        test: ExprId,
        then: ExprId,
        otherwise: Option<ExprId>,
    },
    /// `$name := value`
    Bind { name: String, value: ExprId },
    /// `(a; b; c)`, evaluated in a fresh child frame.
    Block(Vec<ExprId>),
    Array(Vec<ExprId>),
    Object(Vec<(String, ExprId)>),
    /// `function($a, $b) { body }`
    Lambda { params: Vec<String>, body: ExprId },
}

/// A single node.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// Short node category, handed to lifecycle hooks so they can filter on it.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Number(_) => "number",
            ExprKind::String(_) => "string",
            ExprKind::Bool(_) => "value",
            ExprKind::Null => "value",
            ExprKind::Variable(_) | ExprKind::Context | ExprKind::Root => "variable",
            ExprKind::Field(_) => "name",
            ExprKind::Path { .. } => "path",
            ExprKind::Index { .. } => "filter",
            ExprKind::Call { .. } => "function",
            ExprKind::Negate(_) => "unary",
            ExprKind::Binary { .. } => "binary",
            ExprKind::Condition { .. } => "condition",
            ExprKind::Bind { .. } => "bind",
            ExprKind::Block(_) => "block",
            ExprKind::Array(_) => "array",
            ExprKind::Object(_) => "object",
            ExprKind::Lambda { .. } => "lambda",
        }
    }
}

/// Flat storage for the nodes of one compiled expression.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node and return its id.
    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(u32::try_from(self.exprs.len()).unwrap_or(u32::MAX));
        self.exprs.push(expr);
        id
    }

    /// Look up a node.
    ///
    /// Ids are only ever produced by `alloc` on the same arena, so indexing
    /// cannot go out of bounds for ids handed out by the parser.
    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}
