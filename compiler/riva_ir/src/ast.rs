//! Statement and expression nodes.
//!
//! Nodes live in a [`SyntaxArena`] and refer to each other by `ExprId` /
//! `StmtId`. The arena is the read-only output of the external parsing
//! stage; the evaluation core never mutates it, and compiled-expression
//! caching keys off the stable ids.

use std::fmt;

use crate::{Name, Span, Ty};

/// Index of an expression node in its arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a statement node in its arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct StmtId(u32);

impl StmtId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Binary operators.
///
/// Only the `Mul` family is closure-specialized by the expression
/// compiler; the remaining operators are evaluated by direct value
/// dispatch and follow the identical pattern if specialized later.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
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
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

/// Unary operators. `Recv` is the channel receive `<-ch`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Neg,
    Not,
    Recv,
}

/// Literal forms. Numeric literals are untyped constants until the
/// expression compiler unifies them with a typed operand.
#[derive(Clone, PartialEq, Debug)]
pub enum Lit {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Imaginary literal (`2i`); the value is the imaginary part.
    Imag(f64),
    Str(Name),
}

/// Function parameter with its declared type.
#[derive(Clone, PartialEq, Debug)]
pub struct Param {
    pub name: Name,
    pub ty: Ty,
}

/// Expression node.
#[derive(Clone, PartialEq, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression kinds.
#[derive(Clone, PartialEq, Debug)]
pub enum ExprKind {
    Lit(Lit),
    Ident(Name),
    Paren(ExprId),
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Index {
        base: ExprId,
        index: ExprId,
    },
    Field {
        base: ExprId,
        field: Name,
    },
    FuncLit {
        params: Vec<Param>,
        results: Vec<Ty>,
        body: StmtId,
    },
}

/// How an assignment statement binds its targets.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AssignMode {
    /// `x = v` - targets must already be declared.
    Assign,
    /// `x := v` - declares targets in the current scope.
    Define,
    /// `x op= v` - compound assignment through a place.
    Compound(BinaryOp),
}

/// Break/continue/goto/fallthrough.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

/// One clause of a `switch`. An empty `exprs` list is the default clause.
#[derive(Clone, PartialEq, Debug)]
pub struct SwitchCase {
    pub exprs: Vec<ExprId>,
    pub body: Vec<StmtId>,
}

/// One clause of a type switch. An empty `types` list is the default.
#[derive(Clone, PartialEq, Debug)]
pub struct TypeCase {
    pub types: Vec<Ty>,
    pub body: Vec<StmtId>,
}

/// Statement node.
#[derive(Clone, PartialEq, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Statement kinds.
#[derive(Clone, PartialEq, Debug)]
pub enum StmtKind {
    Empty,
    Expr(ExprId),
    /// Plain, define or compound assignment; parallel form allowed.
    Assign {
        mode: AssignMode,
        targets: Vec<ExprId>,
        values: Vec<ExprId>,
    },
    /// Variable declaration with optional ascription and initializer.
    Decl {
        name: Name,
        ty: Option<Ty>,
        init: Option<ExprId>,
    },
    Block(Vec<StmtId>),
    Branch {
        kind: BranchKind,
        label: Option<Name>,
    },
    /// Deferred call registration; `call` must be a call expression.
    Defer {
        call: ExprId,
    },
    If {
        init: Option<StmtId>,
        cond: ExprId,
        then: StmtId,
        els: Option<StmtId>,
    },
    /// Counted loop. The label, when present, is the target for labeled
    /// break/continue; labels feeding arbitrary jumps are unsupported.
    For {
        label: Option<Name>,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        post: Option<StmtId>,
        body: StmtId,
    },
    /// Range loop over a list or string.
    ForRange {
        label: Option<Name>,
        key: Option<Name>,
        value: Option<Name>,
        subject: ExprId,
        body: StmtId,
    },
    /// `x++` / `x--`.
    IncDec {
        target: ExprId,
        negate: bool,
    },
    /// Channel send `ch <- v`.
    Send {
        chan: ExprId,
        value: ExprId,
    },
    Switch {
        label: Option<Name>,
        init: Option<StmtId>,
        tag: Option<ExprId>,
        cases: Vec<SwitchCase>,
    },
    TypeSwitch {
        label: Option<Name>,
        init: Option<StmtId>,
        binding: Option<Name>,
        subject: ExprId,
        cases: Vec<TypeCase>,
    },
    Return {
        results: Vec<ExprId>,
    },
    /// Spawning a concurrent flow is unsupported; the executor reports a
    /// descriptive error.
    Go {
        call: ExprId,
    },
    /// Select is unsupported; the executor reports a descriptive error.
    Select,
}

/// Arena owning every statement and expression node of a parsed program.
#[derive(Default)]
pub struct SyntaxArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl SyntaxArena {
    pub fn new() -> Self {
        SyntaxArena::default()
    }

    /// Allocate an expression node.
    ///
    /// # Panics
    /// Panics when more than `u32::MAX` nodes are allocated.
    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let idx = u32::try_from(self.exprs.len())
            .unwrap_or_else(|_| panic!("expression arena exceeded capacity"));
        self.exprs.push(Expr { kind, span });
        ExprId(idx)
    }

    /// Allocate a statement node.
    ///
    /// # Panics
    /// Panics when more than `u32::MAX` nodes are allocated.
    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let idx = u32::try_from(self.stmts.len())
            .unwrap_or_else(|_| panic!("statement arena exceeded capacity"));
        self.stmts.push(Stmt { kind, span });
        StmtId(idx)
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}
