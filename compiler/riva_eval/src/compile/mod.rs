//! Expression compilation.
//!
//! The compiler turns an expression node into a [`Expr`]: either a
//! constant computed once, or a closure pinned to a single numeric kind
//! that reads variables straight out of the environment with no per-eval
//! tag dispatch. Fusing nests closures, so `a * b * 3` compiles to one
//! closure tree evaluated without touching `Value` until the very top.
//!
//! Compilation is best-effort: [`CompileError::Unsupported`] tells the
//! caller to fall back to generic dispatch, it is never a program error.

use std::cell::RefCell;
use std::rc::Rc;

use riva_ir::{
    BinaryOp, ExprId, ExprKind, Lit, Name, NumKind, StringInterner, SyntaxArena, Ty, UntypedKind,
};

use crate::environment::Env;
use crate::errors::CompileError;
use crate::operators;
use crate::value::{Complex32, Complex64, Value};

mod mul;

/// Invoke a macro once with the full numeric kind list appended.
macro_rules! with_num_kinds {
    ($m:ident ! ($($args:tt)*)) => {
        $m!($($args)*; I8, I16, I32, I64, Int, U8, U16, U32, U64, Uint, Uintptr, F32, F64, C64, C128)
    };
}
pub(crate) use with_num_kinds;

/// Types of identifiers visible to the compiler.
///
/// Answering `Some` for a name pins the identifier's compiled
/// representation. Callers that cache compiled expressions must check
/// the pinned kinds ([`Comp::into_reads`]) still hold before each reuse;
/// a name may be re-declared at a different kind later.
pub trait TypeResolver {
    fn type_of(&self, name: Name) -> Option<Ty>;
}

/// A closure specialized to one numeric kind. The variant is the kind;
/// the closure returns the native machine type, never a tagged value.
#[derive(Clone)]
pub enum TypedFun {
    I8(Rc<dyn Fn(&Env) -> i8>),
    I16(Rc<dyn Fn(&Env) -> i16>),
    I32(Rc<dyn Fn(&Env) -> i32>),
    I64(Rc<dyn Fn(&Env) -> i64>),
    Int(Rc<dyn Fn(&Env) -> isize>),
    U8(Rc<dyn Fn(&Env) -> u8>),
    U16(Rc<dyn Fn(&Env) -> u16>),
    U32(Rc<dyn Fn(&Env) -> u32>),
    U64(Rc<dyn Fn(&Env) -> u64>),
    Uint(Rc<dyn Fn(&Env) -> usize>),
    Uintptr(Rc<dyn Fn(&Env) -> usize>),
    F32(Rc<dyn Fn(&Env) -> f32>),
    F64(Rc<dyn Fn(&Env) -> f64>),
    C64(Rc<dyn Fn(&Env) -> Complex32>),
    C128(Rc<dyn Fn(&Env) -> Complex64>),
}

macro_rules! typed_fun_kind {
    ($self:expr; $($variant:ident),*) => {
        match $self {
            $(TypedFun::$variant(_) => NumKind::$variant,)*
        }
    };
}

macro_rules! typed_fun_eval {
    ($self:expr, $env:expr; $($variant:ident),*) => {
        match $self {
            $(TypedFun::$variant(f) => Value::$variant(f($env)),)*
        }
    };
}

macro_rules! typed_fun_ptr_eq {
    ($a:expr, $b:expr; $($variant:ident),*) => {
        match ($a, $b) {
            $((TypedFun::$variant(x), TypedFun::$variant(y)) => {
                std::ptr::eq(Rc::as_ptr(x).cast::<()>(), Rc::as_ptr(y).cast::<()>())
            })*
            _ => false,
        }
    };
}

impl TypedFun {
    /// The kind this closure is pinned to.
    pub fn kind(&self) -> NumKind {
        with_num_kinds!(typed_fun_kind!(self))
    }

    /// Run the closure and re-tag the native result.
    pub fn eval(&self, env: &Env) -> Value {
        with_num_kinds!(typed_fun_eval!(self, env))
    }

    /// Whether both handles are the same closure. Identity shortcuts
    /// (`x * 1`) return the operand's closure unchanged, which this
    /// observes.
    pub fn ptr_eq(&self, other: &TypedFun) -> bool {
        with_num_kinds!(typed_fun_ptr_eq!(self, other))
    }
}

impl std::fmt::Debug for TypedFun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypedFun({})", self.kind())
    }
}

/// Body of a compiled expression.
#[derive(Clone, Debug)]
pub enum ExprBody {
    /// Known at compile time; evaluation clones it.
    Const(Value),
    /// Specialized closure.
    Fun(TypedFun),
}

/// A compiled expression: a static type plus a constant or closure.
#[derive(Clone, Debug)]
pub struct Expr {
    pub ty: Ty,
    pub body: ExprBody,
}

impl Expr {
    /// Constant expression; the type is derived from the value unless it
    /// is an untyped literal.
    pub fn konst(ty: Ty, value: Value) -> Expr {
        Expr {
            ty,
            body: ExprBody::Const(value),
        }
    }

    pub fn fun(f: TypedFun) -> Expr {
        Expr {
            ty: Ty::Num(f.kind()),
            body: ExprBody::Fun(f),
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self.body, ExprBody::Const(_))
    }

    /// Evaluate against an environment.
    pub fn eval(&self, env: &Env) -> Value {
        match &self.body {
            ExprBody::Const(v) => v.clone(),
            ExprBody::Fun(f) => f.eval(env),
        }
    }
}

#[cold]
#[inline(never)]
fn representation_mismatch(name: Name) -> ! {
    panic!(
        "variable #{} changed representation after compilation",
        name.raw()
    )
}

macro_rules! ident_fun {
    ($kind:expr, $name:expr; $($variant:ident),*) => {
        match $kind {
            $(NumKind::$variant => {
                let name = $name;
                TypedFun::$variant(Rc::new(move |env: &Env| match env.lookup(name) {
                    Some(Value::$variant(v)) => v,
                    _ => representation_mismatch(name),
                }))
            })*
        }
    };
}

/// Expression compiler over one arena.
pub struct Comp<'a> {
    arena: &'a SyntaxArena,
    interner: &'a StringInterner,
    resolver: &'a dyn TypeResolver,
    reads: RefCell<Vec<(Name, NumKind)>>,
}

impl<'a> Comp<'a> {
    pub fn new(
        arena: &'a SyntaxArena,
        interner: &'a StringInterner,
        resolver: &'a dyn TypeResolver,
    ) -> Comp<'a> {
        Comp {
            arena,
            interner,
            resolver,
            reads: RefCell::new(Vec::new()),
        }
    }

    /// The identifier kinds the compiled closures read out of the
    /// environment. A cached compilation is valid only while every
    /// listed binding still holds a value of the listed kind.
    pub fn into_reads(self) -> Vec<(Name, NumKind)> {
        self.reads.into_inner()
    }

    /// Compile an expression node.
    pub fn compile(&self, id: ExprId) -> Result<Expr, CompileError> {
        match &self.arena.expr(id).kind {
            ExprKind::Lit(lit) => Ok(self.compile_lit(lit)),
            ExprKind::Ident(name) => self.compile_ident(*name),
            ExprKind::Paren(inner) => self.compile(*inner),
            ExprKind::Binary { op, lhs, rhs } => self.compile_binary(*op, *lhs, *rhs),
            _ => Err(CompileError::Unsupported),
        }
    }

    fn compile_lit(&self, lit: &Lit) -> Expr {
        match lit {
            Lit::Bool(v) => Expr::konst(Ty::Bool, Value::Bool(*v)),
            Lit::Int(v) => Expr::konst(Ty::Untyped(UntypedKind::Int), Value::I64(*v)),
            Lit::Float(v) => Expr::konst(Ty::Untyped(UntypedKind::Float), Value::F64(*v)),
            Lit::Imag(im) => Expr::konst(
                Ty::Untyped(UntypedKind::Complex),
                Value::C128(Complex64::new(0.0, *im)),
            ),
            Lit::Str(name) => Expr::konst(Ty::Str, Value::string(self.interner.lookup(*name))),
        }
    }

    fn compile_ident(&self, name: Name) -> Result<Expr, CompileError> {
        match self.resolver.type_of(name) {
            Some(Ty::Num(kind)) => {
                self.reads.borrow_mut().push((name, kind));
                Ok(Expr::fun(with_num_kinds!(ident_fun!(kind, name))))
            }
            // Non-numeric and unknown identifiers take the generic path.
            _ => Err(CompileError::Unsupported),
        }
    }

    fn compile_binary(&self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> Result<Expr, CompileError> {
        if op != BinaryOp::Mul {
            return Err(CompileError::Unsupported);
        }
        let xe = self.compile(lhs)?;
        let ye = self.compile(rhs)?;
        let (kind, xe, ye) = unify(op, xe, ye)?;
        if let (ExprBody::Const(a), ExprBody::Const(b)) = (&xe.body, &ye.body) {
            // Constant folding: evaluate once, now.
            let folded = operators::evaluate_binary(op, a, b)
                .map_err(|_| CompileError::InvalidOperands {
                    op: op.as_symbol(),
                    ty: Ty::Num(kind),
                })?;
            return Ok(Expr::konst(Ty::Num(kind), folded));
        }
        mul::compile_mul(Ty::Num(kind), xe, ye)
    }
}

/// Bring both operands to one concrete kind.
///
/// Typed operands must agree exactly; an untyped constant adopts the
/// typed side's kind when exactly representable there; two untyped
/// constants widen to the larger category's default kind.
fn unify(op: BinaryOp, xe: Expr, ye: Expr) -> Result<(NumKind, Expr, Expr), CompileError> {
    match (xe.ty.clone(), ye.ty.clone()) {
        (Ty::Num(a), Ty::Num(b)) if a == b => Ok((a, xe, ye)),
        (Ty::Num(a), Ty::Num(b)) => Err(CompileError::TypeMismatch {
            lhs: Ty::Num(a),
            rhs: Ty::Num(b),
        }),
        (Ty::Num(a), Ty::Untyped(_)) => {
            let ye = adapt_const(ye, a)?;
            Ok((a, xe, ye))
        }
        (Ty::Untyped(_), Ty::Num(b)) => {
            let xe = adapt_const(xe, b)?;
            Ok((b, xe, ye))
        }
        (Ty::Untyped(ca), Ty::Untyped(cb)) => {
            let kind = ca.widen(cb).default_kind();
            let xe = adapt_const(xe, kind)?;
            let ye = adapt_const(ye, kind)?;
            Ok((kind, xe, ye))
        }
        (lhs, rhs) => {
            let ty = if lhs.is_numeric() { rhs } else { lhs };
            Err(CompileError::InvalidOperands {
                op: op.as_symbol(),
                ty,
            })
        }
    }
}

fn adapt_const(e: Expr, kind: NumKind) -> Result<Expr, CompileError> {
    let ExprBody::Const(value) = &e.body else {
        // Untyped non-constants cannot exist: closures are always typed.
        return Err(CompileError::Unsupported);
    };
    match value.adapt_kind(kind) {
        Some(adapted) => Ok(Expr::konst(Ty::Num(kind), adapted)),
        None => Err(CompileError::ConstOverflow {
            value: value.to_string(),
            kind: kind.name(),
        }),
    }
}
