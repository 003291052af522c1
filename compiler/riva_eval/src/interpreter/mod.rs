//! The tree-walking interpreter.
//!
//! Owns the program arena, the global scope, the call stack and the
//! compiled-expression cache. Statement execution lives in [`exec`],
//! calls and deferred-call handling in [`call`].

mod call;
mod exec;

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use riva_ir::{
    BinaryOp, ExprId, ExprKind, Lit, Name, NumKind, SharedInterner, StmtId, StringInterner,
    SyntaxArena, Ty,
};

use crate::compile::{Comp, Expr as CompiledExpr, TypeResolver};
use crate::environment::Env;
use crate::errors::EvalError;
use crate::flow::Flow;
use crate::frames::CallStack;
use crate::methods::MethodRegistry;
use crate::operators;
use crate::stack::ensure_sufficient_stack;
use crate::value::{BuiltinFn, Complex64, FuncValue, TypedValue, Value};

/// Pre-interned names the interpreter refers to by identity.
struct WellKnown {
    fault: Name,
    recover: Name,
    len: Name,
    chan: Name,
}

impl WellKnown {
    fn new(interner: &StringInterner) -> WellKnown {
        WellKnown {
            fault: interner.intern("fault"),
            recover: interner.intern("recover"),
            len: interner.intern("len"),
            chan: interner.intern("chan"),
        }
    }
}

/// Interpreter over one parsed program.
pub struct Interpreter {
    arena: Rc<SyntaxArena>,
    interner: SharedInterner,
    globals: Env,
    stack: CallStack,
    methods: MethodRegistry,
    /// Per-node compiled expressions. `None` records that compilation
    /// declined, so the generic path is taken without retrying.
    cache: RefCell<FxHashMap<ExprId, Option<CachedExpr>>>,
}

/// A compiled expression plus the identifier kinds it was specialized
/// against. Reuse requires every listed kind to still hold.
#[derive(Clone)]
struct CachedExpr {
    expr: CompiledExpr,
    reads: Vec<(Name, NumKind)>,
}

/// Resolver backing the expression compiler: an identifier's compiled
/// representation is the kind of its current binding. Plain assignment
/// is kind-stable, but a re-declaration (`:=`, a range binding) may
/// rebind the name at a new kind, so cached compilations are
/// revalidated against the environment before every reuse.
struct EnvResolver<'a> {
    env: &'a Env,
}

impl TypeResolver for EnvResolver<'_> {
    fn type_of(&self, name: Name) -> Option<Ty> {
        match self.env.lookup(name)?.type_of() {
            ty @ Ty::Num(_) => Some(ty),
            _ => None,
        }
    }
}

/// Whether every binding a compiled expression reads still holds a value
/// of the kind it was specialized against.
fn reads_hold(env: &Env, reads: &[(Name, NumKind)]) -> bool {
    reads
        .iter()
        .all(|&(name, kind)| env.lookup(name).and_then(|v| v.num_kind()) == Some(kind))
}

impl Interpreter {
    pub fn new(arena: Rc<SyntaxArena>, interner: SharedInterner) -> Interpreter {
        let globals = Env::root();
        let names = WellKnown::new(&interner);
        install_builtins(&globals, &names);
        Interpreter {
            arena,
            interner,
            stack: CallStack::new(globals.clone()),
            globals,
            methods: MethodRegistry::new(),
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn globals(&self) -> &Env {
        &self.globals
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn methods_mut(&mut self) -> &mut MethodRegistry {
        &mut self.methods
    }

    /// Number of expression nodes holding a cached specialized form.
    pub fn compiled_count(&self) -> usize {
        self.cache.borrow().values().filter(|e| e.is_some()).count()
    }

    /// Attach a method to a named type.
    ///
    /// `func` takes the receiver as its first parameter; the registered
    /// signature drops it so interface comparison sees the call shape.
    pub fn register_method(&mut self, type_name: Name, method: Name, func: Rc<FuncValue>) {
        let mut sig = func.signature();
        if !sig.params.is_empty() {
            sig.params.remove(0);
        }
        self.methods.register(
            type_name,
            method,
            TypedValue {
                ty: Ty::Func(Rc::new(sig)),
                value: Value::Func(func),
            },
        );
    }

    /// Run a statement sequence at top level.
    ///
    /// Returns the last statement's value together with the extra
    /// results when that statement was a bare multi-valued call. A
    /// control transfer escaping the sequence is an error, never a
    /// silent exit.
    pub fn execute(&mut self, stmts: &[StmtId]) -> Result<(Value, Vec<Value>), EvalError> {
        let env = self.globals.clone();
        let mut last = (Value::Void, Vec::new());
        for (i, &id) in stmts.iter().enumerate() {
            let is_final = i + 1 == stmts.len();
            if is_final {
                if let riva_ir::StmtKind::Expr(expr) = &self.arena.clone().stmt(id).kind {
                    if matches!(self.arena.expr(*expr).kind, ExprKind::Call { .. }) {
                        let values = self.eval_call_multi(&env, *expr)?;
                        let first = values.first().cloned().unwrap_or(Value::Void);
                        last = (first, values);
                        continue;
                    }
                }
            }
            match self.exec_stmt(&env, id)? {
                Flow::Normal(value) => last = (value, Vec::new()),
                Flow::Break(_) => {
                    return Err(EvalError::new("break outside for or switch")
                        .with_span(self.arena.stmt(id).span))
                }
                Flow::Continue(_) => {
                    return Err(
                        EvalError::new("continue outside for").with_span(self.arena.stmt(id).span)
                    )
                }
                Flow::Return(_) => {
                    return Err(EvalError::new("return outside function")
                        .with_span(self.arena.stmt(id).span))
                }
            }
        }
        Ok(last)
    }

    /// Evaluate an expression to a single value.
    pub fn eval_expr(&mut self, env: &Env, id: ExprId) -> Result<Value, EvalError> {
        ensure_sufficient_stack(|| self.eval_expr_body(env, id))
    }

    fn eval_expr_body(&mut self, env: &Env, id: ExprId) -> Result<Value, EvalError> {
        let arena = self.arena.clone();
        let node = arena.expr(id);
        match &node.kind {
            ExprKind::Lit(lit) => self.literal_value(lit).map_err(|e| e.with_span(node.span)),
            ExprKind::Ident(name) => env
                .lookup(*name)
                .ok_or_else(|| EvalError::undefined(*name).with_span(node.span)),
            ExprKind::Paren(inner) => self.eval_expr(env, *inner),
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(env, *operand)?;
                operators::evaluate_unary(*op, &value).map_err(|e| e.with_span(node.span))
            }
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(env, id, *op, *lhs, *rhs),
            ExprKind::Call { .. } => {
                let values = self.eval_call_multi(env, id)?;
                match values.len() {
                    0 => Ok(Value::Void),
                    1 => Ok(values.into_iter().next().unwrap_or(Value::Void)),
                    n => Err(EvalError::new(format!(
                        "multiple-value call ({n} values) in single-value context"
                    ))
                    .with_span(node.span)),
                }
            }
            ExprKind::Index { base, index } => {
                let base = self.eval_expr(env, *base)?;
                let index = self.eval_expr(env, *index)?;
                self.eval_index(&base, &index).map_err(|e| e.with_span(node.span))
            }
            ExprKind::Field { base, field } => {
                let base = self.eval_expr(env, *base)?;
                match &base {
                    Value::Struct(s) => s.get_field(*field).ok_or_else(|| {
                        EvalError::new(format!(
                            "no field {} on {}",
                            self.interner.lookup(*field),
                            self.interner.lookup(s.type_name)
                        ))
                        .with_span(node.span)
                    }),
                    other => Err(EvalError::new(format!(
                        "field access on {}",
                        other.type_name()
                    ))
                    .with_span(node.span)),
                }
            }
            ExprKind::FuncLit {
                params,
                results,
                body,
            } => Ok(Value::Func(Rc::new(FuncValue {
                name: None,
                params: params.clone(),
                results: results.clone(),
                body: *body,
                env: env.clone(),
            }))),
        }
    }

    /// Literal to value; untyped numerics default per category. An
    /// integer literal wider than the native `int` is a fault, not a
    /// truncation.
    fn literal_value(&self, lit: &Lit) -> Result<Value, EvalError> {
        Ok(match lit {
            Lit::Bool(v) => Value::Bool(*v),
            Lit::Int(v) => isize::try_from(*v)
                .map(Value::Int)
                .map_err(|_| EvalError::new(format!("integer literal {v} overflows int")))?,
            Lit::Float(v) => Value::F64(*v),
            Lit::Imag(im) => Value::C128(Complex64::new(0.0, *im)),
            Lit::Str(name) => Value::string(self.interner.lookup(*name)),
        })
    }

    fn eval_binary(
        &mut self,
        env: &Env,
        id: ExprId,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Result<Value, EvalError> {
        let span = self.arena.expr(id).span;

        // Short-circuit forms never use the compiled path.
        if op == BinaryOp::And || op == BinaryOp::Or {
            return self.eval_short_circuit(env, op, lhs, rhs, span);
        }

        if let Some(compiled) = self.compiled_for(env, id, span)? {
            return Ok(compiled.eval(env));
        }

        let a = self.eval_expr(env, lhs)?;
        let b = self.eval_expr(env, rhs)?;
        let (a, b) = self.adapt_operands(a, b, lhs, rhs);
        operators::evaluate_binary(op, &a, &b).map_err(|e| e.with_span(span))
    }

    /// Fetch or build the compiled form of a binary node.
    fn compiled_for(
        &mut self,
        env: &Env,
        id: ExprId,
        span: riva_ir::Span,
    ) -> Result<Option<CompiledExpr>, EvalError> {
        if let Some(entry) = self.cache.borrow().get(&id) {
            match entry {
                None => return Ok(None),
                Some(cached) if reads_hold(env, &cached.reads) => {
                    return Ok(Some(cached.expr.clone()));
                }
                // A binding changed kind since the node was compiled;
                // compile again against the current environment.
                Some(_) => {}
            }
        }
        let resolver = EnvResolver { env };
        let comp = Comp::new(&self.arena, &self.interner, &resolver);
        match comp.compile(id) {
            Ok(compiled) => {
                trace!(node = id.index(), "expression compiled");
                self.cache.borrow_mut().insert(
                    id,
                    Some(CachedExpr {
                        expr: compiled.clone(),
                        reads: comp.into_reads(),
                    }),
                );
                Ok(Some(compiled))
            }
            Err(err) if err.is_fallback() => {
                trace!(node = id.index(), "generic dispatch");
                self.cache.borrow_mut().insert(id, None);
                Ok(None)
            }
            // A hard compile error is the same type error the generic
            // path would raise.
            Err(err) => Err(err.into_eval_error(span)),
        }
    }

    fn eval_short_circuit(
        &mut self,
        env: &Env,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        span: riva_ir::Span,
    ) -> Result<Value, EvalError> {
        let a = self.eval_expr(env, lhs)?;
        match (&a, op) {
            (Value::Bool(false), BinaryOp::And) => return Ok(Value::Bool(false)),
            (Value::Bool(true), BinaryOp::Or) => return Ok(Value::Bool(true)),
            (Value::Bool(_), _) => {}
            (other, _) => return Err(EvalError::not_a_bool(other).with_span(span)),
        }
        let b = self.eval_expr(env, rhs)?;
        match b {
            Value::Bool(_) => Ok(b),
            other => Err(EvalError::not_a_bool(&other).with_span(span)),
        }
    }

    /// When exactly one operand node is a numeric literal, adapt its
    /// value to the other operand's kind. Lossy adaptations are left
    /// alone so dispatch reports the mismatch.
    fn adapt_operands(
        &self,
        a: Value,
        b: Value,
        lhs: ExprId,
        rhs: ExprId,
    ) -> (Value, Value) {
        let (ka, kb) = match (a.num_kind(), b.num_kind()) {
            (Some(ka), Some(kb)) if ka != kb => (ka, kb),
            _ => return (a, b),
        };
        if self.is_numeric_literal(rhs) {
            if let Some(adapted) = b.adapt_kind(ka) {
                return (a, adapted);
            }
        }
        if self.is_numeric_literal(lhs) {
            if let Some(adapted) = a.adapt_kind(kb) {
                return (adapted, b);
            }
        }
        (a, b)
    }

    fn is_numeric_literal(&self, id: ExprId) -> bool {
        match &self.arena.expr(id).kind {
            ExprKind::Lit(Lit::Int(_) | Lit::Float(_) | Lit::Imag(_)) => true,
            ExprKind::Paren(inner) => self.is_numeric_literal(*inner),
            _ => false,
        }
    }

    fn eval_index(&self, base: &Value, index: &Value) -> Result<Value, EvalError> {
        let list = match base {
            Value::List(items) => items,
            other => {
                return Err(EvalError::new(format!(
                    "cannot index {}",
                    other.type_name()
                )))
            }
        };
        let idx = index
            .adapt_kind(NumKind::Int)
            .and_then(|v| match v {
                Value::Int(i) if i >= 0 => Some(i as usize),
                _ => None,
            })
            .ok_or_else(|| EvalError::new(format!("invalid list index {index}")))?;
        let items = list.borrow();
        items
            .get(idx)
            .cloned()
            .ok_or_else(|| {
                EvalError::new(format!(
                    "index out of range [{idx}] with length {}",
                    items.len()
                ))
            })
    }
}

fn install_builtins(globals: &Env, names: &WellKnown) {
    let defs: [(Name, &'static str, Option<usize>, fn(&mut Interpreter, &[Value]) -> Result<Value, EvalError>); 4] = [
        (names.fault, "fault", Some(1), call::builtin_fault),
        (names.recover, "recover", Some(0), call::builtin_recover),
        (names.len, "len", Some(1), call::builtin_len),
        (names.chan, "chan", Some(1), call::builtin_chan),
    ];
    for (name, label, arity, exec) in defs {
        globals.define(
            name,
            Value::Builtin(Rc::new(BuiltinFn {
                name: label,
                arity,
                exec,
            })),
        );
    }
}
