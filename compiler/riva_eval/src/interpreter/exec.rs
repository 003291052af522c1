//! Statement execution.
//!
//! Every statement returns a [`Flow`]; loops and switches absorb the
//! break/continue flows that target them and pass every other transfer
//! upward untouched.

use std::rc::Rc;

use riva_ir::{
    AssignMode, BinaryOp, BranchKind, ExprId, ExprKind, Name, NumKind, StmtId, StmtKind,
    SwitchCase, Ty, TypeCase,
};

use crate::environment::Env;
use crate::errors::EvalError;
use crate::flow::{ExecResult, Flow};
use crate::frames::DeferredCall;
use crate::operators;
use crate::place::Place;
use crate::stack::ensure_sufficient_stack;
use crate::value::{IfaceValue, Value};

use super::Interpreter;

impl Interpreter {
    /// Execute one statement.
    pub fn exec_stmt(&mut self, env: &Env, id: StmtId) -> ExecResult {
        ensure_sufficient_stack(|| self.exec_stmt_body(env, id))
    }

    fn exec_stmt_body(&mut self, env: &Env, id: StmtId) -> ExecResult {
        let arena = self.arena.clone();
        let node = arena.stmt(id);
        let span = node.span;
        match &node.kind {
            StmtKind::Empty => Ok(Flow::VOID),
            StmtKind::Expr(expr) => Ok(Flow::Normal(self.eval_expr(env, *expr)?)),
            StmtKind::Assign {
                mode,
                targets,
                values,
            } => self.exec_assign(env, *mode, targets, values).map_err(|e| e.with_span(span)),
            StmtKind::Decl { name, ty, init } => {
                self.exec_decl(env, *name, ty.as_ref(), *init).map_err(|e| e.with_span(span))
            }
            StmtKind::Block(stmts) => {
                let scope = env.child();
                let mut last = Value::Void;
                for &stmt in stmts {
                    match self.exec_stmt(&scope, stmt)? {
                        Flow::Normal(value) => last = value,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal(last))
            }
            StmtKind::Branch { kind, label } => match kind {
                BranchKind::Break => Ok(Flow::Break(*label)),
                BranchKind::Continue => Ok(Flow::Continue(*label)),
                BranchKind::Goto => Err(EvalError::new("goto is not supported").with_span(span)),
                BranchKind::Fallthrough => {
                    Err(EvalError::new("fallthrough statement out of place").with_span(span))
                }
            },
            StmtKind::Defer { call } => self.exec_defer(env, *call).map_err(|e| e.with_span(span)),
            StmtKind::If {
                init,
                cond,
                then,
                els,
            } => {
                let scope = env.child();
                if let Some(init) = init {
                    match self.exec_stmt(&scope, *init)? {
                        Flow::Normal(_) => {}
                        other => return Ok(other),
                    }
                }
                if self.eval_cond(&scope, *cond)? {
                    self.exec_stmt(&scope, *then)
                } else if let Some(els) = els {
                    self.exec_stmt(&scope, *els)
                } else {
                    Ok(Flow::VOID)
                }
            }
            StmtKind::For {
                label,
                init,
                cond,
                post,
                body,
            } => self.exec_for(env, *label, *init, *cond, *post, *body),
            StmtKind::ForRange {
                label,
                key,
                value,
                subject,
                body,
            } => self
                .exec_for_range(env, *label, *key, *value, *subject, *body)
                .map_err(|e| e.with_span(span)),
            StmtKind::IncDec { target, negate } => {
                self.exec_inc_dec(env, *target, *negate).map_err(|e| e.with_span(span))
            }
            StmtKind::Send { chan, value } => {
                let ch = match self.eval_expr(env, *chan)? {
                    Value::Chan(ch) => ch,
                    other => {
                        return Err(EvalError::new(format!(
                            "cannot send to {}",
                            other.type_name()
                        ))
                        .with_span(span))
                    }
                };
                let value = self.eval_expr(env, *value)?;
                ch.send(value).map_err(|e| e.with_span(span))?;
                Ok(Flow::VOID)
            }
            StmtKind::Switch {
                label,
                init,
                tag,
                cases,
            } => self.exec_switch(env, *label, *init, *tag, cases),
            StmtKind::TypeSwitch {
                label,
                init,
                binding,
                subject,
                cases,
            } => self.exec_type_switch(env, *label, *init, *binding, *subject, cases),
            StmtKind::Return { results } => {
                let values = self.eval_result_list(env, results)?;
                Ok(Flow::Return(values))
            }
            StmtKind::Go { .. } => {
                Err(EvalError::new("go is not supported: the evaluator is single-threaded")
                    .with_span(span))
            }
            StmtKind::Select => Err(EvalError::new("select is not supported").with_span(span)),
        }
    }

    fn eval_cond(&mut self, env: &Env, cond: ExprId) -> Result<bool, EvalError> {
        let span = self.arena.expr(cond).span;
        match self.eval_expr(env, cond)? {
            Value::Bool(v) => Ok(v),
            other => Err(EvalError::not_a_bool(&other).with_span(span)),
        }
    }

    fn exec_assign(
        &mut self,
        env: &Env,
        mode: AssignMode,
        targets: &[ExprId],
        values: &[ExprId],
    ) -> ExecResult {
        match mode {
            AssignMode::Define => {
                let values = self.eval_value_list(env, values, targets.len())?;
                for (&target, value) in targets.iter().zip(values) {
                    let name = self.target_name(target)?;
                    env.define(name, value);
                }
            }
            AssignMode::Assign => {
                let evaluated = self.eval_value_list(env, values, targets.len())?;
                // All places resolve and all sources evaluate before the
                // first write.
                let mut writes = Vec::with_capacity(targets.len());
                for (i, (&target, value)) in targets.iter().zip(evaluated).enumerate() {
                    let place = self.resolve_place(env, target)?;
                    let old = place.get()?;
                    let source = values.get(i).copied();
                    let value = self.check_assignable(&old, value, source)?;
                    writes.push((place, value));
                }
                for (place, value) in writes {
                    place.set(value)?;
                }
            }
            AssignMode::Compound(op) => {
                let (&target, &source) = match (targets, values) {
                    ([t], [v]) => (t, v),
                    _ => {
                        return Err(EvalError::new(
                            "compound assignment takes one target and one value",
                        ))
                    }
                };
                let place = self.resolve_place(env, target)?;
                let old = place.get()?;
                let rhs = self.eval_expr(env, source)?;
                let rhs = adapt_literal(&old, rhs, self.is_numeric_literal(source));
                let new = operators::evaluate_binary(op, &old, &rhs)?;
                place.set(new)?;
            }
        }
        Ok(Flow::VOID)
    }

    /// Right-hand sides of an assignment: one expression per target, or a
    /// single call producing one value per target.
    fn eval_value_list(
        &mut self,
        env: &Env,
        values: &[ExprId],
        want: usize,
    ) -> Result<Vec<Value>, EvalError> {
        if values.len() == want {
            return values
                .iter()
                .map(|&v| self.eval_expr(env, v))
                .collect();
        }
        if let [call] = values {
            if matches!(self.arena.expr(*call).kind, ExprKind::Call { .. }) {
                let out = self.eval_call_multi(env, *call)?;
                if out.len() == want {
                    return Ok(out);
                }
                return Err(EvalError::new(format!(
                    "assignment mismatch: {want} targets but call returns {} values",
                    out.len()
                )));
            }
        }
        Err(EvalError::new(format!(
            "assignment mismatch: {want} targets but {} values",
            values.len()
        )))
    }

    fn eval_result_list(
        &mut self,
        env: &Env,
        results: &[ExprId],
    ) -> Result<Vec<Value>, EvalError> {
        if let [call] = results {
            if matches!(self.arena.expr(*call).kind, ExprKind::Call { .. }) {
                return self.eval_call_multi(env, *call);
            }
        }
        results
            .iter()
            .map(|&r| self.eval_expr(env, r))
            .collect()
    }

    fn target_name(&self, target: ExprId) -> Result<Name, EvalError> {
        match &self.arena.expr(target).kind {
            ExprKind::Ident(name) => Ok(*name),
            ExprKind::Paren(inner) => self.target_name(*inner),
            _ => Err(EvalError::new("left side of := must be an identifier")),
        }
    }

    fn resolve_place(&mut self, env: &Env, target: ExprId) -> Result<Place, EvalError> {
        let arena = self.arena.clone();
        match &arena.expr(target).kind {
            ExprKind::Ident(name) => Ok(Place::Var {
                env: env.clone(),
                name: *name,
            }),
            ExprKind::Paren(inner) => self.resolve_place(env, *inner),
            ExprKind::Index { base, index } => {
                let base = self.eval_expr(env, *base)?;
                let list = match base {
                    Value::List(items) => items,
                    other => {
                        return Err(EvalError::new(format!(
                            "cannot index {}",
                            other.type_name()
                        )))
                    }
                };
                let index = self.eval_expr(env, *index)?;
                let index = index
                    .adapt_kind(NumKind::Int)
                    .and_then(|v| match v {
                        Value::Int(i) if i >= 0 => Some(i as usize),
                        _ => None,
                    })
                    .ok_or_else(|| EvalError::new(format!("invalid list index {index}")))?;
                Ok(Place::Elem { list, index })
            }
            ExprKind::Field { base, field } => {
                let base = match self.eval_expr(env, *base)? {
                    Value::Struct(s) => s,
                    other => {
                        return Err(EvalError::new(format!(
                            "field access on {}",
                            other.type_name()
                        )))
                    }
                };
                Ok(Place::Field {
                    base,
                    field: *field,
                })
            }
            _ => Err(EvalError::new("expression is not assignable")),
        }
    }

    /// Bindings are kind-stable: plain assignment may not change a
    /// numeric binding's kind, except through a literal that adapts
    /// losslessly.
    fn check_assignable(
        &self,
        old: &Value,
        new: Value,
        source: Option<ExprId>,
    ) -> Result<Value, EvalError> {
        let (old_kind, new_kind) = match (old.num_kind(), new.num_kind()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(new),
        };
        if old_kind == new_kind {
            return Ok(new);
        }
        if source.is_some_and(|s| self.is_numeric_literal(s)) {
            if let Some(adapted) = new.adapt_kind(old_kind) {
                return Ok(adapted);
            }
        }
        Err(EvalError::type_mismatch(old_kind, new_kind))
    }

    fn exec_decl(
        &mut self,
        env: &Env,
        name: Name,
        ty: Option<&Ty>,
        init: Option<ExprId>,
    ) -> ExecResult {
        let value = match (ty, init) {
            (_, Some(init)) => {
                let value = self.eval_expr(env, init)?;
                match ty {
                    Some(ty) => self.coerce_decl(ty, value, self.is_numeric_literal(init))?,
                    None => value,
                }
            }
            (Some(ty), None) => self.zero_value(ty)?,
            (None, None) => {
                return Err(EvalError::new("declaration needs a type or an initializer"))
            }
        };
        env.define(name, value);
        Ok(Flow::VOID)
    }

    /// Check an initializer against a declared type, adapting numeric
    /// literals and wrapping interface values.
    pub(super) fn coerce_decl(&self, ty: &Ty, value: Value, from_literal: bool) -> Result<Value, EvalError> {
        match ty {
            Ty::Num(kind) => {
                if value.num_kind() == Some(*kind) {
                    return Ok(value);
                }
                if from_literal {
                    if let Some(adapted) = value.adapt_kind(*kind) {
                        return Ok(adapted);
                    }
                }
                Err(EvalError::type_mismatch(ty, value.type_name()))
            }
            Ty::Interface(iface) => {
                if self.methods.satisfies(&value, iface) {
                    Ok(Value::Iface(Rc::new(IfaceValue {
                        ty: iface.clone(),
                        concrete: value,
                    })))
                } else {
                    Err(EvalError::type_mismatch(ty, value.type_of()))
                }
            }
            Ty::Bool if matches!(value, Value::Bool(_)) => Ok(value),
            Ty::Str if matches!(value, Value::Str(_)) => Ok(value),
            Ty::List(_) if matches!(value, Value::List(_)) => Ok(value),
            Ty::Chan(_) if matches!(value, Value::Chan(_)) => Ok(value),
            Ty::Func(_) if matches!(value, Value::Func(_) | Value::Builtin(_)) => Ok(value),
            Ty::Named(want) => match &value {
                Value::Struct(s) if s.type_name == *want => Ok(value),
                _ => Err(EvalError::type_mismatch(ty, value.type_of())),
            },
            _ => Err(EvalError::type_mismatch(ty, value.type_name())),
        }
    }

    pub(super) fn zero_value(&self, ty: &Ty) -> Result<Value, EvalError> {
        match ty {
            Ty::Num(kind) => Ok(Value::zero(*kind)),
            Ty::Bool => Ok(Value::Bool(false)),
            Ty::Str => Ok(Value::string("")),
            Ty::List(_) => Ok(Value::list(Vec::new())),
            _ => Err(EvalError::new(format!(
                "declaration of type {ty} requires an initializer"
            ))),
        }
    }

    fn exec_defer(&mut self, env: &Env, call: ExprId) -> ExecResult {
        if !self.stack.in_function() {
            return Err(EvalError::new("defer outside function"));
        }
        let arena = self.arena.clone();
        let node = arena.expr(call);
        let ExprKind::Call { callee, args } = &node.kind else {
            return Err(EvalError::new("expression in defer must be a function call"));
        };
        // Callee and arguments evaluate at registration time.
        let resolved = self.resolve_callee(env, *callee)?;
        let mut call_args = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = resolved.receiver {
            call_args.push(receiver);
        }
        for &arg in args {
            call_args.push(self.eval_expr(env, arg)?);
        }
        self.stack.current_mut().defers.push(DeferredCall {
            callee: resolved.value,
            args: call_args,
            span: node.span,
        });
        Ok(Flow::VOID)
    }

    fn exec_inc_dec(&mut self, env: &Env, target: ExprId, negate: bool) -> ExecResult {
        let place = self.resolve_place(env, target)?;
        let old = place.get()?;
        let one = old
            .one_like()
            .ok_or_else(|| EvalError::invalid_unary(if negate { "--" } else { "++" }, &old))?;
        let op = if negate { BinaryOp::Sub } else { BinaryOp::Add };
        let new = operators::evaluate_binary(op, &old, &one)?;
        place.set(new)?;
        Ok(Flow::VOID)
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_for(
        &mut self,
        env: &Env,
        label: Option<Name>,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        post: Option<StmtId>,
        body: StmtId,
    ) -> ExecResult {
        let scope = env.child();
        if let Some(init) = init {
            match self.exec_stmt(&scope, init)? {
                Flow::Normal(_) => {}
                other => return Ok(other),
            }
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval_cond(&scope, cond)? {
                    break;
                }
            }
            match self.exec_stmt(&scope, body)? {
                Flow::Normal(_) => {}
                Flow::Break(l) if Flow::label_targets(l, label) => break,
                Flow::Continue(l) if Flow::label_targets(l, label) => {}
                other => return Ok(other),
            }
            if let Some(post) = post {
                match self.exec_stmt(&scope, post)? {
                    Flow::Normal(_) => {}
                    other => return Ok(other),
                }
            }
        }
        Ok(Flow::VOID)
    }

    fn exec_for_range(
        &mut self,
        env: &Env,
        label: Option<Name>,
        key: Option<Name>,
        value: Option<Name>,
        subject: ExprId,
        body: StmtId,
    ) -> ExecResult {
        // The subject evaluates once; the iteration sees a snapshot.
        let items: Vec<Value> = match self.eval_expr(env, subject)? {
            Value::List(items) => items.borrow().clone(),
            Value::Str(s) => s
                .chars()
                .map(|c| Value::string(c.to_string()))
                .collect(),
            other => {
                return Err(EvalError::new(format!(
                    "cannot range over {}",
                    other.type_name()
                )))
            }
        };
        for (i, item) in items.into_iter().enumerate() {
            let scope = env.child();
            if let Some(key) = key {
                scope.define(key, Value::Int(i as isize));
            }
            if let Some(value) = value {
                scope.define(value, item);
            }
            match self.exec_stmt(&scope, body)? {
                Flow::Normal(_) => {}
                Flow::Break(l) if Flow::label_targets(l, label) => break,
                Flow::Continue(l) if Flow::label_targets(l, label) => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::VOID)
    }

    fn exec_switch(
        &mut self,
        env: &Env,
        label: Option<Name>,
        init: Option<StmtId>,
        tag: Option<ExprId>,
        cases: &[SwitchCase],
    ) -> ExecResult {
        let scope = env.child();
        if let Some(init) = init {
            match self.exec_stmt(&scope, init)? {
                Flow::Normal(_) => {}
                other => return Ok(other),
            }
        }
        let tag_value = match tag {
            Some(tag) => self.eval_expr(&scope, tag)?,
            None => Value::Bool(true),
        };

        let mut selected = None;
        let mut default = None;
        'cases: for (i, case) in cases.iter().enumerate() {
            if case.exprs.is_empty() {
                default = Some(i);
                continue;
            }
            for &expr in &case.exprs {
                let candidate = self.eval_expr(&scope, expr)?;
                let candidate =
                    adapt_literal(&tag_value, candidate, self.is_numeric_literal(expr));
                if candidate == tag_value {
                    selected = Some(i);
                    break 'cases;
                }
            }
        }
        let Some(mut idx) = selected.or(default) else {
            return Ok(Flow::VOID);
        };

        loop {
            let (flow, falls) = self.exec_case_body(&scope, &cases[idx].body)?;
            match flow {
                Flow::Normal(_) if falls => {
                    idx += 1;
                    if idx == cases.len() {
                        return Err(EvalError::new("cannot fallthrough final case in switch"));
                    }
                }
                Flow::Normal(_) => return Ok(Flow::VOID),
                Flow::Break(l) if Flow::label_targets(l, label) => return Ok(Flow::VOID),
                other => return Ok(other),
            }
        }
    }

    /// Run one case body. A trailing `fallthrough` is consumed here and
    /// reported to the switch loop instead of being executed.
    fn exec_case_body(
        &mut self,
        scope: &Env,
        body: &[StmtId],
    ) -> Result<(Flow, bool), EvalError> {
        let arena = self.arena.clone();
        let (stmts, falls) = match body.split_last() {
            Some((&last, rest))
                if matches!(
                    arena.stmt(last).kind,
                    StmtKind::Branch {
                        kind: BranchKind::Fallthrough,
                        ..
                    }
                ) =>
            {
                (rest, true)
            }
            _ => (body, false),
        };
        let case_scope = scope.child();
        for &id in stmts {
            match self.exec_stmt(&case_scope, id)? {
                Flow::Normal(_) => {}
                other => return Ok((other, false)),
            }
        }
        Ok((Flow::VOID, falls))
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_type_switch(
        &mut self,
        env: &Env,
        label: Option<Name>,
        init: Option<StmtId>,
        binding: Option<Name>,
        subject: ExprId,
        cases: &[TypeCase],
    ) -> ExecResult {
        let scope = env.child();
        if let Some(init) = init {
            match self.exec_stmt(&scope, init)? {
                Flow::Normal(_) => {}
                other => return Ok(other),
            }
        }
        // A type switch observes the concrete value behind an interface.
        let concrete = match self.eval_expr(&scope, subject)? {
            Value::Iface(iface) => iface.concrete.clone(),
            other => other,
        };
        let dynamic = concrete.type_of();

        let mut selected = None;
        let mut default = None;
        'cases: for (i, case) in cases.iter().enumerate() {
            if case.types.is_empty() {
                default = Some(i);
                continue;
            }
            for ty in &case.types {
                let hit = match ty {
                    Ty::Interface(iface) => self.methods.satisfies(&concrete, iface),
                    other => *other == dynamic,
                };
                if hit {
                    selected = Some(i);
                    break 'cases;
                }
            }
        }
        let Some(idx) = selected.or(default) else {
            return Ok(Flow::VOID);
        };

        let case_scope = scope.child();
        if let Some(binding) = binding {
            case_scope.define(binding, concrete);
        }
        for &id in &cases[idx].body {
            match self.exec_stmt(&case_scope, id)? {
                Flow::Normal(_) => {}
                Flow::Break(l) if Flow::label_targets(l, label) => return Ok(Flow::VOID),
                other => return Ok(other),
            }
        }
        Ok(Flow::VOID)
    }
}

/// Adapt `value` to `other`'s kind when it came from a literal node.
fn adapt_literal(other: &Value, value: Value, from_literal: bool) -> Value {
    if !from_literal {
        return value;
    }
    match (other.num_kind(), value.num_kind()) {
        (Some(want), Some(have)) if want != have => value.adapt_kind(want).unwrap_or(value),
        _ => value,
    }
}
