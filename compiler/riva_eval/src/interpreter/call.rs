//! Calls, deferred calls and builtins.
//!
//! A function call pushes one frame, executes the body, then drains the
//! frame's deferred calls in reverse registration order. Fault recovery
//! happens while the defers run: `recover` reaches one frame down into
//! the frame whose defers are active and clears its fault.

use std::rc::Rc;

use tracing::trace;

use riva_ir::{ExprId, ExprKind, Span, Ty};

use crate::environment::Env;
use crate::errors::EvalError;
use crate::flow::Flow;
use crate::frames::CallFrame;
use crate::value::{ChanValue, FuncValue, Value};

use super::Interpreter;

/// A callee with the receiver it was selected through, if any.
pub(crate) struct Callee {
    pub value: Value,
    pub receiver: Option<Value>,
}

impl Interpreter {
    /// Evaluate a call expression to its full result list.
    pub(crate) fn eval_call_multi(
        &mut self,
        env: &Env,
        id: ExprId,
    ) -> Result<Vec<Value>, EvalError> {
        let arena = self.arena.clone();
        let node = arena.expr(id);
        let ExprKind::Call { callee, args } = &node.kind else {
            return Ok(vec![self.eval_expr(env, id)?]);
        };
        let resolved = self.resolve_callee(env, *callee)?;
        let mut call_args = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = resolved.receiver {
            call_args.push(receiver);
        }
        for &arg in args {
            call_args.push(self.eval_expr(env, arg)?);
        }
        self.call_value(resolved.value, call_args, node.span)
    }

    /// Resolve a callee expression. Selecting a method through a named
    /// type yields the receiver; a struct field holding a function wins
    /// over a method of the same name.
    pub(crate) fn resolve_callee(
        &mut self,
        env: &Env,
        callee: ExprId,
    ) -> Result<Callee, EvalError> {
        let arena = self.arena.clone();
        let node = arena.expr(callee);
        let ExprKind::Field { base, field } = &node.kind else {
            return Ok(Callee {
                value: self.eval_expr(env, callee)?,
                receiver: None,
            });
        };
        let base_value = self.eval_expr(env, *base)?;
        let concrete = match &base_value {
            Value::Iface(iface) => iface.concrete.clone(),
            _ => base_value,
        };
        if let Value::Struct(s) = &concrete {
            if let Some(field_value) = s.get_field(*field) {
                return Ok(Callee {
                    value: field_value,
                    receiver: None,
                });
            }
        }
        if let Ty::Named(type_name) = concrete.type_of() {
            if let Some(entry) = self.methods.lookup(type_name, *field) {
                return Ok(Callee {
                    value: entry.value.clone(),
                    receiver: Some(concrete),
                });
            }
        }
        Err(EvalError::new(format!(
            "no method or field {} on {}",
            self.interner.lookup(*field),
            concrete.type_name()
        ))
        .with_span(node.span))
    }

    /// Apply a value to arguments.
    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Vec<Value>, EvalError> {
        match callee {
            Value::Func(func) => self.call_function(&func, args, span),
            Value::Builtin(builtin) => {
                if let Some(arity) = builtin.arity {
                    if args.len() != arity {
                        return Err(EvalError::bad_call(format!(
                            "{} takes {arity} argument(s), got {}",
                            builtin.name,
                            args.len()
                        ))
                        .with_span(span));
                    }
                }
                (builtin.exec)(self, &args)
                    .map(|v| vec![v])
                    .map_err(|e| e.with_span(span))
            }
            Value::Iface(iface) => self.call_value(iface.concrete.clone(), args, span),
            other => Err(
                EvalError::bad_call(format!("{} is not a function", other.type_name()))
                    .with_span(span),
            ),
        }
    }

    fn call_function(
        &mut self,
        func: &Rc<FuncValue>,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Vec<Value>, EvalError> {
        if args.len() != func.params.len() {
            return Err(EvalError::bad_call(format!(
                "wrong number of arguments: want {}, got {}",
                func.params.len(),
                args.len()
            ))
            .with_span(span));
        }
        let fenv = func.env.child();
        for (param, arg) in func.params.iter().zip(args) {
            let arg = self
                .coerce_decl(&param.ty, arg, true)
                .map_err(|e| e.with_span(span))?;
            fenv.define(param.name, arg);
        }

        trace!(depth = self.stack.depth(), "call");
        self.stack.push(CallFrame::new(fenv.clone()));
        let flow = self.exec_stmt(&fenv, func.body);
        let outcome = match flow {
            Ok(Flow::Return(values)) => Ok(values),
            Ok(Flow::Normal(_)) => {
                if func.results.is_empty() {
                    Ok(Vec::new())
                } else {
                    Err(EvalError::new("missing return").with_span(span))
                }
            }
            Ok(Flow::Break(_)) => {
                Err(EvalError::new("break outside for or switch").with_span(span))
            }
            Ok(Flow::Continue(_)) => Err(EvalError::new("continue outside for").with_span(span)),
            Err(err) => Err(err),
        };
        let outcome = self.run_defers(func, outcome);
        self.stack.pop();
        outcome
    }

    /// Drain the current frame's deferred calls, newest first, and settle
    /// the call's outcome against any fault they recovered or raised.
    fn run_defers(
        &mut self,
        func: &Rc<FuncValue>,
        outcome: Result<Vec<Value>, EvalError>,
    ) -> Result<Vec<Value>, EvalError> {
        if self.stack.current().defers.is_empty() {
            return outcome;
        }
        let faulted = outcome.is_err();
        {
            let frame = self.stack.current_mut();
            frame.running_defers = true;
            if let Err(err) = &outcome {
                frame.fault = Some(err.clone());
            }
        }
        while let Some(deferred) = self.stack.current_mut().defers.pop() {
            trace!("running deferred call");
            match self.call_value(deferred.callee, deferred.args, deferred.span) {
                Ok(_) => {}
                // A fault inside a deferred call replaces the in-flight
                // fault, recovered or not.
                Err(new_fault) => self.stack.current_mut().fault = Some(new_fault),
            }
        }
        let frame = self.stack.current_mut();
        frame.running_defers = false;
        match frame.fault.take() {
            Some(fault) => Err(fault),
            // Recovered: the call completes with the zero value of each
            // declared result. Result types without one (channels,
            // functions, named types) complete as Void.
            None if faulted => Ok(func
                .results
                .iter()
                .map(|ty| self.zero_value(ty).unwrap_or(Value::Void))
                .collect()),
            None => outcome,
        }
    }
}

pub(super) fn builtin_fault(
    _interp: &mut Interpreter,
    args: &[Value],
) -> Result<Value, EvalError> {
    Err(EvalError::fault(args[0].clone()))
}

pub(super) fn builtin_recover(
    interp: &mut Interpreter,
    _args: &[Value],
) -> Result<Value, EvalError> {
    // Effective only when called by a function the faulting frame
    // directly deferred; `defer recover()` itself recovers nothing.
    match interp.stack.caller_mut() {
        Some(frame) if frame.running_defers => match frame.fault.take() {
            Some(err) => Ok(err
                .fault_value()
                .cloned()
                .unwrap_or_else(|| Value::string(err.to_string()))),
            None => Ok(Value::Void),
        },
        _ => Ok(Value::Void),
    }
}

pub(super) fn builtin_len(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.len() as isize)),
        Value::List(items) => Ok(Value::Int(items.borrow().len() as isize)),
        Value::Chan(ch) => Ok(Value::Int(ch.len() as isize)),
        other => Err(EvalError::new(format!(
            "len is not defined on {}",
            other.type_name()
        ))),
    }
}

pub(super) fn builtin_chan(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    let cap = args[0]
        .adapt_kind(riva_ir::NumKind::Int)
        .and_then(|v| match v {
            Value::Int(n) if n >= 0 => Some(n as usize),
            _ => None,
        })
        .ok_or_else(|| {
            EvalError::new(format!("invalid channel capacity {}", args[0]))
        })?;
    Ok(Value::Chan(ChanValue::with_capacity(cap)))
}
