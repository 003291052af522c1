//! Evaluation faults and compile-stage errors.
//!
//! `EvalError` is the fault channel of the executor: runtime type errors,
//! unbound names, and user faults raised through the `fault` builtin all
//! travel through `Result::Err`. Control transfer (break, continue,
//! return) is NOT an error; it lives in [`crate::flow::Flow`].
//!
//! `CompileError` is the quieter cousin: the expression compiler reports
//! why it declined to specialize a node, and the caller falls back to
//! generic dispatch instead of failing the program.

use std::fmt;

use riva_ir::{Name, Span, Ty};

use crate::value::Value;

/// Classified evaluation fault.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalErrorKind {
    /// Name not bound in any enclosing scope.
    Undefined { name: Name },
    /// Operator applied to operands it does not accept.
    InvalidOperands { op: &'static str, detail: String },
    /// Two typed numeric operands of different kinds.
    TypeMismatch { expected: String, found: String },
    /// Callee is not callable, or argument count is wrong.
    BadCall { detail: String },
    /// `fault(v)` raised by user code; carries the fault value.
    Fault { value: Value },
    /// Everything else, preformatted.
    Message(String),
}

/// Evaluation fault with the source span it was raised at.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Span,
}

impl EvalError {
    pub fn new(msg: impl Into<String>) -> EvalError {
        EvalError {
            kind: EvalErrorKind::Message(msg.into()),
            span: Span::SYNTHETIC,
        }
    }

    pub fn with_span(mut self, span: Span) -> EvalError {
        if self.span == Span::SYNTHETIC {
            self.span = span;
        }
        self
    }

    pub fn undefined(name: Name) -> EvalError {
        EvalError {
            kind: EvalErrorKind::Undefined { name },
            span: Span::SYNTHETIC,
        }
    }

    pub fn invalid_operands(op: &'static str, lhs: &Value, rhs: &Value) -> EvalError {
        EvalError {
            kind: EvalErrorKind::InvalidOperands {
                op,
                detail: format!("{} and {}", lhs.type_name(), rhs.type_name()),
            },
            span: Span::SYNTHETIC,
        }
    }

    pub fn invalid_unary(op: &'static str, operand: &Value) -> EvalError {
        EvalError {
            kind: EvalErrorKind::InvalidOperands {
                op,
                detail: operand.type_name().to_owned(),
            },
            span: Span::SYNTHETIC,
        }
    }

    pub fn type_mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> EvalError {
        EvalError {
            kind: EvalErrorKind::TypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            },
            span: Span::SYNTHETIC,
        }
    }

    pub fn bad_call(detail: impl Into<String>) -> EvalError {
        EvalError {
            kind: EvalErrorKind::BadCall {
                detail: detail.into(),
            },
            span: Span::SYNTHETIC,
        }
    }

    /// User fault raised by the `fault` builtin. Recoverable via the
    /// `recover` builtin inside a deferred call.
    pub fn fault(value: Value) -> EvalError {
        EvalError {
            kind: EvalErrorKind::Fault { value },
            span: Span::SYNTHETIC,
        }
    }

    pub fn not_a_bool(found: &Value) -> EvalError {
        EvalError::type_mismatch(Ty::Bool, found.type_name())
    }

    /// The fault value, when this error is a user fault.
    pub fn fault_value(&self) -> Option<&Value> {
        match &self.kind {
            EvalErrorKind::Fault { value } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EvalErrorKind::Undefined { name } => {
                write!(f, "undefined identifier #{}", name.raw())
            }
            EvalErrorKind::InvalidOperands { op, detail } => {
                write!(f, "invalid operation: operator {op} not defined on {detail}")
            }
            EvalErrorKind::TypeMismatch { expected, found } => {
                write!(f, "mismatched types: expected {expected}, found {found}")
            }
            EvalErrorKind::BadCall { detail } => write!(f, "cannot call: {detail}"),
            EvalErrorKind::Fault { value } => write!(f, "fault: {value}"),
            EvalErrorKind::Message(msg) => f.write_str(msg),
        }?;
        if self.span != Span::SYNTHETIC {
            write!(f, " at {}", self.span)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// Why the expression compiler declined to specialize a node.
///
/// Never surfaced to the user directly: `Unsupported` means "fall back
/// to generic dispatch", while the typed variants become an `EvalError`
/// when the same check would also fail at evaluation time.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("expression form not specialized")]
    Unsupported,
    #[error("mismatched types: {lhs} and {rhs}")]
    TypeMismatch { lhs: Ty, rhs: Ty },
    #[error("operator {op} not defined on {ty}")]
    InvalidOperands { op: &'static str, ty: Ty },
    #[error("constant {value} overflows {kind}")]
    ConstOverflow { value: String, kind: &'static str },
}

impl CompileError {
    /// Convert a hard compile error into the evaluation fault the generic
    /// path would raise for the same program.
    pub fn into_eval_error(self, span: Span) -> EvalError {
        EvalError::new(self.to_string()).with_span(span)
    }

    /// Whether the caller should fall back to generic dispatch rather
    /// than report anything.
    pub fn is_fallback(&self) -> bool {
        matches!(self, CompileError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riva_ir::NumKind;

    #[test]
    fn fault_round_trips_its_value() {
        let err = EvalError::fault(Value::string("boom"));
        assert_eq!(err.fault_value(), Some(&Value::string("boom")));
        assert_eq!(EvalError::new("x").fault_value(), None);
    }

    #[test]
    fn with_span_keeps_the_first_span() {
        let a = Span { start: 1, end: 5 };
        let b = Span { start: 9, end: 12 };
        let err = EvalError::new("oops").with_span(a).with_span(b);
        assert_eq!(err.span, a);
    }

    #[test]
    fn compile_error_messages() {
        let err = CompileError::TypeMismatch {
            lhs: Ty::Num(NumKind::I8),
            rhs: Ty::Num(NumKind::U64),
        };
        assert_eq!(err.to_string(), "mismatched types: int8 and uint64");
        assert!(CompileError::Unsupported.is_fallback());
        assert!(!err.is_fallback());
    }
}
