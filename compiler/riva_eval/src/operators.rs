//! Generic operator dispatch.
//!
//! The fallback evaluation path for every binary and unary operator:
//! values are matched by tag on every evaluation. The expression compiler
//! replaces the hottest cases (numeric multiplication) with specialized
//! closures; everything else lands here. Both paths agree on semantics,
//! in particular integer arithmetic wraps at the operand width.

use riva_ir::{BinaryOp, UnaryOp};

use crate::errors::EvalError;
use crate::value::Value;

/// Mismatched numeric kinds are a type error; anything else means the
/// operator is not defined on these operands.
fn binary_fault(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalError {
    match (lhs.num_kind(), rhs.num_kind()) {
        (Some(a), Some(b)) if a != b => EvalError::type_mismatch(a, b),
        _ => EvalError::invalid_operands(op.as_symbol(), lhs, rhs),
    }
}

macro_rules! arith_cases {
    ($op:expr, $lhs:ident, $rhs:ident, $wrap:ident, $sym:tt) => {
        match ($lhs, $rhs) {
            (Value::I8(a), Value::I8(b)) => Ok(Value::I8(a.$wrap(*b))),
            (Value::I16(a), Value::I16(b)) => Ok(Value::I16(a.$wrap(*b))),
            (Value::I32(a), Value::I32(b)) => Ok(Value::I32(a.$wrap(*b))),
            (Value::I64(a), Value::I64(b)) => Ok(Value::I64(a.$wrap(*b))),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.$wrap(*b))),
            (Value::U8(a), Value::U8(b)) => Ok(Value::U8(a.$wrap(*b))),
            (Value::U16(a), Value::U16(b)) => Ok(Value::U16(a.$wrap(*b))),
            (Value::U32(a), Value::U32(b)) => Ok(Value::U32(a.$wrap(*b))),
            (Value::U64(a), Value::U64(b)) => Ok(Value::U64(a.$wrap(*b))),
            (Value::Uint(a), Value::Uint(b)) => Ok(Value::Uint(a.$wrap(*b))),
            (Value::Uintptr(a), Value::Uintptr(b)) => Ok(Value::Uintptr(a.$wrap(*b))),
            (Value::F32(a), Value::F32(b)) => Ok(Value::F32(a $sym b)),
            (Value::F64(a), Value::F64(b)) => Ok(Value::F64(a $sym b)),
            (Value::C64(a), Value::C64(b)) => Ok(Value::C64(*a $sym *b)),
            (Value::C128(a), Value::C128(b)) => Ok(Value::C128(*a $sym *b)),
            _ => Err(binary_fault($op, $lhs, $rhs)),
        }
    };
}

macro_rules! int_div_cases {
    ($lhs:ident, $rhs:ident, $wrap:ident, $zero_msg:expr, $fallthrough:expr) => {
        match ($lhs, $rhs) {
            (Value::I8(a), Value::I8(b)) => div_checked!(a, b, I8, $wrap, $zero_msg),
            (Value::I16(a), Value::I16(b)) => div_checked!(a, b, I16, $wrap, $zero_msg),
            (Value::I32(a), Value::I32(b)) => div_checked!(a, b, I32, $wrap, $zero_msg),
            (Value::I64(a), Value::I64(b)) => div_checked!(a, b, I64, $wrap, $zero_msg),
            (Value::Int(a), Value::Int(b)) => div_checked!(a, b, Int, $wrap, $zero_msg),
            (Value::U8(a), Value::U8(b)) => div_checked!(a, b, U8, $wrap, $zero_msg),
            (Value::U16(a), Value::U16(b)) => div_checked!(a, b, U16, $wrap, $zero_msg),
            (Value::U32(a), Value::U32(b)) => div_checked!(a, b, U32, $wrap, $zero_msg),
            (Value::U64(a), Value::U64(b)) => div_checked!(a, b, U64, $wrap, $zero_msg),
            (Value::Uint(a), Value::Uint(b)) => div_checked!(a, b, Uint, $wrap, $zero_msg),
            (Value::Uintptr(a), Value::Uintptr(b)) => {
                div_checked!(a, b, Uintptr, $wrap, $zero_msg)
            }
            _ => $fallthrough,
        }
    };
}

macro_rules! div_checked {
    ($a:ident, $b:ident, $variant:ident, $wrap:ident, $zero_msg:expr) => {
        if *$b == 0 {
            Err(EvalError::new($zero_msg))
        } else {
            Ok(Value::$variant($a.$wrap(*$b)))
        }
    };
}

macro_rules! ordered_cases {
    ($op:expr, $lhs:ident, $rhs:ident, $sym:tt) => {
        match ($lhs, $rhs) {
            (Value::I8(a), Value::I8(b)) => Ok(Value::Bool(a $sym b)),
            (Value::I16(a), Value::I16(b)) => Ok(Value::Bool(a $sym b)),
            (Value::I32(a), Value::I32(b)) => Ok(Value::Bool(a $sym b)),
            (Value::I64(a), Value::I64(b)) => Ok(Value::Bool(a $sym b)),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a $sym b)),
            (Value::U8(a), Value::U8(b)) => Ok(Value::Bool(a $sym b)),
            (Value::U16(a), Value::U16(b)) => Ok(Value::Bool(a $sym b)),
            (Value::U32(a), Value::U32(b)) => Ok(Value::Bool(a $sym b)),
            (Value::U64(a), Value::U64(b)) => Ok(Value::Bool(a $sym b)),
            (Value::Uint(a), Value::Uint(b)) => Ok(Value::Bool(a $sym b)),
            (Value::Uintptr(a), Value::Uintptr(b)) => Ok(Value::Bool(a $sym b)),
            (Value::F32(a), Value::F32(b)) => Ok(Value::Bool(a $sym b)),
            (Value::F64(a), Value::F64(b)) => Ok(Value::Bool(a $sym b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a $sym b)),
            _ => Err(binary_fault($op, $lhs, $rhs)),
        }
    };
}

/// Evaluate a binary operator on two values.
///
/// Operands must already be at the same kind; untyped-literal adaptation
/// happens before dispatch. `&&`/`||` arrive here only when both sides
/// were evaluated, the executor short-circuits before calling.
pub fn evaluate_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Mul => arith_cases!(op, lhs, rhs, wrapping_mul, *),
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => {
                Ok(Value::string(format!("{a}{b}")))
            }
            _ => arith_cases!(op, lhs, rhs, wrapping_add, +),
        },
        BinaryOp::Sub => arith_cases!(op, lhs, rhs, wrapping_sub, -),
        BinaryOp::Div => int_div_cases!(
            lhs,
            rhs,
            wrapping_div,
            "integer divide by zero",
            match (lhs, rhs) {
                (Value::F32(a), Value::F32(b)) => Ok(Value::F32(a / b)),
                (Value::F64(a), Value::F64(b)) => Ok(Value::F64(a / b)),
                (Value::C64(a), Value::C64(b)) => Ok(Value::C64(*a / *b)),
                (Value::C128(a), Value::C128(b)) => Ok(Value::C128(*a / *b)),
                _ => Err(binary_fault(op, lhs, rhs)),
            }
        ),
        BinaryOp::Rem => int_div_cases!(
            lhs,
            rhs,
            wrapping_rem,
            "integer divide by zero",
            Err(binary_fault(op, lhs, rhs))
        ),
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt => ordered_cases!(op, lhs, rhs, <),
        BinaryOp::LtEq => ordered_cases!(op, lhs, rhs, <=),
        BinaryOp::Gt => ordered_cases!(op, lhs, rhs, >),
        BinaryOp::GtEq => ordered_cases!(op, lhs, rhs, >=),
        BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(binary_fault(op, lhs, rhs)),
        },
    }
}

/// Evaluate a unary operator. `Recv` is handled by the executor, which
/// owns the channel blocking semantics.
pub fn evaluate_unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match (op, operand) {
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnaryOp::Neg, v) => negate(v),
        (UnaryOp::Recv, Value::Chan(ch)) => ch.recv(),
        (UnaryOp::Recv, v) => Err(EvalError::invalid_unary("<-", v)),
        (UnaryOp::Not, v) => Err(EvalError::invalid_unary("!", v)),
    }
}

fn negate(v: &Value) -> Result<Value, EvalError> {
    Ok(match v {
        Value::I8(v) => Value::I8(v.wrapping_neg()),
        Value::I16(v) => Value::I16(v.wrapping_neg()),
        Value::I32(v) => Value::I32(v.wrapping_neg()),
        Value::I64(v) => Value::I64(v.wrapping_neg()),
        Value::Int(v) => Value::Int(v.wrapping_neg()),
        Value::U8(v) => Value::U8(v.wrapping_neg()),
        Value::U16(v) => Value::U16(v.wrapping_neg()),
        Value::U32(v) => Value::U32(v.wrapping_neg()),
        Value::U64(v) => Value::U64(v.wrapping_neg()),
        Value::Uint(v) => Value::Uint(v.wrapping_neg()),
        Value::Uintptr(v) => Value::Uintptr(v.wrapping_neg()),
        Value::F32(v) => Value::F32(-v),
        Value::F64(v) => Value::F64(-v),
        Value::C64(v) => Value::C64(-*v),
        Value::C128(v) => Value::C128(-*v),
        other => return Err(EvalError::invalid_unary("-", other)),
    })
}
