//! Multiplication specializer.
//!
//! Three shapes, checked in order:
//!   * one operand is the constant one: hand back the other operand
//!     unchanged, closure identity included;
//!   * closure times closure: fuse into one closure calling both;
//!   * closure times constant: bake the constant into the closure.
//! Both-constant products never reach here, the caller folds them.

use std::rc::Rc;

use riva_ir::Ty;

use crate::environment::Env;
use crate::errors::CompileError;
use crate::value::{Complex32, Complex64, Value};

use super::{with_num_kinds, Expr, ExprBody, TypedFun};

/// Multiplication at the native machine type. Integers wrap at their
/// width; floats and complex follow IEEE.
pub(super) trait MulNative: Copy {
    fn mul_native(self, rhs: Self) -> Self;
}

macro_rules! mul_native_wrapping {
    ($($t:ty),*) => {
        $(impl MulNative for $t {
            #[inline]
            fn mul_native(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
        })*
    };
}

macro_rules! mul_native_exact {
    ($($t:ty),*) => {
        $(impl MulNative for $t {
            #[inline]
            fn mul_native(self, rhs: Self) -> Self {
                self * rhs
            }
        })*
    };
}

mul_native_wrapping!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
mul_native_exact!(f32, f64, Complex32, Complex64);

macro_rules! fuse_mul {
    ($fx:expr, $fy:expr; $($variant:ident),*) => {
        match ($fx, $fy) {
            $((TypedFun::$variant(x), TypedFun::$variant(y)) => {
                Ok(TypedFun::$variant(Rc::new(move |env: &Env| {
                    x(env).mul_native(y(env))
                })))
            })*
            _ => Err(CompileError::Unsupported),
        }
    };
}

macro_rules! scale_mul {
    ($fx:expr, $c:expr; $($variant:ident),*) => {
        match ($fx, $c) {
            $((TypedFun::$variant(x), Value::$variant(k)) => {
                Ok(TypedFun::$variant(Rc::new(move |env: &Env| {
                    x(env).mul_native(k)
                })))
            })*
            _ => Err(CompileError::Unsupported),
        }
    };
}

/// Specialize a product whose operands are already unified to one kind.
pub(super) fn compile_mul(ty: Ty, xe: Expr, ye: Expr) -> Result<Expr, CompileError> {
    // Identity shortcut: the result IS the other operand.
    if matches!(&ye.body, ExprBody::Const(c) if c.is_one()) {
        return Ok(xe);
    }
    if matches!(&xe.body, ExprBody::Const(c) if c.is_one()) {
        return Ok(ye);
    }
    let fun = match (xe.body, ye.body) {
        (ExprBody::Fun(fx), ExprBody::Fun(fy)) => fuse(fx, fy)?,
        // Multiplication commutes at every kind, one scaling shape serves
        // both orders.
        (ExprBody::Fun(fx), ExprBody::Const(c)) | (ExprBody::Const(c), ExprBody::Fun(fx)) => {
            scale(fx, c)?
        }
        (ExprBody::Const(_), ExprBody::Const(_)) => return Err(CompileError::Unsupported),
    };
    Ok(Expr {
        ty,
        body: ExprBody::Fun(fun),
    })
}

fn fuse(fx: TypedFun, fy: TypedFun) -> Result<TypedFun, CompileError> {
    with_num_kinds!(fuse_mul!(fx, fy))
}

fn scale(fx: TypedFun, c: Value) -> Result<TypedFun, CompileError> {
    with_num_kinds!(scale_mul!(fx, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use riva_ir::NumKind;

    fn counter_fun(kind_value: i32) -> TypedFun {
        TypedFun::I32(Rc::new(move |_: &Env| kind_value))
    }

    #[test]
    fn identity_returns_the_exact_operand_closure() {
        let f = counter_fun(5);
        let xe = Expr::fun(f.clone());
        let ye = Expr::konst(Ty::Num(NumKind::I32), Value::I32(1));
        let out = compile_mul(Ty::Num(NumKind::I32), xe, ye).unwrap();
        let ExprBody::Fun(out_fun) = &out.body else {
            panic!("expected a closure");
        };
        assert!(out_fun.ptr_eq(&f));
    }

    #[test]
    fn identity_shortcut_works_on_either_side() {
        let f = counter_fun(5);
        let one = Expr::konst(Ty::Num(NumKind::I32), Value::I32(1));
        let out = compile_mul(Ty::Num(NumKind::I32), one, Expr::fun(f.clone())).unwrap();
        let ExprBody::Fun(out_fun) = &out.body else {
            panic!("expected a closure");
        };
        assert!(out_fun.ptr_eq(&f));
    }

    #[test]
    fn fused_closures_wrap_at_width() {
        let env = Env::root();
        let x = TypedFun::I8(Rc::new(|_: &Env| 127i8));
        let y = TypedFun::I8(Rc::new(|_: &Env| 2i8));
        let out = compile_mul(Ty::Num(NumKind::I8), Expr::fun(x), Expr::fun(y)).unwrap();
        assert_eq!(out.eval(&env), Value::I8(-2));
    }

    #[test]
    fn scaling_bakes_the_constant_in() {
        let env = Env::root();
        let x = counter_fun(6);
        let c = Expr::konst(Ty::Num(NumKind::I32), Value::I32(7));
        let out = compile_mul(Ty::Num(NumKind::I32), Expr::fun(x), c).unwrap();
        assert_eq!(out.eval(&env), Value::I32(42));
    }

    #[test]
    fn kind_disagreement_between_closures_is_rejected() {
        let x = counter_fun(1);
        let y = TypedFun::I64(Rc::new(|_: &Env| 1i64));
        assert!(compile_mul(Ty::Num(NumKind::I32), Expr::fun(x), Expr::fun(y)).is_err());
    }
}
