//! Tagged runtime values.
//!
//! `Value` carries one variant per numeric machine kind so a compiled
//! closure can extract its operand without widening: the machine
//! representation of a `Value::I16` is exactly an `i16`. Composite values
//! (`List`, `Struct`, channels, functions) are reference-counted; cloning
//! a `Value` never deep-copies them.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use crossbeam::channel::{bounded, Receiver, Sender};
use rustc_hash::FxHashMap;

use riva_ir::{FuncTy, InterfaceTy, Name, NumKind, Param, StmtId, Ty};

use crate::environment::Env;
use crate::errors::EvalError;
use crate::interpreter::Interpreter;

/// Fixed-width complex number backing `complex64`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

/// Fixed-width complex number backing `complex128`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

macro_rules! complex_ops {
    ($name:ident, $f:ty) => {
        impl $name {
            pub const fn new(re: $f, im: $f) -> Self {
                Self { re, im }
            }

            pub const ONE: Self = Self { re: 1.0, im: 0.0 };
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self::new(self.re + rhs.re, self.im + rhs.im)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self::new(self.re - rhs.re, self.im - rhs.im)
            }
        }

        impl Mul for $name {
            type Output = Self;
            fn mul(self, rhs: Self) -> Self {
                Self::new(
                    self.re * rhs.re - self.im * rhs.im,
                    self.re * rhs.im + self.im * rhs.re,
                )
            }
        }

        impl Div for $name {
            type Output = Self;
            fn div(self, rhs: Self) -> Self {
                let denom = rhs.re * rhs.re + rhs.im * rhs.im;
                Self::new(
                    (self.re * rhs.re + self.im * rhs.im) / denom,
                    (self.im * rhs.re - self.re * rhs.im) / denom,
                )
            }
        }

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self::new(-self.re, -self.im)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.im < 0.0 {
                    write!(f, "({}{}i)", self.re, self.im)
                } else {
                    write!(f, "({}+{}i)", self.re, self.im)
                }
            }
        }
    };
}

complex_ops!(Complex32, f32);
complex_ops!(Complex64, f64);

/// Tagged runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    /// Absence of a value (empty statement results, void calls).
    Void,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Int(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Uint(usize),
    Uintptr(usize),
    F32(f32),
    F64(f64),
    C64(Complex32),
    C128(Complex64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Struct(Rc<StructValue>),
    Func(Rc<FuncValue>),
    Builtin(Rc<BuiltinFn>),
    Chan(ChanValue),
    /// Interpreted polymorphic value: an interface type paired with the
    /// concrete value satisfying it.
    Iface(Rc<IfaceValue>),
}

/// Struct instance: a named type plus mutable fields.
#[derive(Debug)]
pub struct StructValue {
    pub type_name: Name,
    pub fields: RefCell<FxHashMap<Name, Value>>,
}

impl StructValue {
    pub fn new(type_name: Name, fields: FxHashMap<Name, Value>) -> Self {
        StructValue {
            type_name,
            fields: RefCell::new(fields),
        }
    }

    pub fn get_field(&self, name: Name) -> Option<Value> {
        self.fields.borrow().get(&name).cloned()
    }

    pub fn set_field(&self, name: Name, value: Value) {
        self.fields.borrow_mut().insert(name, value);
    }
}

/// Interpreted function: parameters, result types, body, and the
/// environment it was defined in (captured by reference).
#[derive(Debug)]
pub struct FuncValue {
    pub name: Option<Name>,
    pub params: Vec<Param>,
    pub results: Vec<Ty>,
    pub body: StmtId,
    pub env: Env,
}

impl FuncValue {
    /// Receiver-less signature of this function.
    pub fn signature(&self) -> FuncTy {
        FuncTy {
            params: self.params.iter().map(|p| p.ty.clone()).collect(),
            results: self.results.clone(),
        }
    }
}

/// Host function installed in the program scope (`fault`, `recover`, ...).
pub struct BuiltinFn {
    pub name: &'static str,
    /// Expected argument count; `None` skips the check.
    pub arity: Option<usize>,
    pub exec: fn(&mut Interpreter, &[Value]) -> Result<Value, EvalError>,
}

impl fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFn({})", self.name)
    }
}

/// Channel value: both ends of a crossbeam channel.
///
/// A send statement defers to the native blocking send; capacity zero is
/// a rendezvous channel.
#[derive(Clone, Debug)]
pub struct ChanValue {
    sender: Sender<Value>,
    receiver: Receiver<Value>,
}

impl ChanValue {
    pub fn with_capacity(cap: usize) -> Self {
        let (sender, receiver) = bounded(cap);
        ChanValue { sender, receiver }
    }

    /// Blocking send. Fails only when every other handle is gone.
    pub fn send(&self, value: Value) -> Result<(), EvalError> {
        self.sender
            .send(value)
            .map_err(|_| EvalError::new("send on closed channel"))
    }

    /// Blocking receive.
    pub fn recv(&self) -> Result<Value, EvalError> {
        self.receiver
            .recv()
            .map_err(|_| EvalError::new("receive on closed channel"))
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn same_channel(&self, other: &ChanValue) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

/// Interface value: the interface type plus the concrete value bound to
/// it. Satisfaction was checked structurally when the value was bound.
#[derive(Clone, Debug)]
pub struct IfaceValue {
    pub ty: Rc<InterfaceTy>,
    pub concrete: Value,
}

/// A value paired with its static type.
///
/// Inside a method table the type is the receiver-less signature and the
/// value is the receiver-taking implementation.
#[derive(Clone, Debug)]
pub struct TypedValue {
    pub ty: Ty,
    pub value: Value,
}

/// Method table of a named type: method name to signature + implementation.
pub type Methods = FxHashMap<Name, TypedValue>;

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Numeric machine kind of this value, if it is numeric.
    pub fn num_kind(&self) -> Option<NumKind> {
        match self {
            Value::I8(_) => Some(NumKind::I8),
            Value::I16(_) => Some(NumKind::I16),
            Value::I32(_) => Some(NumKind::I32),
            Value::I64(_) => Some(NumKind::I64),
            Value::Int(_) => Some(NumKind::Int),
            Value::U8(_) => Some(NumKind::U8),
            Value::U16(_) => Some(NumKind::U16),
            Value::U32(_) => Some(NumKind::U32),
            Value::U64(_) => Some(NumKind::U64),
            Value::Uint(_) => Some(NumKind::Uint),
            Value::Uintptr(_) => Some(NumKind::Uintptr),
            Value::F32(_) => Some(NumKind::F32),
            Value::F64(_) => Some(NumKind::F64),
            Value::C64(_) => Some(NumKind::C64),
            Value::C128(_) => Some(NumKind::C128),
            _ => None,
        }
    }

    /// Dynamic type of this value. Interface values report their
    /// concrete type, matching type-switch semantics.
    pub fn type_of(&self) -> Ty {
        match self {
            Value::Void => Ty::Invalid,
            Value::Bool(_) => Ty::Bool,
            Value::Str(_) => Ty::Str,
            Value::List(_) => Ty::list(Ty::Invalid),
            Value::Struct(s) => Ty::Named(s.type_name),
            Value::Func(f) => Ty::Func(Rc::new(f.signature())),
            Value::Builtin(_) => Ty::Func(Rc::new(FuncTy::default())),
            Value::Chan(_) => Ty::chan(Ty::Invalid),
            Value::Iface(iface) => iface.concrete.type_of(),
            other => match other.num_kind() {
                Some(kind) => Ty::Num(kind),
                None => Ty::Invalid,
            },
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
            Value::Func(_) => "func",
            Value::Builtin(_) => "builtin",
            Value::Chan(_) => "chan",
            Value::Iface(_) => "interface",
            other => match other.num_kind() {
                Some(kind) => kind.name(),
                None => "value",
            },
        }
    }

    /// The zero value of a machine kind.
    pub fn zero(kind: NumKind) -> Value {
        match kind {
            NumKind::I8 => Value::I8(0),
            NumKind::I16 => Value::I16(0),
            NumKind::I32 => Value::I32(0),
            NumKind::I64 => Value::I64(0),
            NumKind::Int => Value::Int(0),
            NumKind::U8 => Value::U8(0),
            NumKind::U16 => Value::U16(0),
            NumKind::U32 => Value::U32(0),
            NumKind::U64 => Value::U64(0),
            NumKind::Uint => Value::Uint(0),
            NumKind::Uintptr => Value::Uintptr(0),
            NumKind::F32 => Value::F32(0.0),
            NumKind::F64 => Value::F64(0.0),
            NumKind::C64 => Value::C64(Complex32::default()),
            NumKind::C128 => Value::C128(Complex64::default()),
        }
    }

    /// The multiplicative identity of a machine kind.
    pub fn one(kind: NumKind) -> Value {
        match kind {
            NumKind::I8 => Value::I8(1),
            NumKind::I16 => Value::I16(1),
            NumKind::I32 => Value::I32(1),
            NumKind::I64 => Value::I64(1),
            NumKind::Int => Value::Int(1),
            NumKind::U8 => Value::U8(1),
            NumKind::U16 => Value::U16(1),
            NumKind::U32 => Value::U32(1),
            NumKind::U64 => Value::U64(1),
            NumKind::Uint => Value::Uint(1),
            NumKind::Uintptr => Value::Uintptr(1),
            NumKind::F32 => Value::F32(1.0),
            NumKind::F64 => Value::F64(1.0),
            NumKind::C64 => Value::C64(Complex32::ONE),
            NumKind::C128 => Value::C128(Complex64::ONE),
        }
    }

    /// Whether this value is the multiplicative identity of its kind.
    pub fn is_one(&self) -> bool {
        match self {
            Value::I8(1)
            | Value::I16(1)
            | Value::I32(1)
            | Value::I64(1)
            | Value::Int(1)
            | Value::U8(1)
            | Value::U16(1)
            | Value::U32(1)
            | Value::U64(1)
            | Value::Uint(1)
            | Value::Uintptr(1) => true,
            Value::F32(v) => *v == 1.0,
            Value::F64(v) => *v == 1.0,
            Value::C64(v) => *v == Complex32::ONE,
            Value::C128(v) => *v == Complex64::ONE,
            _ => false,
        }
    }

    /// The literal one at this value's kind, used by `++`/`--`.
    pub fn one_like(&self) -> Option<Value> {
        self.num_kind().map(Value::one)
    }

    /// Losslessly convert a numeric value to another kind.
    ///
    /// Returns `None` when the value is not exactly representable at the
    /// target kind, or when either side is non-numeric. Integer-to-float
    /// conversion is always allowed (untyped constants round).
    pub fn adapt_kind(&self, kind: NumKind) -> Option<Value> {
        if self.num_kind() == Some(kind) {
            return Some(self.clone());
        }
        if kind.is_integer() {
            let wide = self.to_i128()?;
            return from_i128(wide, kind);
        }
        if kind.is_float() {
            let f = self.to_f64()?;
            return Some(match kind {
                NumKind::F32 => Value::F32(f as f32),
                _ => Value::F64(f),
            });
        }
        // Complex target: real part from any numeric, imaginary preserved.
        let (re, im) = self.to_complex_parts()?;
        Some(match kind {
            NumKind::C64 => Value::C64(Complex32::new(re as f32, im as f32)),
            _ => Value::C128(Complex64::new(re, im)),
        })
    }

    /// Widen an integer value to `i128`. Floats qualify only when their
    /// fractional part is zero; complex values only when purely real.
    fn to_i128(&self) -> Option<i128> {
        match self {
            Value::I8(v) => Some(i128::from(*v)),
            Value::I16(v) => Some(i128::from(*v)),
            Value::I32(v) => Some(i128::from(*v)),
            Value::I64(v) => Some(i128::from(*v)),
            Value::Int(v) => Some(*v as i128),
            Value::U8(v) => Some(i128::from(*v)),
            Value::U16(v) => Some(i128::from(*v)),
            Value::U32(v) => Some(i128::from(*v)),
            Value::U64(v) => Some(i128::from(*v)),
            Value::Uint(v) | Value::Uintptr(v) => Some(*v as i128),
            Value::F32(v) if v.fract() == 0.0 => Some(*v as i128),
            Value::F64(v) if v.fract() == 0.0 => Some(*v as i128),
            Value::C64(v) if v.im == 0.0 && v.re.fract() == 0.0 => Some(v.re as i128),
            Value::C128(v) if v.im == 0.0 && v.re.fract() == 0.0 => Some(v.re as i128),
            _ => None,
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            Value::C64(v) if v.im == 0.0 => Some(f64::from(v.re)),
            Value::C128(v) if v.im == 0.0 => Some(v.re),
            other => other.to_i128().map(|v| v as f64),
        }
    }

    fn to_complex_parts(&self) -> Option<(f64, f64)> {
        match self {
            Value::C64(v) => Some((f64::from(v.re), f64::from(v.im))),
            Value::C128(v) => Some((v.re, v.im)),
            other => other.to_f64().map(|re| (re, 0.0)),
        }
    }
}

fn from_i128(wide: i128, kind: NumKind) -> Option<Value> {
    Some(match kind {
        NumKind::I8 => Value::I8(i8::try_from(wide).ok()?),
        NumKind::I16 => Value::I16(i16::try_from(wide).ok()?),
        NumKind::I32 => Value::I32(i32::try_from(wide).ok()?),
        NumKind::I64 => Value::I64(i64::try_from(wide).ok()?),
        NumKind::Int => Value::Int(isize::try_from(wide).ok()?),
        NumKind::U8 => Value::U8(u8::try_from(wide).ok()?),
        NumKind::U16 => Value::U16(u16::try_from(wide).ok()?),
        NumKind::U32 => Value::U32(u32::try_from(wide).ok()?),
        NumKind::U64 => Value::U64(u64::try_from(wide).ok()?),
        NumKind::Uint => Value::Uint(usize::try_from(wide).ok()?),
        NumKind::Uintptr => Value::Uintptr(usize::try_from(wide).ok()?),
        _ => return None,
    })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Uintptr(a), Value::Uintptr(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::C64(a), Value::C64(b)) => a == b,
            (Value::C128(a), Value::C128(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Struct(a), Value::Struct(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.type_name == b.type_name && *a.fields.borrow() == *b.fields.borrow())
            }
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Chan(a), Value::Chan(b)) => a.same_channel(b),
            (Value::Iface(a), Value::Iface(b)) => a.concrete == b.concrete,
            (Value::Iface(a), b) => a.concrete == *b,
            (a, Value::Iface(b)) => *a == b.concrete,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Uintptr(v) => write!(f, "{v:#x}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::C64(v) => write!(f, "{v}"),
            Value::C128(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Struct(s) => write!(f, "struct#{}", s.type_name.raw()),
            Value::Func(func) => match func.name {
                Some(name) => write!(f, "func#{}", name.raw()),
                None => f.write_str("func"),
            },
            Value::Builtin(b) => write!(f, "builtin {}", b.name),
            Value::Chan(ch) => write!(f, "chan(len={})", ch.len()),
            Value::Iface(iface) => write!(f, "{}", iface.concrete),
        }
    }
}
