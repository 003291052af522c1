//! Numeric machine kinds.
//!
//! `NumKind` is the closed set of fixed-width numeric representations the
//! expression compiler specializes over. Every compiled closure is pinned
//! to exactly one kind; the kind decides the closure's native Rust type
//! and its overflow/rounding semantics.

use std::fmt;

/// Concrete numeric machine representation.
///
/// `Int` and `Uint` are the native-width kinds (`isize`/`usize`);
/// `Uintptr` is pointer-width unsigned, kept distinct from `Uint` because
/// the two are different types in the source language even though they
/// share a machine representation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NumKind {
    I8,
    I16,
    I32,
    I64,
    Int,
    U8,
    U16,
    U32,
    U64,
    Uint,
    Uintptr,
    F32,
    F64,
    C64,
    C128,
}

impl NumKind {
    /// All kinds, in declaration order. Drives exhaustive per-kind tests.
    pub const ALL: [NumKind; 15] = [
        NumKind::I8,
        NumKind::I16,
        NumKind::I32,
        NumKind::I64,
        NumKind::Int,
        NumKind::U8,
        NumKind::U16,
        NumKind::U32,
        NumKind::U64,
        NumKind::Uint,
        NumKind::Uintptr,
        NumKind::F32,
        NumKind::F64,
        NumKind::C64,
        NumKind::C128,
    ];

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            NumKind::I8 | NumKind::I16 | NumKind::I32 | NumKind::I64 | NumKind::Int
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            NumKind::U8
                | NumKind::U16
                | NumKind::U32
                | NumKind::U64
                | NumKind::Uint
                | NumKind::Uintptr
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumKind::F32 | NumKind::F64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, NumKind::C64 | NumKind::C128)
    }

    /// Source-language name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            NumKind::I8 => "int8",
            NumKind::I16 => "int16",
            NumKind::I32 => "int32",
            NumKind::I64 => "int64",
            NumKind::Int => "int",
            NumKind::U8 => "uint8",
            NumKind::U16 => "uint16",
            NumKind::U32 => "uint32",
            NumKind::U64 => "uint64",
            NumKind::Uint => "uint",
            NumKind::Uintptr => "uintptr",
            NumKind::F32 => "float32",
            NumKind::F64 => "float64",
            NumKind::C64 => "complex64",
            NumKind::C128 => "complex128",
        }
    }
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of an untyped numeric constant.
///
/// Literals stay untyped until unification gives them a concrete kind;
/// an untyped constant standing alone defaults per category.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UntypedKind {
    Int,
    Float,
    Complex,
}

impl UntypedKind {
    /// Default machine kind when no typed operand forces one.
    pub fn default_kind(self) -> NumKind {
        match self {
            UntypedKind::Int => NumKind::Int,
            UntypedKind::Float => NumKind::F64,
            UntypedKind::Complex => NumKind::C128,
        }
    }

    /// Wider of two untyped categories (int < float < complex).
    pub fn widen(self, other: UntypedKind) -> UntypedKind {
        fn rank(k: UntypedKind) -> u8 {
            match k {
                UntypedKind::Int => 0,
                UntypedKind::Float => 1,
                UntypedKind::Complex => 2,
            }
        }
        if rank(self) >= rank(other) {
            self
        } else {
            other
        }
    }
}
