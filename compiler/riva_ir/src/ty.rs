//! Static type descriptors.
//!
//! `Ty` is the type language shared by the parser (type ascriptions on
//! declarations and parameters), the expression compiler (static types of
//! compiled closures), and the executor (dynamic types in type switches).

use std::fmt;
use std::rc::Rc;

use crate::{Name, NumKind, UntypedKind};

/// Static type descriptor.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Ty {
    Bool,
    Str,
    /// Concrete numeric kind.
    Num(NumKind),
    /// Untyped constant, not yet unified to a machine kind.
    Untyped(UntypedKind),
    /// Channel carrying elements of the given type.
    Chan(Rc<Ty>),
    /// Homogeneous list.
    List(Rc<Ty>),
    /// Function signature.
    Func(Rc<FuncTy>),
    /// Interface, satisfied structurally by a method table.
    Interface(Rc<InterfaceTy>),
    /// User-declared named type (struct types and their method tables are
    /// registered against this name in the evaluator).
    Named(Name),
    /// Marker for expressions the compiler rejected.
    Invalid,
}

/// Function signature: parameter and result types, no receiver.
///
/// Method signatures are stored receiver-less so they compare equal to
/// the corresponding interface method signatures.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct FuncTy {
    pub params: Vec<Ty>,
    pub results: Vec<Ty>,
}

/// Interface type: a set of required method signatures.
///
/// The empty interface is satisfied by every value.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct InterfaceTy {
    pub name: Option<Name>,
    /// Required methods, (name, receiver-less signature).
    pub methods: Vec<(Name, FuncTy)>,
}

impl Ty {
    /// The concrete numeric kind, if this is a typed numeric type.
    pub fn num_kind(&self) -> Option<NumKind> {
        match self {
            Ty::Num(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Whether this type is numeric (typed or untyped constant).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Num(_) | Ty::Untyped(_))
    }

    pub fn chan(elem: Ty) -> Ty {
        Ty::Chan(Rc::new(elem))
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::List(Rc::new(elem))
    }

    pub fn func(params: Vec<Ty>, results: Vec<Ty>) -> Ty {
        Ty::Func(Rc::new(FuncTy { params, results }))
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Bool => f.write_str("bool"),
            Ty::Str => f.write_str("string"),
            Ty::Num(kind) => write!(f, "{kind}"),
            Ty::Untyped(UntypedKind::Int) => f.write_str("untyped int"),
            Ty::Untyped(UntypedKind::Float) => f.write_str("untyped float"),
            Ty::Untyped(UntypedKind::Complex) => f.write_str("untyped complex"),
            Ty::Chan(elem) => write!(f, "chan {elem}"),
            Ty::List(elem) => write!(f, "[]{elem}"),
            Ty::Func(sig) => {
                f.write_str("func(")?;
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                f.write_str(")")?;
                match sig.results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", sig.results[0]),
                    _ => {
                        f.write_str(" (")?;
                        for (i, r) in sig.results.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{r}")?;
                        }
                        f.write_str(")")
                    }
                }
            }
            Ty::Interface(iface) => {
                if iface.methods.is_empty() {
                    f.write_str("interface{}")
                } else {
                    write!(f, "interface({} methods)", iface.methods.len())
                }
            }
            Ty::Named(name) => write!(f, "type#{}", name.raw()),
            Ty::Invalid => f.write_str("invalid"),
        }
    }
}
