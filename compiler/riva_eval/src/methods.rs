//! Method tables and interface satisfaction.
//!
//! Methods attach to named types by registration; an interface is
//! satisfied structurally when every required method name is registered
//! with an equal receiver-less signature.

use rustc_hash::FxHashMap;

use riva_ir::{InterfaceTy, Name, Ty};

use crate::value::{Methods, TypedValue, Value};

/// Methods of every named type, keyed by the type's name.
#[derive(Default, Debug)]
pub struct MethodRegistry {
    tables: FxHashMap<Name, Methods>,
}

impl MethodRegistry {
    pub fn new() -> MethodRegistry {
        MethodRegistry::default()
    }

    /// Attach a method to a named type. Replaces any previous method of
    /// the same name.
    pub fn register(&mut self, type_name: Name, method: Name, entry: TypedValue) {
        self.tables.entry(type_name).or_default().insert(method, entry);
    }

    /// Look up a method on a named type.
    pub fn lookup(&self, type_name: Name, method: Name) -> Option<&TypedValue> {
        self.tables.get(&type_name)?.get(&method)
    }

    /// Number of methods registered on a named type.
    pub fn method_count(&self, type_name: Name) -> usize {
        self.tables.get(&type_name).map_or(0, Methods::len)
    }

    /// Whether `value` satisfies `iface`.
    ///
    /// The empty interface is satisfied by every value. A non-empty
    /// interface requires a named type whose table carries every
    /// required method with an equal signature.
    pub fn satisfies(&self, value: &Value, iface: &InterfaceTy) -> bool {
        if iface.methods.is_empty() {
            return true;
        }
        let type_name = match value.type_of() {
            Ty::Named(name) => name,
            _ => return false,
        };
        iface.methods.iter().all(|(name, want)| {
            match self.lookup(type_name, *name) {
                Some(TypedValue { ty: Ty::Func(have), .. }) => **have == *want,
                _ => false,
            }
        })
    }
}
