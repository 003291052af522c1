//! Lexical environments.
//!
//! An `Env` is a shared handle to one scope in a chain. Child scopes hold
//! their parent alive; closures capture the `Env` they were defined in,
//! so a scope outlives its block whenever a closure still points at it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use riva_ir::Name;

use crate::errors::EvalError;
use crate::value::Value;

/// Shared handle to a scope. Cloning is cheap and aliases the scope.
#[derive(Clone)]
pub struct Env(Rc<EnvInner>);

struct EnvInner {
    bindings: RefCell<FxHashMap<Name, Value>>,
    outer: Option<Env>,
}

impl Env {
    /// A fresh root scope.
    pub fn root() -> Env {
        Env(Rc::new(EnvInner {
            bindings: RefCell::new(FxHashMap::default()),
            outer: None,
        }))
    }

    /// A child scope whose lookups fall through to `self`.
    pub fn child(&self) -> Env {
        Env(Rc::new(EnvInner {
            bindings: RefCell::new(FxHashMap::default()),
            outer: Some(self.clone()),
        }))
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: Name, value: Value) {
        self.0.bindings.borrow_mut().insert(name, value);
    }

    /// Look `name` up, walking outward through enclosing scopes.
    pub fn lookup(&self, name: Name) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.0.bindings.borrow().get(&name) {
                return Some(value.clone());
            }
            match &scope.0.outer {
                Some(outer) => scope = outer,
                None => return None,
            }
        }
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&self, name: Name, value: Value) -> Result<(), EvalError> {
        let mut scope = self;
        loop {
            let mut bindings = scope.0.bindings.borrow_mut();
            if let Some(slot) = bindings.get_mut(&name) {
                *slot = value;
                return Ok(());
            }
            drop(bindings);
            match &scope.0.outer {
                Some(outer) => scope = outer,
                None => return Err(EvalError::undefined(name)),
            }
        }
    }

    /// Whether `name` is bound in this scope itself, not an outer one.
    pub fn defined_here(&self, name: Name) -> bool {
        self.0.bindings.borrow().contains_key(&name)
    }

    /// Whether the two handles alias the same scope.
    pub fn same_scope(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        let mut scope = self;
        while let Some(outer) = &scope.0.outer {
            depth += 1;
            scope = outer;
        }
        write!(
            f,
            "Env(depth={depth}, locals={})",
            self.0.bindings.borrow().len()
        )
    }
}
