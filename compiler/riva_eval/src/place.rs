//! Assignable places.
//!
//! The executor resolves an assignment target once into a `Place`, then
//! reads or writes through it. Compound assignment and `++`/`--` need the
//! same place for both the read and the write, so resolution happens
//! exactly once per statement.

use std::cell::RefCell;
use std::rc::Rc;

use riva_ir::Name;

use crate::environment::Env;
use crate::errors::EvalError;
use crate::value::{StructValue, Value};

/// A resolved assignment target.
#[derive(Clone, Debug)]
pub enum Place {
    /// Named variable in `env` or an enclosing scope.
    Var { env: Env, name: Name },
    /// List element at a checked index.
    Elem {
        list: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    /// Struct field.
    Field { base: Rc<StructValue>, field: Name },
}

impl Place {
    pub fn get(&self) -> Result<Value, EvalError> {
        match self {
            Place::Var { env, name } => {
                env.lookup(*name).ok_or_else(|| EvalError::undefined(*name))
            }
            Place::Elem { list, index } => {
                let items = list.borrow();
                items.get(*index).cloned().ok_or_else(|| {
                    EvalError::new(format!(
                        "index out of range [{index}] with length {}",
                        items.len()
                    ))
                })
            }
            Place::Field { base, field } => base.get_field(*field).ok_or_else(|| {
                EvalError::new(format!("no field #{} on struct", field.raw()))
            }),
        }
    }

    pub fn set(&self, value: Value) -> Result<(), EvalError> {
        match self {
            Place::Var { env, name } => env.assign(*name, value),
            Place::Elem { list, index } => {
                let mut items = list.borrow_mut();
                let len = items.len();
                match items.get_mut(*index) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(EvalError::new(format!(
                        "index out of range [{index}] with length {len}"
                    ))),
                }
            }
            Place::Field { base, field } => {
                base.set_field(*field, value);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn var_place_reads_and_writes_through_env() {
        let env = Env::root();
        let name = Name::from_raw(1);
        env.define(name, Value::Int(3));
        let place = Place::Var {
            env: env.clone(),
            name,
        };
        assert_eq!(place.get().unwrap(), Value::Int(3));
        place.set(Value::Int(4)).unwrap();
        assert_eq!(env.lookup(name), Some(Value::Int(4)));
    }

    #[test]
    fn elem_place_checks_bounds() {
        let list = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let good = Place::Elem {
            list: list.clone(),
            index: 0,
        };
        let bad = Place::Elem { list, index: 5 };
        good.set(Value::Int(9)).unwrap();
        assert_eq!(good.get().unwrap(), Value::Int(9));
        assert!(bad.get().is_err());
        assert!(bad.set(Value::Void).is_err());
    }
}
