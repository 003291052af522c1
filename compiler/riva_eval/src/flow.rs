//! Control transfer results.
//!
//! Break, continue and return are ordinary values flowing up the
//! statement tree, not unwinding: every statement evaluation returns
//! `Ok(Flow)`, and each enclosing construct inspects the flow to decide
//! whether to absorb it (a loop catching its own break) or pass it on.
//! Only genuine faults travel through `Err`.

use riva_ir::Name;

use crate::errors::EvalError;
use crate::value::Value;

/// Outcome of executing one statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    /// Sequential completion. Carries the statement's value; most
    /// statements complete with `Value::Void`.
    Normal(Value),
    /// `break`, optionally labeled.
    Break(Option<Name>),
    /// `continue`, optionally labeled.
    Continue(Option<Name>),
    /// `return`, carrying the (possibly empty) result values.
    Return(Vec<Value>),
}

/// Statement evaluation result: control transfer in `Ok`, faults in `Err`.
pub type ExecResult = Result<Flow, EvalError>;

impl Flow {
    /// Sequential completion with no value.
    pub const VOID: Flow = Flow::Normal(Value::Void);

    pub fn is_normal(&self) -> bool {
        matches!(self, Flow::Normal(_))
    }

    /// Whether a `break`/`continue` label targets a construct labeled
    /// `own`. An unlabeled transfer targets the innermost construct.
    pub fn label_targets(label: Option<Name>, own: Option<Name>) -> bool {
        match label {
            None => true,
            Some(l) => own == Some(l),
        }
    }
}
