//! Evaluation core of the Riva interpreter.
//!
//! Two cooperating layers execute a parsed program:
//!
//! * the **expression compiler** ([`compile`]) turns numeric expression
//!   trees into closures specialized to one machine kind, evaluated with
//!   no per-step tag dispatch;
//! * the **executor** ([`interpreter`]) walks statements directly,
//!   treating break/continue/return as ordinary [`flow::Flow`] results
//!   rather than unwinding, and reserving `Err` for genuine faults.
//!
//! Values are tagged ([`value::Value`]), scopes are shared reference-
//! counted chains ([`environment::Env`]), and deferred calls with fault
//! recovery ride on an explicit call stack ([`frames`]).

pub mod compile;
pub mod environment;
pub mod errors;
pub mod flow;
pub mod frames;
pub mod interpreter;
pub mod methods;
pub mod operators;
pub mod place;
pub mod stack;
pub mod value;

pub use compile::{Comp, Expr as CompiledExpr, ExprBody, TypeResolver, TypedFun};
pub use environment::Env;
pub use errors::{CompileError, EvalError, EvalErrorKind};
pub use flow::{ExecResult, Flow};
pub use frames::{CallFrame, CallStack, DeferredCall};
pub use interpreter::Interpreter;
pub use methods::MethodRegistry;
pub use place::Place;
pub use value::{
    BuiltinFn, ChanValue, Complex32, Complex64, FuncValue, IfaceValue, Methods, StructValue,
    TypedValue, Value,
};
