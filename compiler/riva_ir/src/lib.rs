//! Riva IR - syntax tree and shared types for the Riva interpreter.
//!
//! This crate is the contract between the external parsing stage and the
//! evaluation core:
//!
//! - `Name` / `StringInterner`: compact interned identifiers
//! - `Span`: source ranges carried by every node
//! - `SyntaxArena` with `ExprId` / `StmtId`: arena-allocated statement and
//!   expression nodes produced by the parser
//! - `NumKind` / `Ty`: numeric machine kinds and static type descriptors
//!   used by the expression compiler's specialization dispatch

mod ast;
mod interner;
mod kind;
mod name;
mod span;
mod ty;

pub use ast::{
    AssignMode, BinaryOp, BranchKind, Expr, ExprId, ExprKind, Lit, Param, Stmt, StmtId, StmtKind,
    SwitchCase, SyntaxArena, TypeCase, UnaryOp,
};
pub use interner::{SharedInterner, StringInterner};
pub use kind::{NumKind, UntypedKind};
pub use name::Name;
pub use span::Span;
pub use ty::{FuncTy, InterfaceTy, Ty};
