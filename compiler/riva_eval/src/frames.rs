//! Call stack bookkeeping.
//!
//! One [`CallFrame`] per active interpreted function call. The frame owns
//! the deferred calls registered in its body and the fault state that the
//! `recover` builtin inspects while those deferred calls run.

use riva_ir::Span;

use crate::environment::Env;
use crate::errors::EvalError;
use crate::value::Value;

/// A call captured by `defer`, with its arguments already evaluated.
#[derive(Clone, Debug)]
pub struct DeferredCall {
    pub callee: Value,
    pub args: Vec<Value>,
    pub span: Span,
}

/// Activation record of one interpreted function call.
#[derive(Debug)]
pub struct CallFrame {
    /// Scope holding the parameters; the body opens children of it.
    pub func_env: Env,
    /// Deferred calls in registration order; run in reverse on exit.
    pub defers: Vec<DeferredCall>,
    /// The in-flight fault, set when the body faulted and cleared when a
    /// deferred call recovers it.
    pub fault: Option<EvalError>,
    /// True while this frame's deferred calls execute. `recover` is only
    /// effective when the frame below it has this flag set.
    pub running_defers: bool,
}

impl CallFrame {
    pub fn new(func_env: Env) -> CallFrame {
        CallFrame {
            func_env,
            defers: Vec::new(),
            fault: None,
            running_defers: false,
        }
    }
}

/// Stack of activation records. The root frame models top-level code and
/// never runs deferred calls.
#[derive(Debug)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    pub fn new(globals: Env) -> CallStack {
        CallStack {
            frames: vec![CallFrame::new(globals)],
        }
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        // The root frame stays.
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Depth counting the root frame.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether any interpreted function call is active.
    pub fn in_function(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn current(&self) -> &CallFrame {
        self.frames
            .last()
            .unwrap_or_else(|| unreachable!("call stack never empties"))
    }

    pub fn current_mut(&mut self) -> &mut CallFrame {
        self.frames
            .last_mut()
            .unwrap_or_else(|| unreachable!("call stack never empties"))
    }

    /// The frame that called the currently running one.
    ///
    /// `recover` runs inside a deferred call's own frame and needs to
    /// look at the frame whose defers are running, one below it.
    pub fn caller_mut(&mut self) -> Option<&mut CallFrame> {
        let n = self.frames.len();
        if n >= 2 {
            self.frames.get_mut(n - 2)
        } else {
            None
        }
    }
}
