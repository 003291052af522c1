//! End-to-end executor tests: programs are built as arena nodes and run
//! through the interpreter.

use std::rc::Rc;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;

use riva_eval::{EvalError, FuncValue, Interpreter, StructValue, Value};
use riva_ir::{
    AssignMode, BinaryOp, BranchKind, ExprId, ExprKind, FuncTy, InterfaceTy, Lit, Name, NumKind,
    Param, Span, SharedInterner, StmtId, StmtKind, StringInterner, SwitchCase, SyntaxArena, Ty,
    TypeCase, UnaryOp,
};

struct Program {
    arena: SyntaxArena,
    interner: SharedInterner,
    top: Vec<StmtId>,
}

impl Program {
    fn new() -> Program {
        Program {
            arena: SyntaxArena::new(),
            interner: Arc::new(StringInterner::new()),
            top: Vec::new(),
        }
    }

    fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn expr(&mut self, kind: ExprKind) -> ExprId {
        self.arena.alloc_expr(kind, Span::SYNTHETIC)
    }

    fn stmt(&mut self, kind: StmtKind) -> StmtId {
        self.arena.alloc_stmt(kind, Span::SYNTHETIC)
    }

    fn push(&mut self, kind: StmtKind) {
        let id = self.stmt(kind);
        self.top.push(id);
    }

    fn int(&mut self, v: i64) -> ExprId {
        self.expr(ExprKind::Lit(Lit::Int(v)))
    }

    fn str_lit(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(ExprKind::Lit(Lit::Str(name)))
    }

    fn ident(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(ExprKind::Ident(name))
    }

    fn bin(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.expr(ExprKind::Binary { op, lhs, rhs })
    }

    fn call(&mut self, callee: ExprId, args: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Call { callee, args })
    }

    fn block(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Block(stmts))
    }

    /// `name := init` at top level.
    fn define(&mut self, name: &str, init: ExprId) {
        let name = self.name(name);
        self.push(StmtKind::Decl {
            name,
            ty: None,
            init: Some(init),
        });
    }

    /// Typed declaration at top level.
    fn declare(&mut self, name: &str, ty: Ty, init: ExprId) {
        let name = self.name(name);
        self.push(StmtKind::Decl {
            name,
            ty: Some(ty),
            init: Some(init),
        });
    }

    /// `name = value` as a statement node (not pushed).
    fn assign(&mut self, name: &str, value: ExprId) -> StmtId {
        let target = self.ident(name);
        self.stmt(StmtKind::Assign {
            mode: AssignMode::Assign,
            targets: vec![target],
            values: vec![value],
        })
    }

    /// `name = name + suffix` as a statement node.
    fn append_str(&mut self, name: &str, suffix: &str) -> StmtId {
        let lhs = self.ident(name);
        let rhs = self.str_lit(suffix);
        let sum = self.bin(BinaryOp::Add, lhs, rhs);
        self.assign(name, sum)
    }

    fn interp(self) -> (Interpreter, Vec<StmtId>) {
        let interner = self.interner.clone();
        (
            Interpreter::new(Rc::new(self.arena), interner),
            self.top,
        )
    }

    fn run(self) -> Result<(Value, Vec<Value>), EvalError> {
        let (mut interp, top) = self.interp();
        interp.execute(&top)
    }

    fn eval(self) -> Value {
        self.run().unwrap().0
    }
}

#[test]
fn typed_product_evaluates_through_the_compiled_path() {
    let mut p = Program::new();
    let six = p.int(6);
    p.declare("x", Ty::Num(NumKind::I32), six);
    let seven = p.int(7);
    p.declare("y", Ty::Num(NumKind::I32), seven);
    let x = p.ident("x");
    let y = p.ident("y");
    let product = p.bin(BinaryOp::Mul, x, y);
    p.push(StmtKind::Expr(product));
    assert_eq!(p.eval(), Value::I32(42));
}

#[test]
fn product_node_is_compiled_once_and_reused() {
    let mut p = Program::new();
    let a = p.int(6);
    p.declare("x", Ty::Num(NumKind::I64), a);
    let b = p.int(7);
    p.declare("y", Ty::Num(NumKind::I64), b);

    // for i := 0; i < 5; i++ { x * y }
    let zero = p.int(0);
    let i_name = p.name("i");
    let init = p.stmt(StmtKind::Decl {
        name: i_name,
        ty: None,
        init: Some(zero),
    });
    let i = p.ident("i");
    let five = p.int(5);
    let cond = p.bin(BinaryOp::Lt, i, five);
    let i2 = p.ident("i");
    let post = p.stmt(StmtKind::IncDec {
        target: i2,
        negate: false,
    });
    let x = p.ident("x");
    let y = p.ident("y");
    let product = p.bin(BinaryOp::Mul, x, y);
    let product_stmt = p.stmt(StmtKind::Expr(product));
    let body = p.block(vec![product_stmt]);
    p.push(StmtKind::For {
        label: None,
        init: Some(init),
        cond: Some(cond),
        post: Some(post),
        body,
    });

    let (mut interp, top) = p.interp();
    interp.execute(&top).unwrap();
    // One specialized node: the product. The loop condition is not a
    // multiplication and takes the generic path.
    assert_eq!(interp.compiled_count(), 1);
}

#[test]
fn loop_breaks_after_three_iterations() {
    let mut p = Program::new();
    let zero = p.int(0);
    p.define("i", zero);

    let i = p.ident("i");
    let ten = p.int(10);
    let cond = p.bin(BinaryOp::Lt, i, ten);

    let i2 = p.ident("i");
    let three = p.int(3);
    let at_three = p.bin(BinaryOp::Eq, i2, three);
    let brk = p.stmt(StmtKind::Branch {
        kind: BranchKind::Break,
        label: None,
    });
    let then = p.block(vec![brk]);
    let if_stmt = p.stmt(StmtKind::If {
        init: None,
        cond: at_three,
        then,
        els: None,
    });
    let i3 = p.ident("i");
    let inc = p.stmt(StmtKind::IncDec {
        target: i3,
        negate: false,
    });
    let body = p.block(vec![if_stmt, inc]);
    p.push(StmtKind::For {
        label: None,
        init: None,
        cond: Some(cond),
        post: None,
        body,
    });

    let result = p.ident("i");
    p.push(StmtKind::Expr(result));
    assert_eq!(p.eval(), Value::Int(3));
}

#[test]
fn labeled_break_exits_the_outer_loop() {
    let mut p = Program::new();
    let zero = p.int(0);
    p.define("count", zero);
    let outer = p.name("outer");

    // inner loop: for j := 0; j < 3; j++ { if j == 1 { break outer }; count++ }
    let j_zero = p.int(0);
    let j_name = p.name("j");
    let j_init = p.stmt(StmtKind::Decl {
        name: j_name,
        ty: None,
        init: Some(j_zero),
    });
    let j = p.ident("j");
    let three = p.int(3);
    let j_cond = p.bin(BinaryOp::Lt, j, three);
    let j2 = p.ident("j");
    let j_post = p.stmt(StmtKind::IncDec {
        target: j2,
        negate: false,
    });
    let j3 = p.ident("j");
    let one = p.int(1);
    let at_one = p.bin(BinaryOp::Eq, j3, one);
    let brk = p.stmt(StmtKind::Branch {
        kind: BranchKind::Break,
        label: Some(outer),
    });
    let then = p.block(vec![brk]);
    let if_stmt = p.stmt(StmtKind::If {
        init: None,
        cond: at_one,
        then,
        els: None,
    });
    let count = p.ident("count");
    let count_inc = p.stmt(StmtKind::IncDec {
        target: count,
        negate: false,
    });
    let inner_body = p.block(vec![if_stmt, count_inc]);
    let inner = p.stmt(StmtKind::For {
        label: None,
        init: Some(j_init),
        cond: Some(j_cond),
        post: Some(j_post),
        body: inner_body,
    });

    // outer loop: outer: for i := 0; i < 3; i++ { inner }
    let i_zero = p.int(0);
    let i_name = p.name("i");
    let i_init = p.stmt(StmtKind::Decl {
        name: i_name,
        ty: None,
        init: Some(i_zero),
    });
    let i = p.ident("i");
    let three2 = p.int(3);
    let i_cond = p.bin(BinaryOp::Lt, i, three2);
    let i2 = p.ident("i");
    let i_post = p.stmt(StmtKind::IncDec {
        target: i2,
        negate: false,
    });
    let outer_body = p.block(vec![inner]);
    p.push(StmtKind::For {
        label: Some(outer),
        init: Some(i_init),
        cond: Some(i_cond),
        post: Some(i_post),
        body: outer_body,
    });

    let result = p.ident("count");
    p.push(StmtKind::Expr(result));
    assert_eq!(p.eval(), Value::Int(1));
}

#[test]
fn deferred_calls_run_in_reverse_order_after_the_body() {
    let mut p = Program::new();
    let empty = p.str_lit("");
    p.define("s", empty);

    let deferred_one = p.append_str("s", "1");
    let closure_one_body = p.block(vec![deferred_one]);
    let closure_one = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: closure_one_body,
    });
    let defer_one_call = p.call(closure_one, vec![]);
    let defer_one = p.stmt(StmtKind::Defer {
        call: defer_one_call,
    });

    let deferred_two = p.append_str("s", "2");
    let closure_two_body = p.block(vec![deferred_two]);
    let closure_two = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: closure_two_body,
    });
    let defer_two_call = p.call(closure_two, vec![]);
    let defer_two = p.stmt(StmtKind::Defer {
        call: defer_two_call,
    });

    let body_append = p.append_str("s", "body");
    let f_body = p.block(vec![defer_one, defer_two, body_append]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: f_body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call_f = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call_f));

    let result = p.ident("s");
    p.push(StmtKind::Expr(result));
    assert_eq!(p.eval(), Value::string("body21"));
}

#[test]
fn recover_in_a_deferred_closure_catches_the_fault() {
    let mut p = Program::new();
    let empty = p.str_lit("");
    p.define("res", empty);

    // deferred closure: r := recover(); res = r
    let recover_ident = p.ident("recover");
    let recover_call = p.call(recover_ident, vec![]);
    let r_name = p.name("r");
    let bind_r = p.stmt(StmtKind::Decl {
        name: r_name,
        ty: None,
        init: Some(recover_call),
    });
    let r = p.ident("r");
    let store = p.assign("res", r);
    let closure_body = p.block(vec![bind_r, store]);
    let closure = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: closure_body,
    });
    let defer_call = p.call(closure, vec![]);
    let defer_stmt = p.stmt(StmtKind::Defer { call: defer_call });

    let fault_ident = p.ident("fault");
    let boom = p.str_lit("boom");
    let fault_call = p.call(fault_ident, vec![boom]);
    let fault_stmt = p.stmt(StmtKind::Expr(fault_call));
    let after = p.append_str("res", "unreachable");

    let f_body = p.block(vec![defer_stmt, fault_stmt, after]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: f_body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call_f = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call_f));

    let result = p.ident("res");
    p.push(StmtKind::Expr(result));
    // The fault is recovered, the function completes, and the statements
    // after the fault never ran.
    assert_eq!(p.eval(), Value::string("boom"));
}

#[test]
fn directly_deferred_recover_does_not_recover() {
    let mut p = Program::new();
    let recover_ident = p.ident("recover");
    let recover_call = p.call(recover_ident, vec![]);
    let defer_stmt = p.stmt(StmtKind::Defer { call: recover_call });
    let fault_ident = p.ident("fault");
    let msg = p.str_lit("still faulting");
    let fault_call = p.call(fault_ident, vec![msg]);
    let fault_stmt = p.stmt(StmtKind::Expr(fault_call));
    let body = p.block(vec![defer_stmt, fault_stmt]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call));

    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("still faulting"), "{err}");
}

#[test]
fn deferred_arguments_are_captured_at_registration() {
    let mut p = Program::new();
    let zero = p.int(0);
    p.define("seen", zero);

    // g stores its argument in the enclosing scope.
    let v_name = p.name("v");
    let v = p.ident("v");
    let store = p.assign("seen", v);
    let g_body = p.block(vec![store]);
    let g = p.expr(ExprKind::FuncLit {
        params: vec![Param {
            name: v_name,
            ty: Ty::Num(NumKind::Int),
        }],
        results: vec![],
        body: g_body,
    });
    p.define("g", g);

    // f: x := 1; defer g(x); x = 2
    let one = p.int(1);
    let x_name = p.name("x");
    let x_init = p.stmt(StmtKind::Decl {
        name: x_name,
        ty: None,
        init: Some(one),
    });
    let g_ident = p.ident("g");
    let x = p.ident("x");
    let g_call = p.call(g_ident, vec![x]);
    let defer_stmt = p.stmt(StmtKind::Defer { call: g_call });
    let two = p.int(2);
    let rebind = p.assign("x", two);
    let f_body = p.block(vec![x_init, defer_stmt, rebind]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: f_body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call_f = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call_f));

    let result = p.ident("seen");
    p.push(StmtKind::Expr(result));
    // The deferred call saw x as it was when the defer was registered.
    assert_eq!(p.eval(), Value::Int(1));
}

#[test]
fn recover_outside_a_deferred_call_is_void() {
    // In a function body, but not inside a deferred call.
    let mut p = Program::new();
    let recover_ident = p.ident("recover");
    let recover_call = p.call(recover_ident, vec![]);
    let ret = p.stmt(StmtKind::Return {
        results: vec![recover_call],
    });
    let body = p.block(vec![ret]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call));
    assert_eq!(p.eval(), Value::Void);
}

#[test]
fn defer_outside_a_function_is_an_error() {
    let mut p = Program::new();
    let len_ident = p.ident("len");
    let arg = p.str_lit("x");
    let call = p.call(len_ident, vec![arg]);
    p.push(StmtKind::Defer { call });
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("defer outside function"), "{err}");
}

#[test]
fn block_scope_shadows_without_leaking() {
    let mut p = Program::new();
    let one = p.int(1);
    p.define("x", one);
    let two = p.int(2);
    let x_name = p.name("x");
    let shadow = p.stmt(StmtKind::Decl {
        name: x_name,
        ty: None,
        init: Some(two),
    });
    let block = p.block(vec![shadow]);
    p.top.push(block);
    let result = p.ident("x");
    p.push(StmtKind::Expr(result));
    assert_eq!(p.eval(), Value::Int(1));
}

#[test]
fn int8_product_wraps_at_width() {
    let mut p = Program::new();
    let init = p.int(127);
    p.declare("x", Ty::Num(NumKind::I8), init);
    let x = p.ident("x");
    let two = p.int(2);
    let product = p.bin(BinaryOp::Mul, x, two);
    p.push(StmtKind::Expr(product));
    assert_eq!(p.eval(), Value::I8(-2));
}

#[test]
fn mixing_typed_kinds_is_a_fault() {
    let mut p = Program::new();
    let a = p.int(1);
    p.declare("x", Ty::Num(NumKind::I32), a);
    let b = p.int(1);
    p.declare("y", Ty::Num(NumKind::I64), b);
    let x = p.ident("x");
    let y = p.ident("y");
    let product = p.bin(BinaryOp::Mul, x, y);
    p.push(StmtKind::Expr(product));
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("mismatched types"), "{err}");
}

#[test]
fn plain_assignment_cannot_change_a_binding_kind() {
    let mut p = Program::new();
    let a = p.int(1);
    p.declare("x", Ty::Num(NumKind::I32), a);
    let b = p.int(1);
    p.declare("y", Ty::Num(NumKind::I64), b);
    let y = p.ident("y");
    let stmt = p.assign("x", y);
    p.top.push(stmt);
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("mismatched types"), "{err}");
}

#[test]
fn switch_matches_and_falls_through() {
    let mut p = Program::new();
    let two = p.int(2);
    p.define("x", two);
    let empty = p.str_lit("");
    p.define("s", empty);

    let one = p.int(1);
    let set_a = p.append_str("s", "a");
    let two2 = p.int(2);
    let set_b = p.append_str("s", "b");
    let fall = p.stmt(StmtKind::Branch {
        kind: BranchKind::Fallthrough,
        label: None,
    });
    let three = p.int(3);
    let set_c = p.append_str("s", "c");
    let set_d = p.append_str("s", "d");

    let tag = p.ident("x");
    p.push(StmtKind::Switch {
        label: None,
        init: None,
        tag: Some(tag),
        cases: vec![
            SwitchCase {
                exprs: vec![one],
                body: vec![set_a],
            },
            SwitchCase {
                exprs: vec![two2],
                body: vec![set_b, fall],
            },
            SwitchCase {
                exprs: vec![three],
                body: vec![set_c],
            },
            SwitchCase {
                exprs: vec![],
                body: vec![set_d],
            },
        ],
    });

    let result = p.ident("s");
    p.push(StmtKind::Expr(result));
    assert_eq!(p.eval(), Value::string("bc"));
}

#[test]
fn type_switch_selects_on_the_dynamic_type() {
    let mut p = Program::new();
    let five = p.int(5);
    p.define("v", five);
    let empty = p.str_lit("");
    p.define("r", empty);

    let str_case = p.str_lit("str");
    let set_str = p.assign("r", str_case);
    let int_case = p.str_lit("int");
    let set_int = p.assign("r", int_case);
    let other_case = p.str_lit("other");
    let set_other = p.assign("r", other_case);

    let subject = p.ident("v");
    let binding = p.name("t");
    p.push(StmtKind::TypeSwitch {
        label: None,
        init: None,
        binding: Some(binding),
        subject,
        cases: vec![
            TypeCase {
                types: vec![Ty::Str],
                body: vec![set_str],
            },
            TypeCase {
                types: vec![Ty::Num(NumKind::Int)],
                body: vec![set_int],
            },
            TypeCase {
                types: vec![],
                body: vec![set_other],
            },
        ],
    });

    let result = p.ident("r");
    p.push(StmtKind::Expr(result));
    assert_eq!(p.eval(), Value::string("int"));
}

#[test]
fn channel_send_len_and_receive() {
    let mut p = Program::new();
    let chan_ident = p.ident("chan");
    let cap = p.int(2);
    let make = p.call(chan_ident, vec![cap]);
    p.define("ch", make);

    let ch1 = p.ident("ch");
    let v1 = p.int(10);
    p.push(StmtKind::Send {
        chan: ch1,
        value: v1,
    });
    let ch2 = p.ident("ch");
    let v2 = p.int(20);
    p.push(StmtKind::Send {
        chan: ch2,
        value: v2,
    });

    let len_ident = p.ident("len");
    let ch3 = p.ident("ch");
    let len_call = p.call(len_ident, vec![ch3]);
    p.define("l", len_call);

    let ch4 = p.ident("ch");
    let recv = p.expr(ExprKind::Unary {
        op: UnaryOp::Recv,
        operand: ch4,
    });
    p.define("first", recv);

    // l + first == 2 + 10
    let l = p.ident("l");
    let first = p.ident("first");
    let sum = p.bin(BinaryOp::Add, l, first);
    p.push(StmtKind::Expr(sum));
    assert_eq!(p.eval(), Value::Int(12));
}

#[test]
fn multi_valued_call_fans_out_to_targets() {
    let mut p = Program::new();
    let one = p.int(1);
    let two = p.int(2);
    let ret = p.stmt(StmtKind::Return {
        results: vec![one, two],
    });
    let body = p.block(vec![ret]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![Ty::Num(NumKind::Int), Ty::Num(NumKind::Int)],
        body,
    });
    p.define("f", f);

    let f_ident = p.ident("f");
    let call = p.call(f_ident, vec![]);
    let a = p.ident("a");
    let b = p.ident("b");
    p.push(StmtKind::Assign {
        mode: AssignMode::Define,
        targets: vec![a, b],
        values: vec![call],
    });

    let a2 = p.ident("a");
    let b2 = p.ident("b");
    let sum = p.bin(BinaryOp::Add, a2, b2);
    p.push(StmtKind::Expr(sum));
    assert_eq!(p.eval(), Value::Int(3));
}

#[test]
fn bare_multi_valued_call_surfaces_all_results() {
    let mut p = Program::new();
    let one = p.int(1);
    let two = p.int(2);
    let ret = p.stmt(StmtKind::Return {
        results: vec![one, two],
    });
    let body = p.block(vec![ret]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![Ty::Num(NumKind::Int), Ty::Num(NumKind::Int)],
        body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call));

    let (value, extra) = p.run().unwrap();
    assert_eq!(value, Value::Int(1));
    assert_eq!(extra, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn parameters_adapt_literals_and_specialize_in_the_body() {
    let mut p = Program::new();
    let n_name = p.name("n");
    let n1 = p.ident("n");
    let n2 = p.ident("n");
    let square = p.bin(BinaryOp::Mul, n1, n2);
    let ret = p.stmt(StmtKind::Return {
        results: vec![square],
    });
    let body = p.block(vec![ret]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![Param {
            name: n_name,
            ty: Ty::Num(NumKind::I32),
        }],
        results: vec![Ty::Num(NumKind::I32)],
        body,
    });
    p.define("f", f);

    let f_ident = p.ident("f");
    let five = p.int(5);
    let call = p.call(f_ident, vec![five]);
    p.push(StmtKind::Expr(call));
    assert_eq!(p.eval(), Value::I32(25));
}

#[test]
fn falling_off_a_value_returning_function_is_an_error() {
    let mut p = Program::new();
    let body = p.block(vec![]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![Ty::Num(NumKind::Int)],
        body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call));
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("missing return"), "{err}");
}

#[test]
fn range_over_a_list_with_compound_assignment() {
    let mut p = Program::new();
    let zero = p.int(0);
    p.define("sum", zero);
    let v_name = p.name("v");
    let sum_target = p.ident("sum");
    let v = p.ident("v");
    let add = p.stmt(StmtKind::Assign {
        mode: AssignMode::Compound(BinaryOp::Add),
        targets: vec![sum_target],
        values: vec![v],
    });
    let body = p.block(vec![add]);
    let subject = p.ident("xs");
    p.push(StmtKind::ForRange {
        label: None,
        key: None,
        value: Some(v_name),
        subject,
        body,
    });
    let result = p.ident("sum");
    p.push(StmtKind::Expr(result));

    let xs_name = p.name("xs");
    let (mut interp, top) = p.interp();
    interp.globals().define(
        xs_name,
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );
    let (value, _) = interp.execute(&top).unwrap();
    assert_eq!(value, Value::Int(6));
}

#[test]
fn range_binding_may_change_kind_between_iterations() {
    let mut p = Program::new();
    let v_name = p.name("v");
    let v1 = p.ident("v");
    let v2 = p.ident("v");
    let square = p.bin(BinaryOp::Mul, v1, v2);
    let sq_name = p.name("sq");
    let bind = p.stmt(StmtKind::Decl {
        name: sq_name,
        ty: None,
        init: Some(square),
    });
    let body = p.block(vec![bind]);
    let subject = p.ident("xs");
    p.push(StmtKind::ForRange {
        label: None,
        key: None,
        value: Some(v_name),
        subject,
        body,
    });

    let xs_name = p.name("xs");
    let (mut interp, top) = p.interp();
    interp.globals().define(
        xs_name,
        Value::list(vec![Value::I32(2), Value::F64(1.5)]),
    );
    // The product node is specialized at I32 on the first iteration;
    // when the binding comes back as F64 the cached closure is stale and
    // the node is recompiled instead of faulting or aborting.
    interp.execute(&top).unwrap();
    assert_eq!(interp.compiled_count(), 1);
}

#[test]
fn continue_targets_the_innermost_loop_unless_labeled() {
    let mut p = Program::new();
    let zero = p.int(0);
    p.define("count", zero);
    let empty = p.str_lit("");
    p.define("tail", empty);
    let outer = p.name("outer");

    // inner: for j := 0; j < 3; j++ {
    //     if j == 1 { continue }
    //     if j == 2 { continue outer }
    //     count++
    // }
    let j_zero = p.int(0);
    let j_name = p.name("j");
    let j_init = p.stmt(StmtKind::Decl {
        name: j_name,
        ty: None,
        init: Some(j_zero),
    });
    let j = p.ident("j");
    let three = p.int(3);
    let j_cond = p.bin(BinaryOp::Lt, j, three);
    let j2 = p.ident("j");
    let j_post = p.stmt(StmtKind::IncDec {
        target: j2,
        negate: false,
    });

    let j3 = p.ident("j");
    let one = p.int(1);
    let at_one = p.bin(BinaryOp::Eq, j3, one);
    let cont_inner = p.stmt(StmtKind::Branch {
        kind: BranchKind::Continue,
        label: None,
    });
    let then_inner = p.block(vec![cont_inner]);
    let skip_one = p.stmt(StmtKind::If {
        init: None,
        cond: at_one,
        then: then_inner,
        els: None,
    });

    let j4 = p.ident("j");
    let two = p.int(2);
    let at_two = p.bin(BinaryOp::Eq, j4, two);
    let cont_outer = p.stmt(StmtKind::Branch {
        kind: BranchKind::Continue,
        label: Some(outer),
    });
    let then_outer = p.block(vec![cont_outer]);
    let skip_rest = p.stmt(StmtKind::If {
        init: None,
        cond: at_two,
        then: then_outer,
        els: None,
    });

    let count = p.ident("count");
    let count_inc = p.stmt(StmtKind::IncDec {
        target: count,
        negate: false,
    });
    let inner_body = p.block(vec![skip_one, skip_rest, count_inc]);
    let inner = p.stmt(StmtKind::For {
        label: None,
        init: Some(j_init),
        cond: Some(j_cond),
        post: Some(j_post),
        body: inner_body,
    });

    // outer: for i := 0; i < 2; i++ { inner; tail = tail + "x" }
    let mark = p.append_str("tail", "x");
    let i_zero = p.int(0);
    let i_name = p.name("i");
    let i_init = p.stmt(StmtKind::Decl {
        name: i_name,
        ty: None,
        init: Some(i_zero),
    });
    let i = p.ident("i");
    let two2 = p.int(2);
    let i_cond = p.bin(BinaryOp::Lt, i, two2);
    let i2 = p.ident("i");
    let i_post = p.stmt(StmtKind::IncDec {
        target: i2,
        negate: false,
    });
    let outer_body = p.block(vec![inner, mark]);
    p.push(StmtKind::For {
        label: Some(outer),
        init: Some(i_init),
        cond: Some(i_cond),
        post: Some(i_post),
        body: outer_body,
    });

    // The unlabeled continue skipped count++ only at j == 1 (once per
    // outer iteration); the labeled continue skipped the tail append and
    // still ran the outer post statement.
    let c = p.ident("count");
    let want = p.int(2);
    let count_ok = p.bin(BinaryOp::Eq, c, want);
    let t = p.ident("tail");
    let still_empty = p.str_lit("");
    let tail_ok = p.bin(BinaryOp::Eq, t, still_empty);
    let both = p.bin(BinaryOp::And, count_ok, tail_ok);
    p.push(StmtKind::Expr(both));
    assert_eq!(p.eval(), Value::Bool(true));
}

#[cfg(target_pointer_width = "32")]
#[test]
fn int_literal_wider_than_the_native_int_faults() {
    let mut p = Program::new();
    let big = p.int(i64::MAX);
    p.push(StmtKind::Expr(big));
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("overflows int"), "{err}");
}

#[test]
fn recovery_yields_void_when_a_result_has_no_zero_value() {
    let mut p = Program::new();
    let recover_ident = p.ident("recover");
    let recover_call = p.call(recover_ident, vec![]);
    let recover_stmt = p.stmt(StmtKind::Expr(recover_call));
    let closure_body = p.block(vec![recover_stmt]);
    let closure = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: closure_body,
    });
    let defer_call = p.call(closure, vec![]);
    let defer_stmt = p.stmt(StmtKind::Defer { call: defer_call });
    let fault_ident = p.ident("fault");
    let msg = p.str_lit("boom");
    let fault_call = p.call(fault_ident, vec![msg]);
    let fault_stmt = p.stmt(StmtKind::Expr(fault_call));
    let body = p.block(vec![defer_stmt, fault_stmt]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![Ty::chan(Ty::Num(NumKind::Int))],
        body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call));
    // A channel result has no zero value; the recovered call completes
    // with Void rather than an initializer error.
    assert_eq!(p.eval(), Value::Void);
}

#[test]
fn interface_declaration_and_method_dispatch() {
    let mut p = Program::new();
    let counter_ty = p.name("Counter");
    let method = p.name("value");
    let recv = p.name("self");

    // method body: return 7
    let seven = p.int(7);
    let ret = p.stmt(StmtKind::Return {
        results: vec![seven],
    });
    let method_body = p.block(vec![ret]);

    let iface = InterfaceTy {
        name: None,
        methods: vec![(
            method,
            FuncTy {
                params: vec![],
                results: vec![Ty::Num(NumKind::Int)],
            },
        )],
    };
    let c_init = p.ident("c");
    let d_name = p.name("d");
    p.push(StmtKind::Decl {
        name: d_name,
        ty: Some(Ty::Interface(Rc::new(iface))),
        init: Some(c_init),
    });

    let d = p.ident("d");
    let callee = p.expr(ExprKind::Field {
        base: d,
        field: method,
    });
    let call = p.call(callee, vec![]);
    p.push(StmtKind::Expr(call));

    let c_name = p.name("c");
    let (mut interp, top) = p.interp();
    let func = Rc::new(FuncValue {
        name: Some(method),
        params: vec![Param {
            name: recv,
            ty: Ty::Named(counter_ty),
        }],
        results: vec![Ty::Num(NumKind::Int)],
        body: method_body,
        env: interp.globals().clone(),
    });
    interp.register_method(counter_ty, method, func);
    interp.globals().define(
        c_name,
        Value::Struct(Rc::new(StructValue::new(counter_ty, FxHashMap::default()))),
    );

    let (value, _) = interp.execute(&top).unwrap();
    assert_eq!(value, Value::Int(7));
}

#[test]
fn unsatisfied_interface_rejects_the_declaration() {
    let mut p = Program::new();
    let method = p.name("missing");
    let iface = InterfaceTy {
        name: None,
        methods: vec![(
            method,
            FuncTy {
                params: vec![],
                results: vec![],
            },
        )],
    };
    let five = p.int(5);
    let d_name = p.name("d");
    p.push(StmtKind::Decl {
        name: d_name,
        ty: Some(Ty::Interface(Rc::new(iface))),
        init: Some(five),
    });
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("mismatched types"), "{err}");
}

#[test]
fn break_at_top_level_is_an_error() {
    let mut p = Program::new();
    p.push(StmtKind::Branch {
        kind: BranchKind::Break,
        label: None,
    });
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("break outside for or switch"), "{err}");
}

#[test]
fn return_at_top_level_is_an_error() {
    let mut p = Program::new();
    p.push(StmtKind::Return { results: vec![] });
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("return outside function"), "{err}");
}

#[test]
fn go_and_select_report_descriptive_errors() {
    let mut p = Program::new();
    let f = p.ident("f");
    let call = p.call(f, vec![]);
    p.push(StmtKind::Go { call });
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("go is not supported"), "{err}");

    let mut p = Program::new();
    p.push(StmtKind::Select);
    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("select is not supported"), "{err}");
}

#[test]
fn division_by_zero_is_recoverable() {
    let mut p = Program::new();
    let empty = p.str_lit("");
    p.define("res", empty);

    let recover_ident = p.ident("recover");
    let recover_call = p.call(recover_ident, vec![]);
    let r_name = p.name("r");
    let bind = p.stmt(StmtKind::Decl {
        name: r_name,
        ty: None,
        init: Some(recover_call),
    });
    let r = p.ident("r");
    let store = p.assign("res", r);
    let closure_body = p.block(vec![bind, store]);
    let closure = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body: closure_body,
    });
    let defer_call = p.call(closure, vec![]);
    let defer_stmt = p.stmt(StmtKind::Defer { call: defer_call });

    let one = p.int(1);
    let zero = p.int(0);
    let div = p.bin(BinaryOp::Div, one, zero);
    let div_stmt = p.stmt(StmtKind::Expr(div));
    let body = p.block(vec![defer_stmt, div_stmt]);
    let f = p.expr(ExprKind::FuncLit {
        params: vec![],
        results: vec![],
        body,
    });
    p.define("f", f);
    let f_ident = p.ident("f");
    let call = p.call(f_ident, vec![]);
    p.push(StmtKind::Expr(call));
    let result = p.ident("res");
    p.push(StmtKind::Expr(result));

    // Runtime faults recover to their message text.
    assert_eq!(p.eval(), Value::string("integer divide by zero"));
}
