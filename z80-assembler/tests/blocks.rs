//! Control-flow statements: conditionals, loops, procedures and modules.

mod common;

use common::*;
use z80_assembler::{
    ast::{
        BinaryOp,
        Expr,
        IfKind,
        NameRoot,
        Pragma,
        Statement,
        SymbolRef,
    },
    Value,
};

fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

#[test]
fn if_takes_the_first_truthy_arm() {
    let out = assemble_ok(vec![
        stmt(Statement::If(IfKind::Expr(int(0)))),
        pragma(Pragma::DefB(vec![int(1)])),
        stmt(Statement::Elif(int(1))),
        pragma(Pragma::DefB(vec![int(2)])),
        stmt(Statement::Else),
        pragma(Pragma::DefB(vec![int(3)])),
        stmt(Statement::Endif),
    ]);
    assert_eq!(out.bytes(0), [2]);
}

#[test]
fn else_arm_runs_when_everything_is_false() {
    let out = assemble_ok(vec![
        stmt(Statement::If(IfKind::Expr(int(0)))),
        pragma(Pragma::DefB(vec![int(1)])),
        stmt(Statement::Else),
        pragma(Pragma::DefB(vec![int(3)])),
        stmt(Statement::Endif),
    ]);
    assert_eq!(out.bytes(0), [3]);
}

#[test]
fn nested_ifs_are_scanned_correctly() {
    let out = assemble_ok(vec![
        stmt(Statement::If(IfKind::Expr(int(1)))),
        stmt(Statement::If(IfKind::Expr(int(0)))),
        pragma(Pragma::DefB(vec![int(9)])),
        stmt(Statement::Endif),
        pragma(Pragma::DefB(vec![int(4)])),
        stmt(Statement::Endif),
    ]);
    assert_eq!(out.bytes(0), [4]);
}

#[test]
fn ifdef_and_ifused_react_to_the_current_state() {
    let out = assemble_ok(vec![
        pragma(Pragma::Equ(int(1))).with_label("known"),
        stmt(Statement::If(IfKind::Defined(SymbolRef::plain("known")))),
        pragma(Pragma::DefB(vec![int(1)])),
        stmt(Statement::Endif),
        stmt(Statement::If(IfKind::NotDefined(SymbolRef::plain("missing")))),
        pragma(Pragma::DefB(vec![int(2)])),
        stmt(Statement::Endif),
        // `known` has not been referenced by an expression yet.
        stmt(Statement::If(IfKind::NotUsed(SymbolRef::plain("known")))),
        pragma(Pragma::DefB(vec![int(3)])),
        stmt(Statement::Endif),
        pragma(Pragma::DefB(vec![sym("known")])),
        stmt(Statement::If(IfKind::Used(SymbolRef::plain("known")))),
        pragma(Pragma::DefB(vec![int(4)])),
        stmt(Statement::Endif),
    ]);
    assert_eq!(out.bytes(0), [1, 2, 3, 1, 4]);
}

#[test]
fn loop_repeats_and_exposes_the_counter() {
    let out = assemble_ok(vec![
        stmt(Statement::Loop(int(3))),
        pragma(Pragma::DefB(vec![sym("$cnt")])),
        stmt(Statement::EndLoop),
    ]);
    assert_eq!(out.bytes(0), [1, 2, 3]);
}

#[test]
fn loop_with_zero_count_skips_the_body() {
    let out = assemble_ok(vec![
        stmt(Statement::Loop(int(0))),
        pragma(Pragma::DefB(vec![int(0xAA)])),
        stmt(Statement::EndLoop),
        op("nop", vec![]),
    ]);
    assert_eq!(out.bytes(0), [0x00]);
}

#[test]
fn break_and_continue_steer_the_innermost_loop() {
    let out = assemble_ok(vec![
        stmt(Statement::Loop(int(5))),
        stmt(Statement::If(IfKind::Expr(bin(
            BinaryOp::Eq,
            sym("$cnt"),
            int(2),
        )))),
        stmt(Statement::Continue),
        stmt(Statement::Endif),
        stmt(Statement::If(IfKind::Expr(bin(
            BinaryOp::Eq,
            sym("$cnt"),
            int(4),
        )))),
        stmt(Statement::Break),
        stmt(Statement::Endif),
        pragma(Pragma::DefB(vec![sym("$cnt")])),
        stmt(Statement::EndLoop),
    ]);
    // Iteration 2 is skipped, iteration 4 stops before emitting.
    assert_eq!(out.bytes(0), [1, 3]);
}

#[test]
fn repeat_runs_at_least_once() {
    let out = assemble_ok(vec![
        stmt(Statement::Repeat),
        pragma(Pragma::DefB(vec![sym("$cnt")])),
        stmt(Statement::Until(bin(BinaryOp::Ge, sym("$cnt"), int(3)))),
    ]);
    assert_eq!(out.bytes(0), [1, 2, 3]);
}

#[test]
fn while_checks_before_each_iteration() {
    let out = assemble_ok(vec![
        pragma(Pragma::Var(int(0))).with_label("n"),
        stmt(Statement::While(bin(BinaryOp::Lt, sym("n"), int(2)))),
        pragma(Pragma::DefB(vec![sym("n")])),
        pragma(Pragma::Var(bin(BinaryOp::Add, sym("n"), int(1)))).with_label("n"),
        stmt(Statement::Wend),
    ]);
    assert_eq!(out.bytes(0), [0, 1]);

    let out = assemble_ok(vec![
        stmt(Statement::While(int(0))),
        pragma(Pragma::DefB(vec![int(0xAA)])),
        stmt(Statement::Wend),
        op("nop", vec![]),
    ]);
    assert_eq!(out.bytes(0), [0x00]);
}

#[test]
fn for_loops_count_in_both_directions() {
    let out = assemble_ok(vec![
        stmt(Statement::For {
            var: "i".into(),
            from: int(1),
            to: int(4),
            step: None,
        }),
        pragma(Pragma::DefB(vec![sym("i")])),
        stmt(Statement::Next),
    ]);
    assert_eq!(out.bytes(0), [1, 2, 3, 4]);

    let out = assemble_ok(vec![
        stmt(Statement::For {
            var: "i".into(),
            from: int(6),
            to: int(0),
            step: Some(int(-2)),
        }),
        pragma(Pragma::DefB(vec![sym("i")])),
        stmt(Statement::Next),
    ]);
    assert_eq!(out.bytes(0), [6, 4, 2, 0]);
}

#[test]
fn for_with_real_bounds_uses_real_arithmetic() {
    let out = assemble_ok(vec![
        stmt(Statement::For {
            var: "r".into(),
            from: int(0),
            to: real(1.0),
            step: Some(real(0.5)),
        }),
        pragma(Pragma::DefB(vec![bin(BinaryOp::Mul, sym("r"), int(2))])),
        stmt(Statement::Next),
    ]);
    assert_eq!(out.bytes(0), [0, 1, 2]);
}

#[test]
fn temporary_labels_live_per_iteration() {
    let out = assemble_ok(vec![
        org(0x8000),
        stmt(Statement::Loop(int(2))),
        op("nop", vec![]).with_label("`skip"),
        op("jr", vec![imm(Expr::Symbol(SymbolRef::rooted(
            NameRoot::Temporary,
            "skip",
        )))]),
        stmt(Statement::EndLoop),
    ]);
    // Each iteration's backtick label resolves to that iteration's nop.
    assert_eq!(out.bytes(0), [0x00, 0x18, 0xFD, 0x00, 0x18, 0xFD]);
}

#[test]
fn proc_scope_hides_locals() {
    let out = assemble_ok(vec![
        pragma(Pragma::Equ(int(0x11))).with_label("shared"),
        stmt(Statement::Proc),
        stmt(Statement::Local(vec!["shared".into()])),
        pragma(Pragma::Equ(int(0x22))).with_label("shared"),
        pragma(Pragma::DefB(vec![sym("shared")])),
        stmt(Statement::Endp),
        pragma(Pragma::DefB(vec![sym("shared")])),
    ]);
    assert_eq!(out.bytes(0), [0x22, 0x11]);
}

#[test]
fn modules_namespace_their_symbols() {
    let out = assemble_ok(vec![
        org(0x8000),
        stmt(Statement::Module(Some("Gfx".into()))),
        op("nop", vec![]).with_label("draw"),
        stmt(Statement::EndModule),
        op("call", vec![imm(qualified(&["Gfx", "draw"]))]),
    ]);
    assert_eq!(out.bytes(0), [0x00, 0xCD, 0x00, 0x80]);

    // Inner symbols are invisible without qualification.
    let out = assemble(vec![
        stmt(Statement::Module(Some("M".into()))),
        pragma(Pragma::Equ(int(5))).with_label("inner"),
        stmt(Statement::EndModule),
        pragma(Pragma::DefB(vec![sym("inner")])),
    ]);
    assert!(has_error(&out, "Z0201"));
}

#[test]
fn module_fixups_resolve_at_module_end() {
    let out = assemble_ok(vec![
        org(0x8000),
        stmt(Statement::Module(Some("M".into()))),
        op("jp", vec![imm(sym("fwd"))]),
        op("halt", vec![]).with_label("fwd"),
        stmt(Statement::EndModule),
    ]);
    assert_eq!(out.bytes(0), [0xC3, 0x03, 0x80, 0x76]);
}

#[test]
fn nested_modules_resolve_global_rooted_names() {
    let out = assemble_ok(vec![
        pragma(Pragma::Equ(int(0x42))).with_label("top"),
        stmt(Statement::Module(Some("Outer".into()))),
        stmt(Statement::Module(Some("Inner".into()))),
        pragma(Pragma::DefB(vec![Expr::Symbol(SymbolRef {
            root: NameRoot::Global,
            segments: vec!["top".into()],
        })])),
        pragma(Pragma::DefB(vec![sym("top")])),
        stmt(Statement::EndModule),
        stmt(Statement::EndModule),
    ]);
    assert_eq!(out.bytes(0), [0x42, 0x42]);
}

#[test]
fn block_end_labels_bind_after_the_block() {
    let out = assemble_ok(vec![
        org(0x8000),
        stmt(Statement::Loop(int(2))),
        op("nop", vec![]),
        stmt(Statement::EndLoop).with_label("after"),
        op("halt", vec![]),
    ]);
    assert_eq!(symbol_value(&out, "after"), Value::Int(0x8002));
}

#[test]
fn var_rebinding_keeps_loop_state() {
    let out = assemble_ok(vec![
        pragma(Pragma::Var(int(1))).with_label("acc"),
        stmt(Statement::Loop(int(4))),
        pragma(Pragma::Var(bin(BinaryOp::Mul, sym("acc"), int(2)))).with_label("acc"),
        stmt(Statement::EndLoop),
        pragma(Pragma::DefB(vec![sym("acc")])),
    ]);
    assert_eq!(out.bytes(0), [16]);
}
