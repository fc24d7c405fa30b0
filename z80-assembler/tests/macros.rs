//! Macro definition, argument substitution and struct invocation.

mod common;

use common::*;
use z80_assembler::{
    ast::{
        Pragma,
        Statement,
    },
    Value,
};
use z80_asm::Reg8;

fn invoke(name: &str, args: Vec<z80_assembler::ast::Expr>) -> z80_assembler::ast::SourceLine {
    stmt(Statement::Invocation {
        name: name.into(),
        args,
    })
}

#[test]
fn macro_body_is_not_executed_at_definition() {
    let out = assemble_ok_with_parser(vec![
        stmt(Statement::MacroDef(vec![])).with_label("noise"),
        macro_body_line("defb 99"),
        stmt(Statement::EndMacro),
        op("nop", vec![]),
    ]);
    assert_eq!(out.bytes(0), [0x00]);
}

#[test]
fn macro_invocation_substitutes_arguments() {
    let out = assemble_ok_with_parser(vec![
        stmt(Statement::MacroDef(vec!["value".into()])).with_label("emit"),
        macro_body_line("ld a,{{value}}"),
        macro_body_line("defb {{value}},{{value}}"),
        stmt(Statement::EndMacro),
        invoke("emit", vec![int(7)]),
        invoke("emit", vec![int(9)]),
    ]);
    // Equivalent to inlining the argument literally.
    assert_eq!(out.bytes(0), [0x3E, 0x07, 0x07, 0x07, 0x3E, 0x09, 0x09, 0x09]);
}

#[test]
fn macro_arguments_accept_expressions_and_registers_by_text() {
    let out = assemble_ok_with_parser(vec![
        stmt(Statement::MacroDef(vec!["n".into()])).with_label("twice"),
        macro_body_line("defb {{n}}"),
        macro_body_line("defb {{n}}"),
        stmt(Statement::EndMacro),
        invoke("twice", vec![Expr2::mul(int(3), int(5))]),
    ]);
    assert_eq!(out.bytes(0), [15, 15]);
}

// Small helper namespace for building a binary expression without
// colliding with the `common` free functions.
struct Expr2;

impl Expr2 {
    fn mul(a: z80_assembler::ast::Expr, b: z80_assembler::ast::Expr) -> z80_assembler::ast::Expr {
        z80_assembler::ast::Expr::Binary(
            z80_assembler::ast::BinaryOp::Mul,
            Box::new(a),
            Box::new(b),
        )
    }
}

#[test]
fn macro_end_label_binds_after_expansion() {
    let out = assemble_ok_with_parser(vec![
        org(0x8000),
        stmt(Statement::MacroDef(vec![])).with_label("pad"),
        macro_body_line("defb 0"),
        macro_body_line("defb 0"),
        stmt(Statement::EndMacro).with_label("padEnd"),
        invoke("pad", vec![]),
    ]);
    assert_eq!(out.bytes(0), [0, 0]);
    assert_eq!(symbol_value(&out, "padEnd"), Value::Int(0x8002));
}

#[test]
fn macro_scope_isolates_symbols_between_invocations() {
    let out = assemble_ok_with_parser(vec![
        stmt(Statement::MacroDef(vec!["v".into()])).with_label("m"),
        macro_body_line("defb {{v}}"),
        stmt(Statement::EndMacro),
        invoke("m", vec![int(1)]),
        invoke("m", vec![int(2)]),
    ]);
    assert_eq!(out.bytes(0), [1, 2]);
}

#[test]
fn expansion_diagnostics_point_at_the_invocation_line() {
    let out = assemble_with_parser(vec![
        stmt(Statement::MacroDef(vec![])).with_label("bad"),
        macro_body_line("frobnicate"),
        stmt(Statement::EndMacro),
        invoke("bad", vec![]),
    ]);
    // The mini parser rejects the body; the diagnostic lands on line 4.
    assert!(has_error(&out, "Z0419"));
    let diag = out
        .diagnostics
        .iter()
        .find(|d| d.code.code() == "Z0419")
        .unwrap();
    assert_eq!(diag.line, 4);
}

#[test]
fn macros_require_a_line_source() {
    let out = assemble(vec![
        stmt(Statement::MacroDef(vec![])).with_label("m"),
        macro_body_line("nop"),
        stmt(Statement::EndMacro),
        invoke("m", vec![]),
    ]);
    assert!(has_error(&out, "Z0419"));
}

#[test]
fn unknown_invocation_target_is_reported() {
    let out = assemble(vec![invoke("nothere", vec![])]);
    assert!(has_error(&out, "Z0404"));
}

#[test]
fn struct_default_pattern_repeats_per_invocation() {
    let out = assemble_ok(vec![
        org(0x8000),
        stmt(Statement::StructDef).with_label("Pair"),
        pragma(Pragma::DefB(vec![int(0xAA)])).with_label("first"),
        pragma(Pragma::DefB(vec![int(0xBB)])).with_label("second"),
        stmt(Statement::EndStruct),
        invoke("Pair", vec![]),
        invoke("Pair", vec![]),
    ]);
    assert_eq!(out.bytes(0), [0xAA, 0xBB, 0xAA, 0xBB]);
}

#[test]
fn struct_field_overrides_with_forward_reference() {
    let out = assemble_ok(vec![
        org(0x8000),
        stmt(Statement::StructDef).with_label("Hdr"),
        pragma(Pragma::DefB(vec![int(0)])).with_label("tag"),
        pragma(Pragma::DefW(vec![int(0)])).with_label("addr"),
        stmt(Statement::EndStruct),
        invoke("Hdr", vec![]),
        stmt(Statement::FieldAssign {
            name: "addr".into(),
            expr: sym("late"),
        }),
        op("nop", vec![]),
        pragma(Pragma::Equ(int(0xBEEF))).with_label("late"),
    ]);
    assert_eq!(out.bytes(0), [0x00, 0xEF, 0xBE, 0x00]);
}

#[test]
fn struct_with_string_and_fill_fields() {
    let out = assemble_ok(vec![
        stmt(Statement::StructDef).with_label("Rec"),
        pragma(Pragma::DefM {
            text: string("AB"),
            bit7_terminator: false,
            null_terminator: false,
        })
        .with_label("name"),
        pragma(Pragma::DefS {
            count: int(2),
            fill: None,
        })
        .with_label("pad"),
        stmt(Statement::EndStruct),
        invoke("Rec", vec![]),
        pragma(Pragma::Equ(qualified(&["Rec", "pad"]))).with_label("padOff"),
    ]);
    assert_eq!(out.bytes(0), [0x41, 0x42, 0x00, 0x00]);
    assert_eq!(symbol_value(&out, "padOff"), Value::Int(2));
}

#[test]
fn unknown_struct_field_is_reported() {
    let out = assemble(vec![
        stmt(Statement::StructDef).with_label("S"),
        pragma(Pragma::DefB(vec![int(0)])).with_label("a"),
        stmt(Statement::EndStruct),
        invoke("S", vec![]),
        stmt(Statement::FieldAssign {
            name: "nope".into(),
            expr: int(1),
        }),
    ]);
    assert!(has_error(&out, "Z0440"));
}

#[test]
fn field_assignment_outside_invocation_is_reported() {
    let out = assemble(vec![
        op("nop", vec![]),
        stmt(Statement::FieldAssign {
            name: "x".into(),
            expr: int(1),
        }),
    ]);
    assert!(has_error(&out, "Z0441"));
}

#[test]
fn field_labels_do_not_leak_into_the_symbol_table() {
    let out = assemble(vec![
        stmt(Statement::StructDef).with_label("S"),
        pragma(Pragma::DefB(vec![int(0)])).with_label("fld"),
        stmt(Statement::EndStruct),
        invoke("S", vec![]),
        pragma(Pragma::DefB(vec![sym("fld")])),
    ]);
    // `fld` is only reachable as S.fld.
    assert!(has_error(&out, "Z0201"));
}

#[test]
fn macro_name_collision_is_reported() {
    let out = assemble_with_parser(vec![
        pragma(Pragma::Equ(int(1))).with_label("dup"),
        stmt(Statement::MacroDef(vec![])).with_label("dup"),
        macro_body_line("nop"),
        stmt(Statement::EndMacro),
    ]);
    assert!(has_error(&out, "Z0402"));
}

#[test]
fn duplicate_macro_parameters_are_reported() {
    let out = assemble_with_parser(vec![
        stmt(Statement::MacroDef(vec!["a".into(), "A".into()])).with_label("m"),
        macro_body_line("nop"),
        stmt(Statement::EndMacro),
    ]);
    assert!(has_error(&out, "Z0417"));
}

#[test]
fn stray_macro_placeholder_is_reported() {
    let out = assemble(vec![macro_body_line("ld a,{{ghost}}")]);
    assert!(has_error(&out, "Z0405"));
}

#[test]
fn macro_used_before_struct_with_same_shape_of_call() {
    // An invocation resolves macros first, then structs.
    let out = assemble_ok_with_parser(vec![
        stmt(Statement::MacroDef(vec![])).with_label("thing"),
        macro_body_line("ld a,1"),
        stmt(Statement::EndMacro),
        invoke("thing", vec![]),
        op("ld", vec![r8(Reg8::B), r8(Reg8::A)]),
    ]);
    assert_eq!(out.bytes(0), [0x3E, 0x01, 0x47]);
}
