//! End-to-end scenarios: small programs with byte-exact expectations.

mod common;

use common::*;
use z80_assembler::{
    ast::{
        Pragma,
        Statement,
    },
    Value,
};
use z80_asm::{
    Reg16,
    Reg16Idx,
    Reg8,
};

#[test]
fn lone_nop_lands_at_the_default_origin() {
    let out = assemble_ok(vec![op("nop", vec![])]);
    assert_eq!(out.segments.len(), 1);
    assert_eq!(out.segments[0].start_address, 0x8000);
    assert_eq!(out.bytes(0), [0x00]);
}

#[test]
fn basic_sequence_at_explicit_origin() {
    let out = assemble_ok(vec![
        org(0x9000),
        op("ld", vec![r8(Reg8::A), r8(Reg8::B)]),
        op("ld", vec![r8(Reg8::A), imm(int(5))]),
        op("ld", vec![ind(Reg16::HL), r8(Reg8::A)]),
        op("halt", vec![]),
    ]);
    assert_eq!(out.segments[0].start_address, 0x9000);
    assert_eq!(out.bytes(0), [0x78, 0x3E, 0x05, 0x77, 0x76]);
}

#[test]
fn forward_relative_jump_resolves_through_a_fixup() {
    let out = assemble_ok(vec![
        org(0x8000),
        op("jr", vec![imm(sym("target"))]),
        op("nop", vec![]),
        op("ret", vec![]).with_label("target"),
    ]);
    assert_eq!(out.bytes(0), [0x18, 0x01, 0x00, 0xC9]);
    assert_eq!(symbol_value(&out, "target"), Value::Int(0x8003));
}

#[test]
fn indexed_store_with_immediate() {
    let out = assemble_ok(vec![op(
        "ld",
        vec![idx(Reg16Idx::IX, 5), imm(int(10))],
    )]);
    assert_eq!(out.bytes(0), [0xDD, 0x36, 0x05, 0x0A]);
}

#[test]
fn indexed_bit_test_puts_displacement_before_the_operation_byte() {
    let out = assemble_ok(vec![op(
        "bit",
        vec![imm(int(3)), idx(Reg16Idx::IY, -2)],
    )]);
    assert_eq!(out.bytes(0), [0xFD, 0xCB, 0xFE, 0x5E]);
}

#[test]
fn struct_invocation_with_field_override() {
    let out = assemble_ok(vec![
        org(0x8000),
        stmt(Statement::StructDef).with_label("MyS"),
        pragma(Pragma::DefB(vec![int(0)])).with_label("fld1"),
        pragma(Pragma::DefW(vec![int(0)])).with_label("fld2"),
        stmt(Statement::EndStruct),
        stmt(Statement::Invocation {
            name: "MyS".into(),
            args: Vec::new(),
        })
        .with_label("inst"),
        stmt(Statement::FieldAssign {
            name: "fld2".into(),
            expr: int(0x1234),
        }),
    ]);
    assert_eq!(out.bytes(0), [0x00, 0x34, 0x12]);
    assert_eq!(symbol_value(&out, "inst"), Value::Int(0x8000));

    // The field offset is reachable as a qualified name.
    let out = assemble_ok(vec![
        stmt(Statement::StructDef).with_label("MyS"),
        pragma(Pragma::DefB(vec![int(0)])).with_label("fld1"),
        pragma(Pragma::DefW(vec![int(0)])).with_label("fld2"),
        stmt(Statement::EndStruct),
        pragma(Pragma::Equ(qualified(&["MyS", "fld2"]))).with_label("off"),
        pragma(Pragma::Equ(sym("MyS"))).with_label("size"),
    ]);
    assert_eq!(symbol_value(&out, "off"), Value::Int(1));
    assert_eq!(symbol_value(&out, "size"), Value::Int(3));
}

#[test]
fn overflow_label_anchors_at_the_next_emitting_line() {
    let out = assemble_ok(vec![
        org(0x8000),
        op("nop", vec![]),
        label_only("pending"),
        op("halt", vec![]),
    ]);
    assert_eq!(symbol_value(&out, "pending"), Value::Int(0x8001));
}

#[test]
fn listing_and_source_map_cover_every_emitted_byte() {
    let out = assemble_ok(vec![
        org(0x9000),
        op("ld", vec![r8(Reg8::A), imm(int(1))]),
        op("halt", vec![]),
    ]);
    assert_eq!(out.listing.len(), 2);
    assert_eq!(out.listing[0].address, 0x9000);
    assert_eq!(out.listing[0].range, 0..2);
    assert_eq!(out.listing[1].address, 0x9002);
    assert_eq!(out.listing[1].range, 2..3);

    assert_eq!(out.source_map.source_of(0x9001), Some((0, 2)));
    assert_eq!(out.source_map.source_of(0x9002), Some((0, 3)));
    let addrs: Vec<u16> = out
        .source_map
        .addresses_of(0, 2)
        .unwrap()
        .iter()
        .copied()
        .collect();
    assert_eq!(addrs, vec![0x9000, 0x9001]);
}

#[test]
fn second_org_after_emission_opens_a_new_segment() {
    let out = assemble_ok(vec![
        org(0x8000),
        op("nop", vec![]),
        org(0xC000),
        op("halt", vec![]),
    ]);
    assert_eq!(out.segments.len(), 2);
    assert_eq!(out.segments[0].start_address, 0x8000);
    assert_eq!(out.bytes(0), [0x00]);
    assert_eq!(out.segments[1].start_address, 0xC000);
    assert_eq!(out.bytes(1), [0x76]);
}

#[test]
fn equ_is_order_independent() {
    let forward = assemble_ok(vec![
        pragma(Pragma::Equ(sym("b"))).with_label("a"),
        pragma(Pragma::Equ(int(7))).with_label("b"),
    ]);
    let backward = assemble_ok(vec![
        pragma(Pragma::Equ(int(7))).with_label("b"),
        pragma(Pragma::Equ(sym("b"))).with_label("a"),
    ]);
    assert_eq!(symbol_value(&forward, "a"), Value::Int(7));
    assert_eq!(symbol_value(&backward, "a"), Value::Int(7));
}

#[test]
fn entry_pointers_may_defer() {
    let out = assemble_ok(vec![
        org(0x8000),
        pragma(Pragma::Ent(sym("start"))),
        pragma(Pragma::Xent(int(0x8002))),
        op("nop", vec![]),
        op("halt", vec![]).with_label("start"),
    ]);
    assert_eq!(out.entry, Some(0x8001));
    assert_eq!(out.export_entry, Some(0x8002));
}
