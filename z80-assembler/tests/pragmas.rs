//! Directive behavior: origins, displacement, data emission, host pragmas.

mod common;

use common::*;
use z80_assembler::{
    ast::{
        Expr,
        Pragma,
    },
    Value,
};

fn defb(values: Vec<Expr>) -> z80_assembler::ast::SourceLine {
    pragma(Pragma::DefB(values))
}

#[test]
fn xorg_overrides_the_reported_address_only() {
    let out = assemble_ok(vec![
        org(0x8000),
        pragma(Pragma::Xorg(int(0x4000))),
        op("nop", vec![]).with_label("here"),
    ]);
    assert_eq!(out.segments[0].start_address, 0x8000);
    assert_eq!(out.segments[0].xorg, Some(0x4000));
    // The internal program counter ignores XORG.
    assert_eq!(symbol_value(&out, "here"), Value::Int(0x8000));
}

#[test]
fn xorg_after_emission_is_rejected() {
    let out = assemble(vec![
        org(0x8000),
        op("nop", vec![]),
        pragma(Pragma::Xorg(int(0x4000))),
    ]);
    assert!(has_error(&out, "Z0431"));
}

#[test]
fn disp_shifts_logical_addresses_without_moving_the_cursor() {
    let out = assemble_ok(vec![
        org(0x8000),
        pragma(Pragma::Disp(int(0x1000))),
        op("nop", vec![]).with_label("moved"),
        pragma(Pragma::Equ(Expr::CurAddress)).with_label("dollar"),
    ]);
    assert_eq!(symbol_value(&out, "moved"), Value::Int(0x9000));
    assert_eq!(symbol_value(&out, "dollar"), Value::Int(0x9001));
    assert_eq!(out.segments[0].emitted.len(), 1);
    assert_eq!(out.segments[0].displacement, 0x1000);
}

#[test]
fn current_instruction_marker_differs_from_current_address() {
    // $$ refers to the instruction start, $ to the next free byte.
    let out = assemble_ok(vec![
        org(0x8000),
        defb(vec![int(1), int(2), Expr::CurInstruction, Expr::CurAddress]),
    ]);
    // $$ = 0x8000 (low byte 0x00), $ = 0x8003 at that point (low byte 0x03).
    assert_eq!(out.bytes(0), [1, 2, 0x00, 0x03]);
}

#[rstest::rstest]
#[case(false, false, &[0x41, 0x42])]
#[case(true, false, &[0x41, 0xC2])]
#[case(false, true, &[0x41, 0x42, 0x00])]
#[case(true, true, &[0x41, 0xC2, 0x00])]
fn defm_variants_terminate_differently(
    #[case] bit7: bool,
    #[case] null: bool,
    #[case] expected: &[u8],
) {
    let out = assemble_ok(vec![pragma(Pragma::DefM {
        text: string("AB"),
        bit7_terminator: bit7,
        null_terminator: null,
    })]);
    assert_eq!(out.bytes(0), expected);
}

#[test]
fn defm_decodes_spectrum_escapes() {
    let out = assemble_ok(vec![pragma(Pragma::DefM {
        text: string("\\i\\P\\x7F"),
        bit7_terminator: false,
        null_terminator: false,
    })]);
    assert_eq!(out.bytes(0), [0x10, 0x60, 0x7F]);
}

#[test]
fn defh_packs_hex_pairs() {
    let out = assemble_ok(vec![pragma(Pragma::DefH(string("DEADbeef")))]);
    assert_eq!(out.bytes(0), [0xDE, 0xAD, 0xBE, 0xEF]);

    let out = assemble(vec![pragma(Pragma::DefH(string("ABC")))]);
    assert!(has_error(&out, "Z0083"));
}

#[test]
fn defs_and_fills() {
    let out = assemble_ok(vec![pragma(Pragma::DefS {
        count: int(3),
        fill: None,
    })]);
    assert_eq!(out.bytes(0), [0, 0, 0]);

    let out = assemble_ok(vec![pragma(Pragma::DefS {
        count: int(2),
        fill: Some(int(0xEE)),
    })]);
    assert_eq!(out.bytes(0), [0xEE, 0xEE]);

    let out = assemble_ok(vec![pragma(Pragma::FillB {
        count: int(3),
        value: int(0x11),
    })]);
    assert_eq!(out.bytes(0), [0x11, 0x11, 0x11]);

    let out = assemble_ok(vec![pragma(Pragma::FillW {
        count: int(2),
        value: int(0x1234),
    })]);
    assert_eq!(out.bytes(0), [0x34, 0x12, 0x34, 0x12]);
}

#[test]
fn defw_emits_little_endian_words() {
    let out = assemble_ok(vec![pragma(Pragma::DefW(vec![int(0x1234), int(-1)]))]);
    assert_eq!(out.bytes(0), [0x34, 0x12, 0xFF, 0xFF]);
}

#[test]
fn align_pads_with_zeros() {
    let out = assemble_ok(vec![
        org(0x8001),
        op("nop", vec![]),
        pragma(Pragma::Align(Some(int(4)))),
        op("halt", vec![]),
    ]);
    // 0x8002 aligns up to 0x8004.
    assert_eq!(out.bytes(0), [0x00, 0x00, 0x00, 0x76]);

    let out = assemble(vec![pragma(Pragma::Align(Some(int(0))))]);
    assert!(has_error(&out, "Z0082"));
}

#[test]
fn skip_fills_up_to_the_target() {
    let out = assemble_ok(vec![
        org(0x8000),
        op("nop", vec![]),
        pragma(Pragma::Skip {
            target: int(0x8004),
            fill: None,
        }),
        op("halt", vec![]),
    ]);
    assert_eq!(out.bytes(0), [0x00, 0xFF, 0xFF, 0xFF, 0x76]);

    let out = assemble(vec![
        org(0x8010),
        pragma(Pragma::Skip {
            target: int(0x8000),
            fill: None,
        }),
    ]);
    assert!(has_error(&out, "Z0081"));
}

#[test]
fn defg_packs_pixel_patterns() {
    let out = assemble_ok(vec![pragma(Pragma::DefG("XXXX.... ..XXXX..".into()))]);
    assert_eq!(out.bytes(0), [0xF0, 0x3C]);
}

#[test]
fn defgx_honors_alignment_markers() {
    let out = assemble_ok(vec![pragma(Pragma::DefGx(string(">XXXXXXXX XXXX")))]);
    assert_eq!(out.bytes(0), [0x0F, 0xFF]);

    let out = assemble_ok(vec![pragma(Pragma::DefGx(string("<XXXXXXXX XXXX")))]);
    assert_eq!(out.bytes(0), [0xFF, 0xF0]);
}

#[test]
fn trace_collects_messages() {
    let out = assemble_ok(vec![
        pragma(Pragma::Trace {
            hex: false,
            exprs: vec![string("value="), int(42)],
        }),
        pragma(Pragma::Trace {
            hex: true,
            exprs: vec![int(0xBEEF)],
        }),
    ]);
    assert_eq!(out.trace, vec!["value=42".to_owned(), "$BEEF".to_owned()]);
}

#[test]
fn model_can_be_set_once() {
    let out = assemble(vec![
        pragma(Pragma::Model("SPECTRUM128".into())),
        pragma(Pragma::Model("NEXT".into())),
    ]);
    assert!(has_error(&out, "Z0088"));
}

#[test]
fn rndseed_makes_rnd_reproducible() {
    let program = || {
        vec![
            pragma(Pragma::RndSeed(Some(int(1234)))),
            defb(vec![
                Expr::Call("rnd".into(), vec![]),
                Expr::Call("rnd".into(), vec![]),
            ]),
        ]
    };
    let first = assemble_ok(program());
    let second = assemble_ok(program());
    assert_eq!(first.bytes(0), second.bytes(0));
}

#[test]
fn error_pragma_reports_the_message() {
    let out = assemble(vec![pragma(Pragma::Error(string("broken build")))]);
    assert!(out.failed);
    let diag = out
        .diagnostics
        .iter()
        .find(|d| d.code.code() == "Z0500")
        .unwrap();
    assert_eq!(diag.message, "broken build");
}

#[test]
fn includebin_emits_file_slices() {
    let path = std::env::temp_dir().join(format!(
        "z80-assembler-includebin-{}.bin",
        std::process::id()
    ));
    std::fs::write(&path, [1u8, 2, 3, 4, 5]).unwrap();
    let path_str = path.to_string_lossy().into_owned();

    let out = assemble_ok(vec![pragma(Pragma::IncludeBin {
        path: string(&path_str),
        offset: None,
        length: None,
    })]);
    assert_eq!(out.bytes(0), [1, 2, 3, 4, 5]);

    let out = assemble_ok(vec![pragma(Pragma::IncludeBin {
        path: string(&path_str),
        offset: Some(int(1)),
        length: Some(int(3)),
    })]);
    assert_eq!(out.bytes(0), [2, 3, 4]);

    let out = assemble(vec![pragma(Pragma::IncludeBin {
        path: string(&path_str),
        offset: Some(int(9)),
        length: None,
    })]);
    assert!(has_error(&out, "Z0424"));

    let out = assemble(vec![pragma(Pragma::IncludeBin {
        path: string(&path_str),
        offset: Some(int(2)),
        length: Some(int(9)),
    })]);
    assert!(has_error(&out, "Z0425"));

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_includebin_file_is_reported() {
    let out = assemble(vec![pragma(Pragma::IncludeBin {
        path: string("/nonexistent/definitely-not-here.bin"),
        offset: None,
        length: None,
    })]);
    assert!(has_error(&out, "Z0426"));
}

#[test]
fn comparebin_records_a_deferred_request() {
    let out = assemble_ok(vec![
        org(0x8000),
        op("nop", vec![]),
        pragma(Pragma::CompareBin(string("/tmp/reference.bin"))),
        op("halt", vec![]),
    ]);
    assert_eq!(out.compare_requests.len(), 1);
    let request = &out.compare_requests[0];
    assert_eq!(request.segment, 0);
    assert_eq!(request.offset, 1);
    assert!(request.path.ends_with("reference.bin"));
}

#[test]
fn org_label_takes_the_new_address() {
    let out = assemble_ok(vec![
        org(0x8000),
        op("nop", vec![]),
        pragma(Pragma::Org(int(0xA000))).with_label("second"),
        op("halt", vec![]),
    ]);
    assert_eq!(symbol_value(&out, "second"), Value::Int(0xA000));
}
