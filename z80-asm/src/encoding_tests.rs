use crate::*;

use rstest::rstest;
use strum::IntoEnumIterator;

#[test]
fn reg8_indices_match_hardware_slots() {
    let expected = [
        (Reg8::B, 0),
        (Reg8::C, 1),
        (Reg8::D, 2),
        (Reg8::E, 3),
        (Reg8::H, 4),
        (Reg8::L, 5),
        (Reg8::A, 7),
    ];
    for (reg, index) in expected {
        assert_eq!(reg.index(), index);
    }
    // The (HL) slot stays free.
    assert!(Reg8::iter().all(|r| r.index() != HL_INDIRECT_INDEX));
}

#[test]
fn condition_indices_and_jr_forms() {
    let expected = [
        (Condition::NZ, 0, Some(0x20)),
        (Condition::Z, 1, Some(0x28)),
        (Condition::NC, 2, Some(0x30)),
        (Condition::C, 3, Some(0x38)),
        (Condition::PO, 4, None),
        (Condition::PE, 5, None),
        (Condition::P, 6, None),
        (Condition::M, 7, None),
    ];
    for (cc, index, jr) in expected {
        assert_eq!(cc.index(), index);
        assert_eq!(cc.jr_opcode(), jr);
    }
}

#[rstest]
#[case("nop", &[0x00], false)]
#[case("HALT", &[0x76], false)]
#[case("exx", &[0xD9], false)]
#[case("Neg", &[0xED, 0x44], false)]
#[case("ldir", &[0xED, 0xB0], false)]
#[case("otdr", &[0xED, 0xBB], false)]
#[case("swapnib", &[0xED, 0x23], true)]
#[case("LDIRSCALE", &[0xED, 0xB6], true)]
#[case("ldpirx", &[0xED, 0xB7], true)]
#[case("pixelad", &[0xED, 0x94], true)]
fn no_operand_table(#[case] mnemonic: &str, #[case] bytes: &[u8], #[case] next_only: bool) {
    let op = no_operand_op(mnemonic).expect("known mnemonic");
    assert_eq!(op.bytes, bytes);
    assert_eq!(op.next_only, next_only);
}

#[test]
fn unknown_mnemonic_is_absent() {
    assert_eq!(no_operand_op("frobnicate"), None);
    // Operations with operands are not in the no-operand table.
    assert_eq!(no_operand_op("mul"), None);
    assert_eq!(no_operand_op("mirror"), None);
}

#[test]
fn ld_family() {
    // ld a,b / ld b,a / ld (hl),a / ld a,(hl)
    assert_eq!(ld_r_r(Reg8::A.index(), Reg8::B.index()), 0x78);
    assert_eq!(ld_r_r(Reg8::B.index(), Reg8::A.index()), 0x47);
    assert_eq!(ld_r_r(HL_INDIRECT_INDEX, Reg8::A.index()), 0x77);
    assert_eq!(ld_r_r(Reg8::A.index(), HL_INDIRECT_INDEX), 0x7E);

    assert_eq!(ld_r_n(Reg8::A.index()), 0x3E);
    assert_eq!(ld_r_n(HL_INDIRECT_INDEX), 0x36);

    assert_eq!(ld_rr_nn(Reg16::BC.index()), 0x01);
    assert_eq!(ld_rr_nn(Reg16::SP.index()), 0x31);
}

#[test]
fn inc_dec_family() {
    assert_eq!(inc_r(Reg8::A.index()), 0x3C);
    assert_eq!(dec_r(Reg8::A.index()), 0x3D);
    assert_eq!(inc_r(HL_INDIRECT_INDEX), 0x34);
    assert_eq!(dec_r(HL_INDIRECT_INDEX), 0x35);
    assert_eq!(inc_rr(Reg16::HL.index()), 0x23);
    assert_eq!(dec_rr(Reg16::DE.index()), 0x1B);
}

#[test]
fn sixteen_bit_arithmetic() {
    assert_eq!(add_hl_rr(Reg16::BC.index()), 0x09);
    assert_eq!(add_hl_rr(Reg16::SP.index()), 0x39);
    assert_eq!(adc_hl_rr(Reg16::HL.index()), 0x6A);
    assert_eq!(sbc_hl_rr(Reg16::BC.index()), 0x42);
}

#[test]
fn alu_family() {
    assert_eq!(alu_a_r(AluOp::Add.index(), Reg8::B.index()), 0x80);
    assert_eq!(alu_a_r(AluOp::Cp.index(), Reg8::A.index()), 0xBF);
    assert_eq!(alu_a_r(AluOp::Xor.index(), HL_INDIRECT_INDEX), 0xAE);
    assert_eq!(alu_a_n(AluOp::Add.index()), 0xC6);
    assert_eq!(alu_a_n(AluOp::Cp.index()), 0xFE);
}

#[test]
fn flow_family() {
    assert_eq!(jp_cc(Condition::NZ.index()), 0xC2);
    assert_eq!(jp_cc(Condition::M.index()), 0xFA);
    assert_eq!(call_cc(Condition::Z.index()), 0xCC);
    assert_eq!(ret_cc(Condition::C.index()), 0xD8);
}

#[test]
fn rst_targets() {
    for (i, target) in (0u8..8).map(|i| (i, i * 8)) {
        assert_eq!(rst_opcode(target), Some(0xC7 + i * 8));
    }
    assert_eq!(rst_opcode(0x12), None);
    assert_eq!(rst_opcode(0x40), None);
}

#[test]
fn cb_family() {
    assert_eq!(rot_op(RotOp::Rlc.index(), Reg8::B.index()), 0x00);
    assert_eq!(rot_op(RotOp::Srl.index(), Reg8::A.index()), 0x3F);
    assert_eq!(rot_op(RotOp::Sll.index(), HL_INDIRECT_INDEX), 0x36);
    assert_eq!(bit_b_r(3, HL_INDIRECT_INDEX), 0x5E);
    assert_eq!(res_b_r(0, Reg8::A.index()), 0x87);
    assert_eq!(set_b_r(7, Reg8::B.index()), 0xF8);
}

#[test]
fn io_family() {
    assert_eq!(in_r_c(Reg8::B.index()), 0x40);
    assert_eq!(in_r_c(Reg8::A.index()), 0x78);
    assert_eq!(out_c_r(Reg8::C.index()), 0x49);
    assert_eq!(im_opcode(2), Some(0x5E));
    assert_eq!(im_opcode(3), None);
}

#[test]
fn indexed_halves_use_hl_slots() {
    assert_eq!(Reg8Idx::XH.index(), Reg8::H.index());
    assert_eq!(Reg8Idx::YL.index(), Reg8::L.index());
    assert_eq!(Reg8Idx::XH.prefix(), PREFIX_IX);
    assert_eq!(Reg8Idx::YH.prefix(), PREFIX_IY);
}

#[test]
fn register_names_parse_case_insensitively() {
    assert_eq!("a".parse::<Reg8>(), Ok(Reg8::A));
    assert_eq!("Xh".parse::<Reg8Idx>(), Ok(Reg8Idx::XH));
    assert_eq!("iy".parse::<Reg16Idx>(), Ok(Reg16Idx::IY));
    assert_eq!("af'".parse::<Reg16Spec>(), Ok(Reg16Spec::AFAlt));
    assert_eq!("pe".parse::<Condition>(), Ok(Condition::PE));
    assert_eq!("next".parse::<Model>(), Ok(Model::Next));
}
