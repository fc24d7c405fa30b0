//! `CB`-prefixed shift/rotate and bit test/set/reset encodings.
//!
//! In the indexed forms the displacement byte precedes the operation byte
//! (`DD CB d op`).

use crate::{
    assembler::Assembler,
    ast::{
        Operand,
        Operation,
    },
    diag::DiagCode,
};

use z80_asm::{
    bit_b_r,
    res_b_r,
    rot_op,
    set_b_r,
    RotOp,
    Reg16,
    HL_INDIRECT_INDEX,
    PREFIX_CB,
};

impl Assembler {
    pub(crate) fn encode_rot(&mut self, op: &Operation) {
        let mnemonic = op.mnemonic.to_ascii_uppercase();
        let rot = match RotOp::from_mnemonic(&mnemonic) {
            Some(rot) => rot,
            None => return self.invalid_operands(&mnemonic),
        };
        match &op.operands[0] {
            Operand::Reg8(r) => {
                self.emit_byte(PREFIX_CB);
                self.emit_byte(rot_op(rot.index(), r.index()));
            }
            Operand::RegIndirect(Reg16::HL) => {
                self.emit_byte(PREFIX_CB);
                self.emit_byte(rot_op(rot.index(), HL_INDIRECT_INDEX));
            }
            Operand::RegIndirect(_) => {
                self.report(
                    DiagCode::RegisterIndirectNotHl,
                    "only (HL) is a valid memory operand here",
                );
            }
            Operand::IndexedAddress { reg, sign, offset } => {
                self.emit_byte(reg.prefix());
                self.emit_byte(PREFIX_CB);
                self.emit_index_displacement(*sign, offset.as_ref());
                self.emit_byte(rot_op(rot.index(), HL_INDIRECT_INDEX));
            }
            _ => self.invalid_operands(&mnemonic),
        }
    }

    pub(crate) fn encode_bitop(&mut self, op: &Operation) {
        let mnemonic = op.mnemonic.to_ascii_uppercase();
        let encode: fn(u8, u8) -> u8 = match mnemonic.as_str() {
            "BIT" => bit_b_r,
            "RES" => res_b_r,
            "SET" => set_b_r,
            _ => return self.invalid_operands(&mnemonic),
        };

        let bit_expr = match &op.operands[0] {
            Operand::Expr(e) => e,
            _ => return self.invalid_operands(&mnemonic),
        };
        let bit = match self.eval_immediate_int(bit_expr, "a bit index") {
            Some(bit) if (0..=7).contains(&bit) => bit as u8,
            Some(bit) => {
                self.report(
                    DiagCode::BitIndexOutOfRange,
                    format!("bit index {bit} is outside 0..7"),
                );
                0
            }
            None => 0,
        };

        match &op.operands[1] {
            Operand::Reg8(r) => {
                self.emit_byte(PREFIX_CB);
                self.emit_byte(encode(bit, r.index()));
            }
            Operand::RegIndirect(Reg16::HL) => {
                self.emit_byte(PREFIX_CB);
                self.emit_byte(encode(bit, HL_INDIRECT_INDEX));
            }
            Operand::RegIndirect(_) => {
                self.report(
                    DiagCode::RegisterIndirectNotHl,
                    "only (HL) is a valid memory operand here",
                );
            }
            Operand::IndexedAddress { reg, sign, offset } => {
                self.emit_byte(reg.prefix());
                self.emit_byte(PREFIX_CB);
                self.emit_index_displacement(*sign, offset.as_ref());
                self.emit_byte(encode(bit, HL_INDIRECT_INDEX));
            }
            _ => self.invalid_operands(&mnemonic),
        }
    }
}
