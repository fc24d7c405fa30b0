//! ALU, `INC`/`DEC` and 16-bit arithmetic encodings.

use crate::{
    assembler::Assembler,
    ast::{
        Operand,
        Operation,
    },
    diag::DiagCode,
};

use z80_asm::{
    adc_hl_rr,
    add_hl_rr,
    alu_a_n,
    alu_a_r,
    dec_r,
    dec_rr,
    inc_r,
    inc_rr,
    sbc_hl_rr,
    AluOp,
    Reg16,
    Reg8,
    HL_INDIRECT_INDEX,
    PREFIX_ED,
};

impl Assembler {
    /// `SUB`/`AND`/`XOR`/`OR`/`CP`, and the 8-bit forms of `ADD`/`ADC`/
    /// `SBC`. Accepts both the `op A,src` and the implicit-accumulator
    /// `op src` spellings.
    pub(crate) fn encode_alu_simple(&mut self, op: &Operation) {
        let mnemonic = op.mnemonic.to_ascii_uppercase();
        let alu = match AluOp::from_mnemonic(&mnemonic) {
            Some(alu) => alu,
            None => return self.invalid_operands(&mnemonic),
        };
        let src = match op.operands.as_slice() {
            [Operand::Reg8(Reg8::A), src] => src,
            [src] => src,
            _ => return self.invalid_operands(&mnemonic),
        };
        self.encode_alu_src(&mnemonic, alu, src);
    }

    fn encode_alu_src(&mut self, mnemonic: &str, alu: AluOp, src: &Operand) {
        match src {
            Operand::Reg8(r) => self.emit_byte(alu_a_r(alu.index(), r.index())),
            Operand::Reg8Idx(x) => {
                self.emit_byte(x.prefix());
                self.emit_byte(alu_a_r(alu.index(), x.index()));
            }
            Operand::RegIndirect(Reg16::HL) => {
                self.emit_byte(alu_a_r(alu.index(), HL_INDIRECT_INDEX));
            }
            Operand::RegIndirect(_) => {
                self.report(
                    DiagCode::RegisterIndirectNotHl,
                    "only (HL) is a valid memory operand here",
                );
            }
            Operand::IndexedAddress { reg, sign, offset } => {
                self.emit_byte(reg.prefix());
                self.emit_byte(alu_a_r(alu.index(), HL_INDIRECT_INDEX));
                self.emit_index_displacement(*sign, offset.as_ref());
            }
            Operand::Expr(e) => {
                self.emit_byte(alu_a_n(alu.index()));
                self.emit_expr_byte(e);
            }
            _ => self.invalid_operands(mnemonic),
        }
    }

    pub(crate) fn encode_add(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Reg16(Reg16::HL), Operand::Reg16(rr)] => {
                self.emit_byte(add_hl_rr(rr.index()));
            }
            [Operand::Reg16Idx(i), Operand::Reg16(rr)] => {
                if *rr == Reg16::HL {
                    return self.invalid_operands("ADD");
                }
                self.emit_byte(i.prefix());
                self.emit_byte(add_hl_rr(rr.index()));
            }
            [Operand::Reg16Idx(i), Operand::Reg16Idx(j)] => {
                if i != j {
                    return self.invalid_operands("ADD");
                }
                self.emit_byte(i.prefix());
                self.emit_byte(add_hl_rr(Reg16::HL.index()));
            }
            // Z80N: ADD rr,A and ADD rr,nn.
            [Operand::Reg16(rr), Operand::Reg8(Reg8::A)] => {
                let opcode = match rr {
                    Reg16::HL => 0x31,
                    Reg16::DE => 0x32,
                    Reg16::BC => 0x33,
                    Reg16::SP => return self.invalid_operands("ADD"),
                };
                self.require_next_model("ADD");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(opcode);
            }
            [Operand::Reg16(rr), Operand::Expr(e)] => {
                let opcode = match rr {
                    Reg16::HL => 0x34,
                    Reg16::DE => 0x35,
                    Reg16::BC => 0x36,
                    Reg16::SP => return self.invalid_operands("ADD"),
                };
                self.require_next_model("ADD");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(opcode);
                self.emit_expr_word(e);
            }
            _ => self.encode_alu_simple(op),
        }
    }

    pub(crate) fn encode_adc(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Reg16(Reg16::HL), Operand::Reg16(rr)] => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(adc_hl_rr(rr.index()));
            }
            [Operand::Reg16(_), _] | [_, Operand::Reg16(_)] => self.invalid_operands("ADC"),
            _ => self.encode_alu_simple(op),
        }
    }

    pub(crate) fn encode_sbc(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Reg16(Reg16::HL), Operand::Reg16(rr)] => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(sbc_hl_rr(rr.index()));
            }
            [Operand::Reg16(_), _] | [_, Operand::Reg16(_)] => self.invalid_operands("SBC"),
            _ => self.encode_alu_simple(op),
        }
    }

    pub(crate) fn encode_inc(&mut self, op: &Operation) {
        self.encode_step(op, true);
    }

    pub(crate) fn encode_dec(&mut self, op: &Operation) {
        self.encode_step(op, false);
    }

    fn encode_step(&mut self, op: &Operation, increment: bool) {
        let mnemonic = if increment { "INC" } else { "DEC" };
        let r_op = |r: u8| if increment { inc_r(r) } else { dec_r(r) };
        let rr_op = |rr: u8| if increment { inc_rr(rr) } else { dec_rr(rr) };
        match &op.operands[0] {
            Operand::Reg8(r) => self.emit_byte(r_op(r.index())),
            Operand::Reg8Idx(x) => {
                self.emit_byte(x.prefix());
                self.emit_byte(r_op(x.index()));
            }
            Operand::Reg16(rr) => self.emit_byte(rr_op(rr.index())),
            Operand::Reg16Idx(i) => {
                self.emit_byte(i.prefix());
                self.emit_byte(rr_op(Reg16::HL.index()));
            }
            Operand::RegIndirect(Reg16::HL) => self.emit_byte(r_op(HL_INDIRECT_INDEX)),
            Operand::RegIndirect(_) => {
                self.report(
                    DiagCode::RegisterIndirectNotHl,
                    "only (HL) is a valid memory operand here",
                );
            }
            Operand::IndexedAddress { reg, sign, offset } => {
                self.emit_byte(reg.prefix());
                self.emit_byte(r_op(HL_INDIRECT_INDEX));
                self.emit_index_displacement(*sign, offset.as_ref());
            }
            _ => self.invalid_operands(mnemonic),
        }
    }
}
