//! Z80N extended instructions with operands. All of them gate on the
//! Spectrum Next model.

use crate::{
    assembler::Assembler,
    ast::{
        Operand,
        Operation,
    },
};

use z80_asm::{
    Reg16,
    Reg8,
    PREFIX_ED,
};

impl Assembler {
    /// `MUL D,E` — the only register pair the hardware multiplies.
    pub(crate) fn encode_mul(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Reg8(Reg8::D), Operand::Reg8(Reg8::E)] => {
                self.require_next_model("MUL");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x30);
            }
            _ => self.invalid_operands("MUL"),
        }
    }

    /// `MIRROR A` — reverses the accumulator's bit order.
    pub(crate) fn encode_mirror(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Reg8(Reg8::A)] => {
                self.require_next_model("MIRROR");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x24);
            }
            _ => self.invalid_operands("MIRROR"),
        }
    }

    /// `TEST n` — non-destructive `AND` against an immediate.
    pub(crate) fn encode_test(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Expr(e)] => {
                self.require_next_model("TEST");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x27);
                self.emit_expr_byte(e);
            }
            _ => self.invalid_operands("TEST"),
        }
    }

    /// `NEXTREG reg,value` and `NEXTREG reg,A`.
    pub(crate) fn encode_nextreg(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Expr(reg), Operand::Expr(value)] => {
                self.require_next_model("NEXTREG");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x91);
                self.emit_expr_byte(reg);
                self.emit_expr_byte(value);
            }
            [Operand::Expr(reg), Operand::Reg8(Reg8::A)] => {
                self.require_next_model("NEXTREG");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x92);
                self.emit_expr_byte(reg);
            }
            _ => self.invalid_operands("NEXTREG"),
        }
    }

    /// The `DE`-by-`B` barrel shifter family.
    pub(crate) fn encode_barrel(&mut self, op: &Operation) {
        let mnemonic = op.mnemonic.to_ascii_uppercase();
        let opcode = match mnemonic.as_str() {
            "BSLA" => 0x28,
            "BSRA" => 0x29,
            "BSRL" => 0x2A,
            "BSRF" => 0x2B,
            "BRLC" => 0x2C,
            _ => return self.invalid_operands(&mnemonic),
        };
        match op.operands.as_slice() {
            [Operand::Reg16(Reg16::DE), Operand::Reg8(Reg8::B)] => {
                self.require_next_model(&mnemonic);
                self.emit_byte(PREFIX_ED);
                self.emit_byte(opcode);
            }
            _ => self.invalid_operands(&mnemonic),
        }
    }
}
