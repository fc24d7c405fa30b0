//! `PUSH`/`POP` encodings, the Z80N immediate push included.

use crate::{
    assembler::Assembler,
    ast::{
        Operand,
        Operation,
    },
    diag::DiagCode,
    eval::Eval,
};

use z80_asm::{
    pop_rr,
    push_rr,
    Reg16,
    Reg16Spec,
    PREFIX_ED,
};

impl Assembler {
    pub(crate) fn encode_push(&mut self, op: &Operation) {
        match &op.operands[0] {
            Operand::Reg16(Reg16::SP) => self.invalid_operands("PUSH"),
            Operand::Reg16(rr) => self.emit_byte(push_rr(rr.index())),
            Operand::Reg16Spec(Reg16Spec::AF) => self.emit_byte(push_rr(Reg16::SP.index())),
            Operand::Reg16Idx(i) => {
                self.emit_byte(i.prefix());
                self.emit_byte(0xE5);
            }
            // Z80N: PUSH nn stores its immediate big-endian.
            Operand::Expr(e) => {
                self.require_next_model("PUSH");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x8A);
                match self.eval(e) {
                    Eval::Valid(v) => match v.as_word() {
                        Some(word) => {
                            self.emit_byte((word >> 8) as u8);
                            self.emit_byte(word as u8);
                        }
                        None => {
                            self.report(
                                DiagCode::StringWhereNumericRequired,
                                "a numeric value is required, got a string",
                            );
                            self.emit_word(0);
                        }
                    },
                    Eval::NonEvaluated(name) => {
                        // No big-endian patch shape exists; the immediate
                        // must be known when the instruction is emitted.
                        self.report_token(
                            DiagCode::UnresolvedSymbol,
                            format!("PUSH immediate must be known; {name} is undefined"),
                            name.clone(),
                        );
                        self.emit_word(0);
                    }
                    Eval::Invalid(fault) => {
                        self.report(fault.code, fault.message);
                        self.emit_word(0);
                    }
                }
            }
            _ => self.invalid_operands("PUSH"),
        }
    }

    pub(crate) fn encode_pop(&mut self, op: &Operation) {
        match &op.operands[0] {
            Operand::Reg16(Reg16::SP) => self.invalid_operands("POP"),
            Operand::Reg16(rr) => self.emit_byte(pop_rr(rr.index())),
            Operand::Reg16Spec(Reg16Spec::AF) => self.emit_byte(pop_rr(Reg16::SP.index())),
            Operand::Reg16Idx(i) => {
                self.emit_byte(i.prefix());
                self.emit_byte(0xE1);
            }
            _ => self.invalid_operands("POP"),
        }
    }
}
