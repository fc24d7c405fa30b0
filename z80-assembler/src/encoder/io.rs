//! `IN`/`OUT` encodings.

use crate::{
    assembler::Assembler,
    ast::{
        Operand,
        Operation,
    },
    diag::DiagCode,
};

use z80_asm::{
    in_r_c,
    out_c_r,
    Reg8,
    PREFIX_ED,
};

impl Assembler {
    pub(crate) fn encode_in(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Reg8(Reg8::A), Operand::MemIndirect(e)] => {
                self.emit_byte(0xDB);
                self.emit_expr_byte(e);
            }
            [Operand::Reg8(r), Operand::CPort] => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(in_r_c(r.index()));
            }
            // IN (C): input and drop, flags only.
            [Operand::CPort] => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x70);
            }
            _ => self.invalid_operands("IN"),
        }
    }

    pub(crate) fn encode_out(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::MemIndirect(e), Operand::Reg8(Reg8::A)] => {
                self.emit_byte(0xD3);
                self.emit_expr_byte(e);
            }
            [Operand::CPort, Operand::Reg8(r)] => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(out_c_r(r.index()));
            }
            // OUT (C),0: the immediate must be the literal zero.
            [Operand::CPort, Operand::Expr(e)] => {
                match self.eval_immediate_int(e, "the OUT immediate") {
                    Some(0) => {
                        self.emit_byte(PREFIX_ED);
                        self.emit_byte(0x71);
                    }
                    Some(_) => {
                        self.report(
                            DiagCode::InvalidOperands,
                            "only OUT (C),0 is encodable with an immediate",
                        );
                    }
                    None => {}
                }
            }
            _ => self.invalid_operands("OUT"),
        }
    }
}
