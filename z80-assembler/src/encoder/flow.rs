//! Jump, call, return, restart and interrupt-mode encodings.

use crate::{
    assembler::Assembler,
    ast::{
        Operand,
        Operation,
    },
};

use z80_asm::{
    call_cc,
    im_opcode,
    jp_cc,
    ret_cc,
    rst_opcode,
    Reg16,
    PREFIX_ED,
};

impl Assembler {
    pub(crate) fn encode_jp(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Expr(e)] => {
                self.emit_byte(0xC3);
                self.emit_expr_word(e);
            }
            [Operand::Condition(cc), Operand::Expr(e)] => {
                self.emit_byte(jp_cc(cc.index()));
                self.emit_expr_word(e);
            }
            [Operand::RegIndirect(Reg16::HL)] => self.emit_byte(0xE9),
            [Operand::IndexedAddress { reg, offset: None, .. }] => {
                self.emit_byte(reg.prefix());
                self.emit_byte(0xE9);
            }
            // Z80N: JP (C).
            [Operand::CPort] => {
                self.require_next_model("JP");
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x98);
            }
            _ => self.invalid_operands("JP"),
        }
    }

    pub(crate) fn encode_jr(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Expr(e)] => {
                self.emit_byte(0x18);
                self.emit_jr_target(e);
            }
            [Operand::Condition(cc), Operand::Expr(e)] => match cc.jr_opcode() {
                Some(opcode) => {
                    self.emit_byte(opcode);
                    self.emit_jr_target(e);
                }
                None => self.invalid_operands("JR"),
            },
            _ => self.invalid_operands("JR"),
        }
    }

    pub(crate) fn encode_djnz(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Expr(e)] => {
                self.emit_byte(0x10);
                self.emit_jr_target(e);
            }
            _ => self.invalid_operands("DJNZ"),
        }
    }

    pub(crate) fn encode_call(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [Operand::Expr(e)] => {
                self.emit_byte(0xCD);
                self.emit_expr_word(e);
            }
            [Operand::Condition(cc), Operand::Expr(e)] => {
                self.emit_byte(call_cc(cc.index()));
                self.emit_expr_word(e);
            }
            _ => self.invalid_operands("CALL"),
        }
    }

    pub(crate) fn encode_ret(&mut self, op: &Operation) {
        match op.operands.as_slice() {
            [] => self.emit_byte(0xC9),
            [Operand::Condition(cc)] => self.emit_byte(ret_cc(cc.index())),
            _ => self.invalid_operands("RET"),
        }
    }

    pub(crate) fn encode_rst(&mut self, op: &Operation) {
        let target = match &op.operands[0] {
            Operand::Expr(e) => self.eval_immediate_int(e, "a restart target"),
            _ => None,
        };
        let Some(target) = target else {
            return;
        };
        match u8::try_from(target).ok().and_then(rst_opcode) {
            Some(opcode) => self.emit_byte(opcode),
            None => self.invalid_operands("RST"),
        }
    }

    pub(crate) fn encode_im(&mut self, op: &Operation) {
        let mode = match &op.operands[0] {
            Operand::Expr(e) => self.eval_immediate_int(e, "an interrupt mode"),
            _ => None,
        };
        let Some(mode) = mode else {
            return;
        };
        match u8::try_from(mode).ok().and_then(im_opcode) {
            Some(opcode) => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(opcode);
            }
            None => self.invalid_operands("IM"),
        }
    }
}
