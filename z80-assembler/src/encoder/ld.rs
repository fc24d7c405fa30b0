//! `LD` and `EX` encodings.

use crate::{
    assembler::Assembler,
    ast::{
        Operand,
        Operation,
    },
    diag::DiagCode,
};

use z80_asm::{
    ld_r_n,
    ld_r_r,
    ld_rr_nn,
    Reg16,
    Reg16Spec,
    Reg8,
    Reg8Spec,
    HL_INDIRECT_INDEX,
    PREFIX_ED,
};

impl Assembler {
    pub(crate) fn encode_ld(&mut self, op: &Operation) {
        let (dst, src) = (&op.operands[0], &op.operands[1]);
        match (dst, src) {
            // 8-bit register to register, index halves included.
            (Operand::Reg8(d), Operand::Reg8(s)) => {
                self.emit_byte(ld_r_r(d.index(), s.index()));
            }
            (Operand::Reg8(d), Operand::Reg8Idx(s)) => {
                if d.is_hl_half() {
                    return self.invalid_operands("LD");
                }
                self.emit_byte(s.prefix());
                self.emit_byte(ld_r_r(d.index(), s.index()));
            }
            (Operand::Reg8Idx(d), Operand::Reg8(s)) => {
                if s.is_hl_half() {
                    return self.invalid_operands("LD");
                }
                self.emit_byte(d.prefix());
                self.emit_byte(ld_r_r(d.index(), s.index()));
            }
            (Operand::Reg8Idx(d), Operand::Reg8Idx(s)) => {
                if d.prefix() != s.prefix() {
                    return self.invalid_operands("LD");
                }
                self.emit_byte(d.prefix());
                self.emit_byte(ld_r_r(d.index(), s.index()));
            }

            // 8-bit immediates.
            (Operand::Reg8(d), Operand::Expr(e)) => {
                self.emit_byte(ld_r_n(d.index()));
                self.emit_expr_byte(e);
            }
            (Operand::Reg8Idx(d), Operand::Expr(e)) => {
                self.emit_byte(d.prefix());
                self.emit_byte(ld_r_n(d.index()));
                self.emit_expr_byte(e);
            }

            // Accumulator against register-indirect pairs.
            (Operand::Reg8(Reg8::A), Operand::RegIndirect(Reg16::BC)) => self.emit_byte(0x0A),
            (Operand::Reg8(Reg8::A), Operand::RegIndirect(Reg16::DE)) => self.emit_byte(0x1A),
            (Operand::Reg8(d), Operand::RegIndirect(Reg16::HL)) => {
                self.emit_byte(ld_r_r(d.index(), HL_INDIRECT_INDEX));
            }
            (Operand::Reg8(_), Operand::RegIndirect(_)) => {
                self.report(
                    DiagCode::RegisterIndirectNotHl,
                    "only (HL) can be loaded into this register",
                );
            }
            (Operand::RegIndirect(Reg16::BC), Operand::Reg8(Reg8::A)) => self.emit_byte(0x02),
            (Operand::RegIndirect(Reg16::DE), Operand::Reg8(Reg8::A)) => self.emit_byte(0x12),
            (Operand::RegIndirect(Reg16::HL), Operand::Reg8(s)) => {
                self.emit_byte(ld_r_r(HL_INDIRECT_INDEX, s.index()));
            }
            (Operand::RegIndirect(Reg16::HL), Operand::Expr(e)) => {
                self.emit_byte(0x36);
                self.emit_expr_byte(e);
            }
            (Operand::RegIndirect(_), Operand::Reg8(_) | Operand::Expr(_)) => {
                self.report(
                    DiagCode::RegisterIndirectNotHl,
                    "only (HL) can be a store target here",
                );
            }

            // Indexed addressing.
            (Operand::Reg8(d), Operand::IndexedAddress { reg, sign, offset }) => {
                self.emit_byte(reg.prefix());
                self.emit_byte(ld_r_r(d.index(), HL_INDIRECT_INDEX));
                self.emit_index_displacement(*sign, offset.as_ref());
            }
            (Operand::IndexedAddress { reg, sign, offset }, Operand::Reg8(s)) => {
                self.emit_byte(reg.prefix());
                self.emit_byte(ld_r_r(HL_INDIRECT_INDEX, s.index()));
                self.emit_index_displacement(*sign, offset.as_ref());
            }
            (Operand::IndexedAddress { reg, sign, offset }, Operand::Expr(e)) => {
                self.emit_byte(reg.prefix());
                self.emit_byte(0x36);
                self.emit_index_displacement(*sign, offset.as_ref());
                self.emit_expr_byte(e);
            }

            // Accumulator against absolute memory.
            (Operand::Reg8(Reg8::A), Operand::MemIndirect(e)) => {
                self.emit_byte(0x3A);
                self.emit_expr_word(e);
            }
            (Operand::MemIndirect(e), Operand::Reg8(Reg8::A)) => {
                self.emit_byte(0x32);
                self.emit_expr_word(e);
            }

            // Interrupt vector and refresh registers.
            (Operand::Reg8Spec(d), Operand::Reg8(Reg8::A)) => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(match d {
                    Reg8Spec::I => 0x47,
                    Reg8Spec::R => 0x4F,
                });
            }
            (Operand::Reg8(Reg8::A), Operand::Reg8Spec(s)) => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(match s {
                    Reg8Spec::I => 0x57,
                    Reg8Spec::R => 0x5F,
                });
            }

            // 16-bit loads.
            (Operand::Reg16(Reg16::SP), Operand::Reg16(Reg16::HL)) => self.emit_byte(0xF9),
            (Operand::Reg16(Reg16::SP), Operand::Reg16Idx(i)) => {
                self.emit_byte(i.prefix());
                self.emit_byte(0xF9);
            }
            (Operand::Reg16(rr), Operand::Expr(e)) => {
                self.emit_byte(ld_rr_nn(rr.index()));
                self.emit_expr_word(e);
            }
            (Operand::Reg16Idx(i), Operand::Expr(e)) => {
                self.emit_byte(i.prefix());
                self.emit_byte(0x21);
                self.emit_expr_word(e);
            }
            (Operand::Reg16(Reg16::HL), Operand::MemIndirect(e)) => {
                self.emit_byte(0x2A);
                self.emit_expr_word(e);
            }
            (Operand::Reg16(rr), Operand::MemIndirect(e)) => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x4B + (rr.index() << 4));
                self.emit_expr_word(e);
            }
            (Operand::Reg16Idx(i), Operand::MemIndirect(e)) => {
                self.emit_byte(i.prefix());
                self.emit_byte(0x2A);
                self.emit_expr_word(e);
            }
            (Operand::MemIndirect(e), Operand::Reg16(Reg16::HL)) => {
                self.emit_byte(0x22);
                self.emit_expr_word(e);
            }
            (Operand::MemIndirect(e), Operand::Reg16(rr)) => {
                self.emit_byte(PREFIX_ED);
                self.emit_byte(0x43 + (rr.index() << 4));
                self.emit_expr_word(e);
            }
            (Operand::MemIndirect(e), Operand::Reg16Idx(i)) => {
                self.emit_byte(i.prefix());
                self.emit_byte(0x22);
                self.emit_expr_word(e);
            }

            _ => self.invalid_operands("LD"),
        }
    }

    pub(crate) fn encode_ex(&mut self, op: &Operation) {
        let (a, b) = (&op.operands[0], &op.operands[1]);
        match (a, b) {
            (Operand::Reg16Spec(Reg16Spec::AF), Operand::Reg16Spec(Reg16Spec::AFAlt)) => {
                self.emit_byte(0x08);
            }
            (Operand::Reg16(Reg16::DE), Operand::Reg16(Reg16::HL)) => self.emit_byte(0xEB),
            (Operand::RegIndirect(Reg16::SP), Operand::Reg16(Reg16::HL)) => {
                self.emit_byte(0xE3);
            }
            (Operand::RegIndirect(Reg16::SP), Operand::Reg16Idx(i)) => {
                self.emit_byte(i.prefix());
                self.emit_byte(0xE3);
            }
            _ => self.invalid_operands("EX"),
        }
    }
}
