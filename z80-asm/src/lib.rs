//! Instruction-set primitives of the Z80 assembler.
//!
//! This crate knows the Z80 (and Spectrum Next extended) instruction set at
//! the byte level: register and condition encoding indices, prefix bytes,
//! the no-operand opcode table, and the `const fn` encoders for the
//! parameterised opcode families. It holds no assembler state and performs
//! no I/O; the assembly engine lives in the `z80-assembler` crate.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod model;
mod opcode;
mod operand;

pub use model::Model;
pub use opcode::{
    adc_hl_rr,
    add_hl_rr,
    alu_a_n,
    alu_a_r,
    bit_b_r,
    call_cc,
    dec_r,
    dec_rr,
    im_opcode,
    in_r_c,
    inc_r,
    inc_rr,
    jp_cc,
    ld_r_n,
    ld_r_r,
    ld_rr_nn,
    no_operand_op,
    out_c_r,
    pop_rr,
    push_rr,
    res_b_r,
    ret_cc,
    rot_op,
    rst_opcode,
    sbc_hl_rr,
    set_b_r,
    NoOperandOp,
    HL_INDIRECT_INDEX,
    PREFIX_CB,
    PREFIX_ED,
    PREFIX_IX,
    PREFIX_IY,
};
pub use operand::{
    AluOp,
    Condition,
    Reg16,
    Reg16Idx,
    Reg16Spec,
    Reg8,
    Reg8Idx,
    Reg8Spec,
    RotOp,
};

#[cfg(test)]
mod encoding_tests;
