//! Prefix bytes, the no-operand opcode table and the `const fn` encoders
//! for the parameterised opcode families.
//!
//! Register and condition arguments are the 3-bit (or 2-bit) encoding
//! indices from the operand enums; inputs are masked to their field width
//! so every function is total.

/// `CB` prefix: shift/rotate and bit operations.
pub const PREFIX_CB: u8 = 0xCB;
/// `ED` prefix: extended operations.
pub const PREFIX_ED: u8 = 0xED;
/// `DD` prefix: `IX` forms.
pub const PREFIX_IX: u8 = 0xDD;
/// `FD` prefix: `IY` forms.
pub const PREFIX_IY: u8 = 0xFD;

/// The register-field index occupied by the `(HL)` memory form.
pub const HL_INDIRECT_INDEX: u8 = 6;

/// A no-operand instruction: its exact byte sequence and whether it is
/// restricted to the Spectrum Next model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoOperandOp {
    /// The emitted bytes.
    pub bytes: &'static [u8],
    /// `true` for Z80N extended operations.
    pub next_only: bool,
}

const fn base(bytes: &'static [u8]) -> NoOperandOp {
    NoOperandOp {
        bytes,
        next_only: false,
    }
}

const fn next(bytes: &'static [u8]) -> NoOperandOp {
    NoOperandOp {
        bytes,
        next_only: true,
    }
}

/// Looks up a no-operand instruction by mnemonic, case-insensitively.
pub fn no_operand_op(mnemonic: &str) -> Option<NoOperandOp> {
    let op = match mnemonic.to_ascii_uppercase().as_str() {
        "NOP" => base(&[0x00]),
        "RLCA" => base(&[0x07]),
        "RRCA" => base(&[0x0F]),
        "RLA" => base(&[0x17]),
        "RRA" => base(&[0x1F]),
        "DAA" => base(&[0x27]),
        "CPL" => base(&[0x2F]),
        "SCF" => base(&[0x37]),
        "CCF" => base(&[0x3F]),
        "HALT" => base(&[0x76]),
        "EXX" => base(&[0xD9]),
        "DI" => base(&[0xF3]),
        "EI" => base(&[0xFB]),
        "NEG" => base(&[PREFIX_ED, 0x44]),
        "RETN" => base(&[PREFIX_ED, 0x45]),
        "RETI" => base(&[PREFIX_ED, 0x4D]),
        "RRD" => base(&[PREFIX_ED, 0x67]),
        "RLD" => base(&[PREFIX_ED, 0x6F]),
        "LDI" => base(&[PREFIX_ED, 0xA0]),
        "CPI" => base(&[PREFIX_ED, 0xA1]),
        "INI" => base(&[PREFIX_ED, 0xA2]),
        "OUTI" => base(&[PREFIX_ED, 0xA3]),
        "LDD" => base(&[PREFIX_ED, 0xA8]),
        "CPD" => base(&[PREFIX_ED, 0xA9]),
        "IND" => base(&[PREFIX_ED, 0xAA]),
        "OUTD" => base(&[PREFIX_ED, 0xAB]),
        "LDIR" => base(&[PREFIX_ED, 0xB0]),
        "CPIR" => base(&[PREFIX_ED, 0xB1]),
        "INIR" => base(&[PREFIX_ED, 0xB2]),
        "OTIR" => base(&[PREFIX_ED, 0xB3]),
        "LDDR" => base(&[PREFIX_ED, 0xB8]),
        "CPDR" => base(&[PREFIX_ED, 0xB9]),
        "INDR" => base(&[PREFIX_ED, 0xBA]),
        "OTDR" => base(&[PREFIX_ED, 0xBB]),
        // Z80N extended set
        "SWAPNIB" => next(&[PREFIX_ED, 0x23]),
        "OUTINB" => next(&[PREFIX_ED, 0x90]),
        "PIXELDN" => next(&[PREFIX_ED, 0x93]),
        "PIXELAD" => next(&[PREFIX_ED, 0x94]),
        "SETAE" => next(&[PREFIX_ED, 0x95]),
        "LDIX" => next(&[PREFIX_ED, 0xA4]),
        "LDWS" => next(&[PREFIX_ED, 0xA5]),
        "LDDX" => next(&[PREFIX_ED, 0xAC]),
        "LDIRX" => next(&[PREFIX_ED, 0xB4]),
        "LDIRSCALE" => next(&[PREFIX_ED, 0xB6]),
        "LDPIRX" => next(&[PREFIX_ED, 0xB7]),
        "LDDRX" => next(&[PREFIX_ED, 0xBC]),
        _ => return None,
    };
    Some(op)
}

/// `LD r,r'`: `0x40 + (dest << 3) + src`.
///
/// Index `6` in either field selects the `(HL)` memory form.
pub const fn ld_r_r(dest: u8, src: u8) -> u8 {
    0x40 + ((dest & 0x07) << 3) + (src & 0x07)
}

/// `LD r,n`: `0x06 + (dest << 3)`, followed by the immediate.
pub const fn ld_r_n(dest: u8) -> u8 {
    0x06 + ((dest & 0x07) << 3)
}

/// `LD rr,nn`: `0x01 + (rr << 4)`, followed by the little-endian word.
pub const fn ld_rr_nn(rr: u8) -> u8 {
    0x01 + ((rr & 0x03) << 4)
}

/// `INC r`: `0x04 + (r << 3)`.
pub const fn inc_r(r: u8) -> u8 {
    0x04 + ((r & 0x07) << 3)
}

/// `DEC r`: `0x05 + (r << 3)`.
pub const fn dec_r(r: u8) -> u8 {
    0x05 + ((r & 0x07) << 3)
}

/// `INC rr`: `0x03 + (rr << 4)`.
pub const fn inc_rr(rr: u8) -> u8 {
    0x03 + ((rr & 0x03) << 4)
}

/// `DEC rr`: `0x0B + (rr << 4)`.
pub const fn dec_rr(rr: u8) -> u8 {
    0x0B + ((rr & 0x03) << 4)
}

/// `ADD HL,rr`: `0x09 + (rr << 4)`.
pub const fn add_hl_rr(rr: u8) -> u8 {
    0x09 + ((rr & 0x03) << 4)
}

/// `ADC HL,rr`: `0x4A + (rr << 4)`, after an `ED` prefix.
pub const fn adc_hl_rr(rr: u8) -> u8 {
    0x4A + ((rr & 0x03) << 4)
}

/// `SBC HL,rr`: `0x42 + (rr << 4)`, after an `ED` prefix.
pub const fn sbc_hl_rr(rr: u8) -> u8 {
    0x42 + ((rr & 0x03) << 4)
}

/// `PUSH qq`: `0xC5 + (qq << 4)`; the `SP` slot carries `AF`.
pub const fn push_rr(rr: u8) -> u8 {
    0xC5 + ((rr & 0x03) << 4)
}

/// `POP qq`: `0xC1 + (qq << 4)`; the `SP` slot carries `AF`.
pub const fn pop_rr(rr: u8) -> u8 {
    0xC1 + ((rr & 0x03) << 4)
}

/// ALU operation on a register: `0x80 + (alu << 3) + r`.
pub const fn alu_a_r(alu: u8, r: u8) -> u8 {
    0x80 + ((alu & 0x07) << 3) + (r & 0x07)
}

/// ALU operation on an immediate: `0xC6 + (alu << 3)`, followed by the
/// immediate.
pub const fn alu_a_n(alu: u8) -> u8 {
    0xC6 + ((alu & 0x07) << 3)
}

/// `JP cc,nn`: `0xC2 + (cc << 3)`, followed by the little-endian address.
pub const fn jp_cc(cc: u8) -> u8 {
    0xC2 + ((cc & 0x07) << 3)
}

/// `CALL cc,nn`: `0xC4 + (cc << 3)`, followed by the little-endian address.
pub const fn call_cc(cc: u8) -> u8 {
    0xC4 + ((cc & 0x07) << 3)
}

/// `RET cc`: `0xC0 + (cc << 3)`.
pub const fn ret_cc(cc: u8) -> u8 {
    0xC0 + ((cc & 0x07) << 3)
}

/// `RST n` for `n` in `{0, 8, 0x10, .., 0x38}`: `0xC7 + n`.
///
/// Returns `None` when the target is not one of the eight restart vectors.
pub const fn rst_opcode(target: u8) -> Option<u8> {
    if (target & !0x38) != 0 {
        return None;
    }
    Some(0xC7 + target)
}

/// Shift/rotate on a register: `(rot << 3) + r`, after a `CB` prefix.
pub const fn rot_op(rot: u8, r: u8) -> u8 {
    ((rot & 0x07) << 3) + (r & 0x07)
}

/// `BIT b,r`: `0x40 + (b << 3) + r`, after a `CB` prefix.
pub const fn bit_b_r(bit: u8, r: u8) -> u8 {
    0x40 + ((bit & 0x07) << 3) + (r & 0x07)
}

/// `RES b,r`: `0x80 + (b << 3) + r`, after a `CB` prefix.
pub const fn res_b_r(bit: u8, r: u8) -> u8 {
    0x80 + ((bit & 0x07) << 3) + (r & 0x07)
}

/// `SET b,r`: `0xC0 + (b << 3) + r`, after a `CB` prefix.
pub const fn set_b_r(bit: u8, r: u8) -> u8 {
    0xC0 + ((bit & 0x07) << 3) + (r & 0x07)
}

/// `IN r,(C)`: `0x40 + (r << 3)`, after an `ED` prefix.
pub const fn in_r_c(r: u8) -> u8 {
    0x40 + ((r & 0x07) << 3)
}

/// `OUT (C),r`: `0x41 + (r << 3)`, after an `ED` prefix.
pub const fn out_c_r(r: u8) -> u8 {
    0x41 + ((r & 0x07) << 3)
}

/// `IM 0/1/2`: the `ED`-suffixed mode byte.
pub const fn im_opcode(mode: u8) -> Option<u8> {
    match mode {
        0 => Some(0x46),
        1 => Some(0x56),
        2 => Some(0x5E),
        _ => None,
    }
}
