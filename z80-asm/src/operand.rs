//! Register, condition and operation-group enums with their encoding
//! indices.
//!
//! Discriminants are the bit patterns the opcode families expect, so an
//! `as u8` cast (via [`Reg8::index`] and friends) is the encoding.

use crate::opcode::{PREFIX_IX, PREFIX_IY};

/// General-purpose 8-bit registers.
///
/// The discriminant is the 3-bit register index used across the `LD r,r'`,
/// `INC r`, ALU and `CB`-prefixed families. Index `6` is the `(HL)` slot
/// and intentionally has no variant here; memory forms are separate
/// operand shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Reg8 {
    /// `B`
    B = 0,
    /// `C`
    C = 1,
    /// `D`
    D = 2,
    /// `E`
    E = 3,
    /// `H`
    H = 4,
    /// `L`
    L = 5,
    /// `A`
    A = 7,
}

impl Reg8 {
    /// The 3-bit encoding index.
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Whether the register is `H` or `L`.
    ///
    /// These two cannot be paired with an indexed half (`XH`/`XL`/`YH`/`YL`)
    /// in the same instruction.
    pub const fn is_hl_half(self) -> bool {
        matches!(self, Reg8::H | Reg8::L)
    }
}

/// Halves of the index registers (`XH`/`XL`/`YH`/`YL`).
///
/// Under a `DD`/`FD` prefix they occupy the `H`/`L` encoding slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reg8Idx {
    /// High half of `IX`.
    XH,
    /// Low half of `IX`.
    XL,
    /// High half of `IY`.
    YH,
    /// Low half of `IY`.
    YL,
}

impl Reg8Idx {
    /// The 3-bit encoding index (the `H` or `L` slot).
    pub const fn index(self) -> u8 {
        match self {
            Reg8Idx::XH | Reg8Idx::YH => 4,
            Reg8Idx::XL | Reg8Idx::YL => 5,
        }
    }

    /// The index-register prefix byte selecting `IX` or `IY`.
    pub const fn prefix(self) -> u8 {
        match self {
            Reg8Idx::XH | Reg8Idx::XL => PREFIX_IX,
            Reg8Idx::YH | Reg8Idx::YL => PREFIX_IY,
        }
    }
}

/// The special-purpose 8-bit registers `I` and `R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reg8Spec {
    /// Interrupt vector base.
    I,
    /// Memory refresh counter.
    R,
}

/// 16-bit register pairs with the `SP` slot.
///
/// The discriminant is the 2-bit index of the `ADD HL,rr` / `INC rr` /
/// `LD rr,nn` families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Reg16 {
    /// `BC`
    BC = 0,
    /// `DE`
    DE = 1,
    /// `HL`
    HL = 2,
    /// `SP`
    SP = 3,
}

impl Reg16 {
    /// The 2-bit encoding index.
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// The index registers `IX` and `IY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reg16Idx {
    /// `IX`
    IX,
    /// `IY`
    IY,
}

impl Reg16Idx {
    /// The prefix byte (`DD` for `IX`, `FD` for `IY`).
    pub const fn prefix(self) -> u8 {
        match self {
            Reg16Idx::IX => PREFIX_IX,
            Reg16Idx::IY => PREFIX_IY,
        }
    }
}

/// The `AF` pair and its shadow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reg16Spec {
    /// `AF`
    AF,
    /// `AF'`
    #[strum(serialize = "AF'")]
    AFAlt,
}

/// Jump/call/return conditions.
///
/// The discriminant is the 3-bit condition index of the `JP cc,nn`,
/// `CALL cc,nn` and `RET cc` families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Condition {
    /// Zero flag clear.
    NZ = 0,
    /// Zero flag set.
    Z = 1,
    /// Carry flag clear.
    NC = 2,
    /// Carry flag set.
    C = 3,
    /// Parity odd.
    PO = 4,
    /// Parity even.
    PE = 5,
    /// Sign positive.
    P = 6,
    /// Sign negative.
    M = 7,
}

impl Condition {
    /// The 3-bit encoding index.
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Opcode of the conditional relative jump, when the condition has one.
    ///
    /// Only `NZ`, `Z`, `NC` and `C` exist in `JR` form.
    pub const fn jr_opcode(self) -> Option<u8> {
        match self {
            Condition::NZ => Some(0x20),
            Condition::Z => Some(0x28),
            Condition::NC => Some(0x30),
            Condition::C => Some(0x38),
            _ => None,
        }
    }
}

/// The eight ALU operation slots of the `0x80 + (alu << 3) + r` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AluOp {
    /// `ADD`
    Add = 0,
    /// `ADC`
    Adc = 1,
    /// `SUB`
    Sub = 2,
    /// `SBC`
    Sbc = 3,
    /// `AND`
    And = 4,
    /// `XOR`
    Xor = 5,
    /// `OR`
    Or = 6,
    /// `CP`
    Cp = 7,
}

impl AluOp {
    /// The 3-bit encoding index.
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Maps a mnemonic to its ALU slot.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let op = match mnemonic.to_ascii_uppercase().as_str() {
            "ADD" => AluOp::Add,
            "ADC" => AluOp::Adc,
            "SUB" => AluOp::Sub,
            "SBC" => AluOp::Sbc,
            "AND" => AluOp::And,
            "XOR" => AluOp::Xor,
            "OR" => AluOp::Or,
            "CP" => AluOp::Cp,
            _ => return None,
        };
        Some(op)
    }
}

/// The eight shift/rotate slots of the `CB` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RotOp {
    /// `RLC`
    Rlc = 0,
    /// `RRC`
    Rrc = 1,
    /// `RL`
    Rl = 2,
    /// `RR`
    Rr = 3,
    /// `SLA`
    Sla = 4,
    /// `SRA`
    Sra = 5,
    /// `SLL` (undocumented shift-left-set-one)
    Sll = 6,
    /// `SRL`
    Srl = 7,
}

impl RotOp {
    /// The 3-bit encoding index.
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Maps a mnemonic to its shift/rotate slot.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let op = match mnemonic.to_ascii_uppercase().as_str() {
            "RLC" => RotOp::Rlc,
            "RRC" => RotOp::Rrc,
            "RL" => RotOp::Rl,
            "RR" => RotOp::Rr,
            "SLA" => RotOp::Sla,
            "SRA" => RotOp::Sra,
            "SLL" => RotOp::Sll,
            "SRL" => RotOp::Srl,
            _ => return None,
        };
        Some(op)
    }
}
