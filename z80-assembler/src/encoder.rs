//! Rule-matched instruction encoding.
//!
//! Every mnemonic is registered with an allowed operand-shape set and a
//! handler. Dispatch first checks the shape set, so a wildly wrong operand
//! combination produces one diagnostic naming the mnemonic; the handler
//! then validates operand identities and emits the exact byte sequence,
//! registering fixups for immediates that cannot be evaluated yet.

mod arith;
mod bits;
mod flow;
mod io;
mod ld;
mod next;
mod stack;

use crate::{
    assembler::Assembler,
    ast::{
        Expr,
        Operand,
        Operation,
        Sign,
        UnaryOp,
    },
    diag::DiagCode,
    eval::Eval,
    fixup::FixupKind,
};

use z80_asm::no_operand_op;

bitflags::bitflags! {
    /// Coarse operand shape used by the per-mnemonic rule sets.
    pub(crate) struct Cls: u16 {
        const NONE = 1 << 0;
        const REG8 = 1 << 1;
        const REG8_IDX = 1 << 2;
        const REG8_SPEC = 1 << 3;
        const REG16 = 1 << 4;
        const REG16_IDX = 1 << 5;
        const REG16_SPEC = 1 << 6;
        const REG_INDIRECT = 1 << 7;
        const MEM_INDIRECT = 1 << 8;
        const INDEXED = 1 << 9;
        const CPORT = 1 << 10;
        const CONDITION = 1 << 11;
        const EXPR = 1 << 12;
    }
}

fn class_of(operand: Option<&Operand>) -> Cls {
    match operand {
        None => Cls::NONE,
        Some(Operand::Reg8(_)) => Cls::REG8,
        Some(Operand::Reg8Idx(_)) => Cls::REG8_IDX,
        Some(Operand::Reg8Spec(_)) => Cls::REG8_SPEC,
        Some(Operand::Reg16(_)) => Cls::REG16,
        Some(Operand::Reg16Idx(_)) => Cls::REG16_IDX,
        Some(Operand::Reg16Spec(_)) => Cls::REG16_SPEC,
        Some(Operand::RegIndirect(_)) => Cls::REG_INDIRECT,
        Some(Operand::MemIndirect(_)) => Cls::MEM_INDIRECT,
        Some(Operand::IndexedAddress { .. }) => Cls::INDEXED,
        Some(Operand::CPort) => Cls::CPORT,
        Some(Operand::Condition(_)) => Cls::CONDITION,
        Some(Operand::Expr(_)) => Cls::EXPR,
    }
}

/// The source operand shapes an 8-bit load/ALU right side can take.
const ALU_SRC: Cls = Cls::from_bits_truncate(
    Cls::REG8.bits()
        | Cls::REG8_IDX.bits()
        | Cls::REG_INDIRECT.bits()
        | Cls::INDEXED.bits()
        | Cls::EXPR.bits(),
);

/// Targets a shift/rotate/bit operation accepts.
const BIT_TARGET: Cls = Cls::from_bits_truncate(
    Cls::REG8.bits() | Cls::REG_INDIRECT.bits() | Cls::INDEXED.bits(),
);

struct MnemonicRule {
    name: &'static str,
    shapes: &'static [(Cls, Cls)],
    handler: fn(&mut Assembler, &Operation),
}

/// Sorted by `name`; dispatch binary-searches it.
static MNEMONICS: &[MnemonicRule] = &[
    MnemonicRule {
        name: "ADC",
        shapes: &[
            (Cls::REG8, ALU_SRC),
            (Cls::REG16, Cls::REG16),
            (ALU_SRC, Cls::NONE),
        ],
        handler: Assembler::encode_adc,
    },
    MnemonicRule {
        name: "ADD",
        shapes: &[
            (Cls::REG8, ALU_SRC),
            (
                Cls::from_bits_truncate(Cls::REG16.bits() | Cls::REG16_IDX.bits()),
                Cls::from_bits_truncate(
                    Cls::REG16.bits()
                        | Cls::REG16_IDX.bits()
                        | Cls::REG8.bits()
                        | Cls::EXPR.bits(),
                ),
            ),
            (ALU_SRC, Cls::NONE),
        ],
        handler: Assembler::encode_add,
    },
    MnemonicRule {
        name: "AND",
        shapes: &[(Cls::REG8, ALU_SRC), (ALU_SRC, Cls::NONE)],
        handler: Assembler::encode_alu_simple,
    },
    MnemonicRule {
        name: "BIT",
        shapes: &[(Cls::EXPR, BIT_TARGET)],
        handler: Assembler::encode_bitop,
    },
    MnemonicRule {
        name: "BRLC",
        shapes: &[(Cls::REG16, Cls::REG8)],
        handler: Assembler::encode_barrel,
    },
    MnemonicRule {
        name: "BSLA",
        shapes: &[(Cls::REG16, Cls::REG8)],
        handler: Assembler::encode_barrel,
    },
    MnemonicRule {
        name: "BSRA",
        shapes: &[(Cls::REG16, Cls::REG8)],
        handler: Assembler::encode_barrel,
    },
    MnemonicRule {
        name: "BSRF",
        shapes: &[(Cls::REG16, Cls::REG8)],
        handler: Assembler::encode_barrel,
    },
    MnemonicRule {
        name: "BSRL",
        shapes: &[(Cls::REG16, Cls::REG8)],
        handler: Assembler::encode_barrel,
    },
    MnemonicRule {
        name: "CALL",
        shapes: &[(Cls::EXPR, Cls::NONE), (Cls::CONDITION, Cls::EXPR)],
        handler: Assembler::encode_call,
    },
    MnemonicRule {
        name: "CP",
        shapes: &[(Cls::REG8, ALU_SRC), (ALU_SRC, Cls::NONE)],
        handler: Assembler::encode_alu_simple,
    },
    MnemonicRule {
        name: "DEC",
        shapes: &[(
            Cls::from_bits_truncate(
                Cls::REG8.bits()
                    | Cls::REG8_IDX.bits()
                    | Cls::REG16.bits()
                    | Cls::REG16_IDX.bits()
                    | Cls::REG_INDIRECT.bits()
                    | Cls::INDEXED.bits(),
            ),
            Cls::NONE,
        )],
        handler: Assembler::encode_dec,
    },
    MnemonicRule {
        name: "DJNZ",
        shapes: &[(Cls::EXPR, Cls::NONE)],
        handler: Assembler::encode_djnz,
    },
    MnemonicRule {
        name: "EX",
        shapes: &[
            (Cls::REG16_SPEC, Cls::REG16_SPEC),
            (Cls::REG16, Cls::REG16),
            (
                Cls::REG_INDIRECT,
                Cls::from_bits_truncate(Cls::REG16.bits() | Cls::REG16_IDX.bits()),
            ),
        ],
        handler: Assembler::encode_ex,
    },
    MnemonicRule {
        name: "IM",
        shapes: &[(Cls::EXPR, Cls::NONE)],
        handler: Assembler::encode_im,
    },
    MnemonicRule {
        name: "IN",
        shapes: &[
            (Cls::REG8, Cls::from_bits_truncate(Cls::CPORT.bits() | Cls::MEM_INDIRECT.bits())),
            (Cls::CPORT, Cls::NONE),
        ],
        handler: Assembler::encode_in,
    },
    MnemonicRule {
        name: "INC",
        shapes: &[(
            Cls::from_bits_truncate(
                Cls::REG8.bits()
                    | Cls::REG8_IDX.bits()
                    | Cls::REG16.bits()
                    | Cls::REG16_IDX.bits()
                    | Cls::REG_INDIRECT.bits()
                    | Cls::INDEXED.bits(),
            ),
            Cls::NONE,
        )],
        handler: Assembler::encode_inc,
    },
    MnemonicRule {
        name: "JP",
        shapes: &[
            (Cls::EXPR, Cls::NONE),
            (Cls::CONDITION, Cls::EXPR),
            (
                Cls::from_bits_truncate(
                    Cls::REG_INDIRECT.bits() | Cls::INDEXED.bits() | Cls::CPORT.bits(),
                ),
                Cls::NONE,
            ),
        ],
        handler: Assembler::encode_jp,
    },
    MnemonicRule {
        name: "JR",
        shapes: &[(Cls::EXPR, Cls::NONE), (Cls::CONDITION, Cls::EXPR)],
        handler: Assembler::encode_jr,
    },
    MnemonicRule {
        name: "LD",
        shapes: &[(
            Cls::from_bits_truncate(
                Cls::REG8.bits()
                    | Cls::REG8_IDX.bits()
                    | Cls::REG8_SPEC.bits()
                    | Cls::REG16.bits()
                    | Cls::REG16_IDX.bits()
                    | Cls::REG_INDIRECT.bits()
                    | Cls::MEM_INDIRECT.bits()
                    | Cls::INDEXED.bits(),
            ),
            Cls::from_bits_truncate(
                Cls::REG8.bits()
                    | Cls::REG8_IDX.bits()
                    | Cls::REG8_SPEC.bits()
                    | Cls::REG16.bits()
                    | Cls::REG16_IDX.bits()
                    | Cls::REG_INDIRECT.bits()
                    | Cls::MEM_INDIRECT.bits()
                    | Cls::INDEXED.bits()
                    | Cls::EXPR.bits(),
            ),
        )],
        handler: Assembler::encode_ld,
    },
    MnemonicRule {
        name: "MIRROR",
        shapes: &[(Cls::REG8, Cls::NONE)],
        handler: Assembler::encode_mirror,
    },
    MnemonicRule {
        name: "MUL",
        shapes: &[(Cls::REG8, Cls::REG8)],
        handler: Assembler::encode_mul,
    },
    MnemonicRule {
        name: "NEXTREG",
        shapes: &[(Cls::EXPR, Cls::from_bits_truncate(Cls::EXPR.bits() | Cls::REG8.bits()))],
        handler: Assembler::encode_nextreg,
    },
    MnemonicRule {
        name: "OR",
        shapes: &[(Cls::REG8, ALU_SRC), (ALU_SRC, Cls::NONE)],
        handler: Assembler::encode_alu_simple,
    },
    MnemonicRule {
        name: "OUT",
        shapes: &[
            (Cls::MEM_INDIRECT, Cls::REG8),
            (Cls::CPORT, Cls::from_bits_truncate(Cls::REG8.bits() | Cls::EXPR.bits())),
        ],
        handler: Assembler::encode_out,
    },
    MnemonicRule {
        name: "POP",
        shapes: &[(
            Cls::from_bits_truncate(
                Cls::REG16.bits() | Cls::REG16_IDX.bits() | Cls::REG16_SPEC.bits(),
            ),
            Cls::NONE,
        )],
        handler: Assembler::encode_pop,
    },
    MnemonicRule {
        name: "PUSH",
        shapes: &[(
            Cls::from_bits_truncate(
                Cls::REG16.bits()
                    | Cls::REG16_IDX.bits()
                    | Cls::REG16_SPEC.bits()
                    | Cls::EXPR.bits(),
            ),
            Cls::NONE,
        )],
        handler: Assembler::encode_push,
    },
    MnemonicRule {
        name: "RES",
        shapes: &[(Cls::EXPR, BIT_TARGET)],
        handler: Assembler::encode_bitop,
    },
    MnemonicRule {
        name: "RET",
        shapes: &[(Cls::NONE, Cls::NONE), (Cls::CONDITION, Cls::NONE)],
        handler: Assembler::encode_ret,
    },
    MnemonicRule {
        name: "RL",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "RLC",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "RR",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "RRC",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "RST",
        shapes: &[(Cls::EXPR, Cls::NONE)],
        handler: Assembler::encode_rst,
    },
    MnemonicRule {
        name: "SBC",
        shapes: &[
            (Cls::REG8, ALU_SRC),
            (Cls::REG16, Cls::REG16),
            (ALU_SRC, Cls::NONE),
        ],
        handler: Assembler::encode_sbc,
    },
    MnemonicRule {
        name: "SET",
        shapes: &[(Cls::EXPR, BIT_TARGET)],
        handler: Assembler::encode_bitop,
    },
    MnemonicRule {
        name: "SLA",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "SLL",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "SRA",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "SRL",
        shapes: &[(BIT_TARGET, Cls::NONE)],
        handler: Assembler::encode_rot,
    },
    MnemonicRule {
        name: "SUB",
        shapes: &[(Cls::REG8, ALU_SRC), (ALU_SRC, Cls::NONE)],
        handler: Assembler::encode_alu_simple,
    },
    MnemonicRule {
        name: "TEST",
        shapes: &[(Cls::EXPR, Cls::NONE)],
        handler: Assembler::encode_test,
    },
    MnemonicRule {
        name: "XOR",
        shapes: &[(Cls::REG8, ALU_SRC), (ALU_SRC, Cls::NONE)],
        handler: Assembler::encode_alu_simple,
    },
];

impl Assembler {
    /// Encodes one CPU operation.
    pub(crate) fn emit_operation(&mut self, op: &Operation) {
        let upper = op.mnemonic.to_ascii_uppercase();

        if let Some(simple) = no_operand_op(&upper) {
            if !op.operands.is_empty() {
                self.invalid_operands(&upper);
                return;
            }
            if simple.next_only {
                self.require_next_model(&upper);
            }
            self.emit_bytes(simple.bytes);
            return;
        }

        let rule = match MNEMONICS.binary_search_by(|r| r.name.cmp(upper.as_str())) {
            Ok(idx) => &MNEMONICS[idx],
            Err(_) => {
                self.report_token(
                    DiagCode::UnknownMnemonic,
                    format!("{upper} is not a known instruction"),
                    &op.mnemonic,
                );
                return;
            }
        };

        let first = class_of(op.operands.first());
        let second = class_of(op.operands.get(1));
        let matches = op.operands.len() <= 2
            && rule
                .shapes
                .iter()
                .any(|(a, b)| a.contains(first) && b.contains(second));
        if !matches {
            self.invalid_operands(&upper);
            return;
        }
        (rule.handler)(self, op);
    }

    /// The shared "operand combination not accepted" diagnostic.
    pub(crate) fn invalid_operands(&mut self, mnemonic: &str) {
        self.report_token(
            DiagCode::InvalidOperands,
            format!("invalid operand combination for {mnemonic}"),
            mnemonic,
        );
    }

    /// Emits the displacement byte of an `(IX±d)`/`(IY±d)` operand.
    pub(crate) fn emit_index_displacement(&mut self, sign: Sign, offset: Option<&Expr>) {
        let expr = match offset {
            None => {
                self.emit_byte(0);
                return;
            }
            Some(expr) => expr,
        };
        match self.eval(expr) {
            Eval::Valid(v) => match v.as_int() {
                Some(magnitude) => {
                    let displacement = match sign {
                        Sign::Plus => magnitude,
                        Sign::Minus => -magnitude,
                    };
                    if (-128..=127).contains(&displacement) {
                        self.emit_byte(displacement as u8);
                    } else {
                        self.report(
                            DiagCode::IndexedDisplacementOutOfRange,
                            format!("displacement {displacement} is outside -128..127"),
                        );
                        self.emit_byte(0);
                    }
                }
                None => {
                    self.report(
                        DiagCode::StringWhereNumericRequired,
                        "an index displacement must be numeric",
                    );
                    self.emit_byte(0);
                }
            },
            Eval::NonEvaluated(_) => {
                let deferred = match sign {
                    Sign::Plus => expr.clone(),
                    Sign::Minus => Expr::Unary(UnaryOp::Minus, Box::new(expr.clone())),
                };
                self.defer(FixupKind::Bit8, deferred, None, 1);
                self.emit_byte(0);
            }
            Eval::Invalid(fault) => {
                self.report(fault.code, fault.message);
                self.emit_byte(0);
            }
        }
    }
}
