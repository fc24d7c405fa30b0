//! Deferred expression resolutions: the fixup log and its fixed-point
//! resolution passes.
//!
//! A fixup is recorded whenever an expression references a symbol that is
//! not defined yet. The log attaches to the scope that was innermost at
//! creation; on scope exit a resolution pass runs and whatever is still
//! unresolved propagates outward, until the global finalisation pass turns
//! the leftovers into diagnostics.

use crate::{
    assembler::{
        Assembler,
        FixupEvalCx,
    },
    ast::Expr,
    diag::DiagCode,
    eval::{
        evaluate,
        Eval,
    },
    symbols::{
        Symbol,
        SymbolKind,
    },
};

/// The patch shape of a fixup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupKind {
    /// A single byte; the low byte of the value is taken.
    Bit8,
    /// A little-endian word.
    Bit16,
    /// A PC-relative jump displacement.
    Jr,
    /// Bind a symbol once the expression resolves.
    Equ,
    /// Set the program entry pointer.
    Ent,
    /// Set the exported entry pointer.
    Xent,
    /// Overlay bytes onto a struct invocation's default pattern.
    Struct,
}

/// A deferred patch against a segment position.
#[derive(Debug, Clone)]
pub struct Fixup {
    /// Patch shape.
    pub kind: FixupKind,
    /// Target segment index.
    pub segment: usize,
    /// Physical offset within the segment.
    pub offset: usize,
    /// Patch width in bytes (used by `Struct`).
    pub width: usize,
    /// The expression to resolve.
    pub expr: Expr,
    /// Symbol to bind (`Equ` only).
    pub label: Option<String>,
    /// Module the fixup was created in; `Equ` binds there.
    pub module: usize,
    /// Logical address for `$` at creation time.
    pub at_address: u16,
    /// Instruction start address (`Jr` displacement base, `$$`).
    pub instruction_address: u16,
    /// Source file of the owning line.
    pub file: usize,
    /// Source line number.
    pub line: u32,
}

enum Outcome {
    Applied,
    Deferred(String),
}

impl Assembler {
    /// Runs resolution passes over `list` until a full pass makes no
    /// progress. Returns the still-unresolved fixups; with `final_pass`
    /// set, those become diagnostics instead and the return is empty.
    pub(crate) fn resolve_fixup_list(
        &mut self,
        list: Vec<Fixup>,
        final_pass: bool,
    ) -> Vec<Fixup> {
        let mut pending = list;
        loop {
            if pending.is_empty() {
                break;
            }
            let mut next = Vec::new();
            let mut progress = false;
            for fixup in pending {
                match self.try_resolve(&fixup) {
                    Outcome::Applied => progress = true,
                    Outcome::Deferred(_) => next.push(fixup),
                }
            }
            pending = next;
            if !progress {
                break;
            }
        }

        if !final_pass {
            return pending;
        }
        for fixup in pending {
            let missing = match self.try_resolve(&fixup) {
                Outcome::Applied => continue,
                Outcome::Deferred(name) => name,
            };
            let target = fixup
                .label
                .clone()
                .unwrap_or_else(|| missing.clone());
            self.report_at(
                DiagCode::UnresolvedSymbol,
                format!("cannot resolve {missing} needed by {target}"),
                fixup.file,
                fixup.line,
            );
        }
        Vec::new()
    }

    fn try_resolve(&mut self, fixup: &Fixup) -> Outcome {
        let mut cx = FixupEvalCx {
            at: fixup.at_address,
            instruction: fixup.instruction_address,
            asm: &mut *self,
        };
        let value = match evaluate(&fixup.expr, &mut cx) {
            Eval::Valid(v) => v,
            Eval::NonEvaluated(name) => return Outcome::Deferred(name),
            Eval::Invalid(fault) => {
                self.report_at(fault.code, fault.message, fixup.file, fixup.line);
                return Outcome::Applied;
            }
        };

        match fixup.kind {
            FixupKind::Bit8 => match value.as_byte() {
                Some(byte) => self.segments[fixup.segment].patch(fixup.offset, &[byte]),
                None => self.report_numeric_needed(fixup),
            },
            FixupKind::Bit16 => match value.as_word() {
                Some(word) => self.segments[fixup.segment]
                    .patch(fixup.offset, &word.to_le_bytes()),
                None => self.report_numeric_needed(fixup),
            },
            FixupKind::Jr => match value.as_word() {
                Some(target) => {
                    let displacement = i32::from(target)
                        - (i32::from(fixup.instruction_address) + 2);
                    if !(-128..=127).contains(&displacement) {
                        self.report_at(
                            DiagCode::RelativeJumpOutOfRange,
                            format!(
                                "relative jump of {displacement} is outside -128..127"
                            ),
                            fixup.file,
                            fixup.line,
                        );
                    } else {
                        self.segments[fixup.segment]
                            .patch(fixup.offset, &[displacement as u8]);
                    }
                }
                None => self.report_numeric_needed(fixup),
            },
            FixupKind::Equ => {
                let label = fixup.label.clone().unwrap_or_default();
                let symbol = Symbol {
                    name: label.clone(),
                    value,
                    kind: SymbolKind::Label,
                    usages: 0,
                    file: fixup.file,
                    line: fixup.line,
                };
                if self
                    .registry
                    .define_in_module(fixup.module, &label, symbol)
                    .is_err()
                {
                    self.report_at(
                        DiagCode::DuplicateSymbol,
                        format!("{label} is already defined"),
                        fixup.file,
                        fixup.line,
                    );
                }
            }
            FixupKind::Ent => match value.as_word() {
                Some(word) => self.entry = Some(word),
                None => self.report_numeric_needed(fixup),
            },
            FixupKind::Xent => match value.as_word() {
                Some(word) => self.export_entry = Some(word),
                None => self.report_numeric_needed(fixup),
            },
            FixupKind::Struct => match value.as_int() {
                Some(int) => {
                    let bytes: Vec<u8> = (0..fixup.width)
                        .map(|i| (int >> (8 * i)) as u8)
                        .collect();
                    self.segments[fixup.segment].patch(fixup.offset, &bytes);
                }
                None => self.report_numeric_needed(fixup),
            },
        }
        Outcome::Applied
    }

    fn report_numeric_needed(&mut self, fixup: &Fixup) {
        self.report_at(
            DiagCode::StringWhereNumericRequired,
            "a numeric value is required here",
            fixup.file,
            fixup.line,
        );
    }
}
