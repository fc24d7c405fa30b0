//! Diagnostics: stable codes, severities and the per-run diagnostic record.
//!
//! A diagnostic never aborts the run; the assembler keeps going so the user
//! sees every problem in one pass. Emission continues with placeholder
//! bytes where a value could not be produced.

use core::fmt;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// The output is still usable.
    Warning,
    /// The output must not be consumed; the failure flag is set.
    Error,
}

/// Stable diagnostic codes.
///
/// The numeric identifiers are part of the public surface; host tooling
/// matches on them, so variants map to fixed `Z`-codes and never get
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum DiagCode {
    /// Operand combination not accepted by the mnemonic.
    InvalidOperands,
    /// The mnemonic is not part of the instruction set.
    UnknownMnemonic,
    /// The parser attached an issue to this line.
    SyntaxIssue,
    /// Bit index outside `0..=7`.
    BitIndexOutOfRange,
    /// A register-indirect operand other than `(HL)` where only `(HL)` is
    /// encodable.
    RegisterIndirectNotHl,
    /// Relative jump target outside `-128..=127`.
    RelativeJumpOutOfRange,
    /// Indexed displacement outside `-128..=127`.
    IndexedDisplacementOutOfRange,
    /// A symbol was already defined in the same scope.
    DuplicateSymbol,
    /// Emission would leave the 64K address window.
    EmissionOverflow,
    /// `SKIP` target below the current address.
    SkipTargetBelowCurrent,
    /// `ALIGN` argument outside `1..=16384`.
    AlignOutOfRange,
    /// `DEFH` pattern is not an even run of hex digits.
    InvalidHexPattern,
    /// A pragma that requires a label was written without one.
    LabelRequired,
    /// `MODEL` appeared more than once.
    ModelAlreadySet,
    /// A Next-only instruction on a non-Next model.
    NextOnlyInstruction,
    /// A symbol never received a value.
    UnresolvedSymbol,
    /// Operand types not usable by the operator or function.
    TypeMismatch,
    /// Division or modulo by zero.
    DivisionByZero,
    /// A string where a numeric value is required.
    StringWhereNumericRequired,
    /// Macro or struct name collides with an existing definition.
    MacroNameCollision,
    /// Invocation of an unknown macro or struct.
    UnknownMacroOrStruct,
    /// A `{{param}}` placeholder outside a macro body.
    MacroParamOutsideMacro,
    /// A `LOCAL` name is invalid or declared twice.
    InvalidLocalName,
    /// `BREAK`/`CONTINUE` outside a loop body.
    FlowOutsideLoop,
    /// A loop body produced more errors than the configured threshold.
    TooManyErrorsInLoop,
    /// Loop ran past the iteration limit.
    LoopLimitExceeded,
    /// `FOR` step of zero.
    ForStepZero,
    /// A macro parameter name is declared twice.
    DuplicateMacroParameter,
    /// A `{{param}}` placeholder that names no parameter of the macro.
    UnknownMacroParameter,
    /// The host line source failed to parse a macro expansion.
    MacroExpansionFailed,
    /// `INCLUDEBIN` offset outside the file.
    IncludeBinOffsetOutOfRange,
    /// `INCLUDEBIN` length reaches past the end of the file.
    IncludeBinLengthOutOfRange,
    /// `INCLUDEBIN`/`COMPAREBIN` file could not be read.
    IncludeBinNotFound,
    /// `XORG` after bytes were emitted into the segment.
    XorgAfterEmission,
    /// Assignment to a field the struct does not declare.
    UnknownStructField,
    /// A field assignment outside a struct invocation.
    FieldOutsideStructInvocation,
    /// Struct invocation reaches past the emission window.
    StructSizeOverflow,
    /// A struct body line that is not a data pragma.
    InvalidStructBody,
    /// A block statement without its matching end.
    MissingBlockEnd,
    /// The `ERROR` pragma.
    UserError,
}

impl DiagCode {
    /// The stable `Z`-code identifier.
    pub const fn code(self) -> &'static str {
        match self {
            DiagCode::InvalidOperands => "Z0001",
            DiagCode::BitIndexOutOfRange => "Z0002",
            DiagCode::RegisterIndirectNotHl => "Z0004",
            DiagCode::UnknownMnemonic => "Z0010",
            DiagCode::SyntaxIssue => "Z0011",
            DiagCode::RelativeJumpOutOfRange => "Z0022",
            DiagCode::IndexedDisplacementOutOfRange => "Z0023",
            DiagCode::DuplicateSymbol => "Z0040",
            DiagCode::EmissionOverflow => "Z0080",
            DiagCode::SkipTargetBelowCurrent => "Z0081",
            DiagCode::AlignOutOfRange => "Z0082",
            DiagCode::InvalidHexPattern => "Z0083",
            DiagCode::LabelRequired => "Z0086",
            DiagCode::ModelAlreadySet => "Z0088",
            DiagCode::NextOnlyInstruction => "Z0102",
            DiagCode::UnresolvedSymbol => "Z0201",
            DiagCode::TypeMismatch => "Z0303",
            DiagCode::DivisionByZero => "Z0304",
            DiagCode::StringWhereNumericRequired => "Z0305",
            DiagCode::MacroNameCollision => "Z0402",
            DiagCode::UnknownMacroOrStruct => "Z0404",
            DiagCode::MacroParamOutsideMacro => "Z0405",
            DiagCode::InvalidLocalName => "Z0406",
            DiagCode::FlowOutsideLoop => "Z0407",
            DiagCode::TooManyErrorsInLoop => "Z0408",
            DiagCode::LoopLimitExceeded => "Z0409",
            DiagCode::ForStepZero => "Z0413",
            DiagCode::DuplicateMacroParameter => "Z0417",
            DiagCode::UnknownMacroParameter => "Z0418",
            DiagCode::MacroExpansionFailed => "Z0419",
            DiagCode::IncludeBinOffsetOutOfRange => "Z0424",
            DiagCode::IncludeBinLengthOutOfRange => "Z0425",
            DiagCode::IncludeBinNotFound => "Z0426",
            DiagCode::XorgAfterEmission => "Z0431",
            DiagCode::UnknownStructField => "Z0440",
            DiagCode::FieldOutsideStructInvocation => "Z0441",
            DiagCode::StructSizeOverflow => "Z0442",
            DiagCode::InvalidStructBody => "Z0443",
            DiagCode::MissingBlockEnd => "Z0450",
            DiagCode::UserError => "Z0500",
        }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single problem found while assembling.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Stable code.
    pub code: DiagCode,
    /// Human-readable message.
    pub message: String,
    /// Index of the source file.
    pub file: usize,
    /// 1-based source line.
    pub line: u32,
    /// 0-based column, when known.
    pub column: u32,
    /// The offending token text, when known.
    pub token: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} {}: {}",
            self.file,
            self.line,
            match self.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
            },
            self.code,
            self.message
        )
    }
}

/// Failure of the host line source during macro expansion.
#[derive(Debug, thiserror::Error)]
pub enum ExpansionError {
    /// No line source was attached to the assembler instance.
    #[error("no line source is attached; macro bodies cannot be re-parsed")]
    Unavailable,
    /// The host parser rejected the substituted text.
    #[error("macro expansion failed to parse: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn codes_are_unique_and_well_formed() {
        let mut seen = std::collections::HashSet::new();
        for code in DiagCode::iter() {
            let text = code.code();
            assert!(text.starts_with('Z'), "{text}");
            assert_eq!(text.len(), 5, "{text}");
            assert!(text[1..].chars().all(|c| c.is_ascii_digit()), "{text}");
            assert!(seen.insert(text), "duplicate code {text}");
        }
    }
}
