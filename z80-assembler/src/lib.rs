//! Multi-pass assembler engine for the Z80 and the ZX Spectrum Next.
//!
//! The engine consumes parsed source lines (the lexer/parser is an
//! external collaborator, see [`ast`]) and produces address-mapped binary
//! segments, per-module symbol tables, a listing with per-line byte
//! ranges, a bidirectional source map and a structured diagnostic list.
//!
//! ```
//! use z80_assembler::{
//!     ast::{Operation, Payload, SourceLine},
//!     Assembler, AssemblerOptions,
//! };
//!
//! let nop = SourceLine::new(0, 1, Payload::Operation(Operation {
//!     mnemonic: "nop".into(),
//!     operands: Vec::new(),
//! }));
//! let out = Assembler::new(AssemblerOptions::default()).assemble(vec![nop]);
//! assert_eq!(out.segments[0].emitted, vec![0x00]);
//! assert_eq!(out.segments[0].start_address, 0x8000);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod ast;
mod assembler;
mod diag;
mod driver;
mod encoder;
mod eval;
mod fixup;
mod output;
mod pragma;
mod segment;
mod symbols;
mod value;

pub use assembler::{
    Assembler,
    AssemblerOptions,
};
pub use diag::{
    DiagCode,
    Diagnostic,
    ExpansionError,
    Severity,
};
pub use eval::{
    Eval,
    EvalContext,
    EvalFault,
    Lookup,
};
pub use fixup::{
    Fixup,
    FixupKind,
};
pub use output::{
    Assembly,
    CompareBinRequest,
    ListingItem,
    ModuleSymbols,
    SourceMap,
};
pub use segment::{
    Segment,
    SegmentOverflow,
};
pub use symbols::{
    LocalScope,
    MacroDef,
    ScopeFlags,
    StructDef,
    StructField,
    Symbol,
    SymbolKind,
    SymbolRegistry,
};
pub use value::Value;

// Re-export the instruction-set primitives for hosts that build operands.
#[doc(no_inline)]
pub use z80_asm;
