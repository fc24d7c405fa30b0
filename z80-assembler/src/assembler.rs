//! The assembler instance: owned state, emission helpers and the public
//! entry point.
//!
//! A single instance owns every piece of mutable state (segments, module
//! tree, fixup log, diagnostics, RNG); concurrent assembles are separate
//! instances. One instance performs one run.

use crate::{
    ast::{
        Expr,
        LineSource,
        NoExpansion,
        SourceLine,
        SymbolRef,
    },
    diag::{
        DiagCode,
        Diagnostic,
        Severity,
    },
    eval::{
        evaluate,
        Eval,
        EvalContext,
        Lookup,
    },
    fixup::{
        Fixup,
        FixupKind,
    },
    output::{
        Assembly,
        CompareBinRequest,
        ListingItem,
        ModuleSymbols,
        SourceMap,
    },
    segment::Segment,
    symbols::{
        Symbol,
        SymbolKind,
        SymbolRegistry,
    },
    value::Value,
};

use rand::{
    rngs::StdRng,
    Rng,
    SeedableRng,
};
use std::path::PathBuf;
use tracing::debug;
use z80_asm::Model;

/// Host-configurable knobs of an assemble run.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    /// Base address of the first segment when no `ORG` precedes emission.
    pub default_start_address: u16,
    /// Model assumed until a `MODEL` pragma appears.
    pub default_model: Model,
    /// Errors tolerated inside one loop construct before it aborts.
    pub loop_error_limit: u32,
    /// Hard cap on loop iterations.
    pub max_loop_iterations: u32,
    /// File-index to path mapping; base for `INCLUDEBIN`/`COMPAREBIN`
    /// relative paths.
    pub source_files: Vec<PathBuf>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        AssemblerOptions {
            default_start_address: 0x8000,
            default_model: Model::Spectrum48,
            loop_error_limit: 16,
            max_loop_iterations: 0xFFFF,
            source_files: Vec::new(),
        }
    }
}

/// A single-use assembler instance.
pub struct Assembler {
    pub(crate) options: AssemblerOptions,
    pub(crate) line_source: Box<dyn LineSource>,
    pub(crate) lines: Vec<SourceLine>,
    pub(crate) registry: SymbolRegistry,
    pub(crate) segments: Vec<Segment>,
    pub(crate) current_segment: Option<usize>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) model: Option<Model>,
    pub(crate) rng: StdRng,
    pub(crate) entry: Option<u16>,
    pub(crate) export_entry: Option<u16>,
    pub(crate) trace: Vec<String>,
    pub(crate) compare_requests: Vec<CompareBinRequest>,
    pub(crate) listing: Vec<ListingItem>,
    pub(crate) source_map: SourceMap,
    pub(crate) pending_label: Option<String>,
    pub(crate) cur_file: usize,
    pub(crate) cur_line: u32,
    pub(crate) flow_break: bool,
    pub(crate) flow_continue: bool,
    overflow_reported: bool,
}

impl Assembler {
    /// An instance without a macro re-parsing hook.
    pub fn new(options: AssemblerOptions) -> Self {
        Self::with_line_source(options, Box::new(NoExpansion))
    }

    /// An instance using `line_source` to re-parse macro expansions.
    pub fn with_line_source(
        options: AssemblerOptions,
        line_source: Box<dyn LineSource>,
    ) -> Self {
        Assembler {
            options,
            line_source,
            lines: Vec::new(),
            registry: SymbolRegistry::new(),
            segments: Vec::new(),
            current_segment: None,
            diagnostics: Vec::new(),
            model: None,
            rng: StdRng::from_entropy(),
            entry: None,
            export_entry: None,
            trace: Vec::new(),
            compare_requests: Vec::new(),
            listing: Vec::new(),
            source_map: SourceMap::default(),
            pending_label: None,
            cur_file: 0,
            cur_line: 0,
            flow_break: false,
            flow_continue: false,
            overflow_reported: false,
        }
    }

    /// Assembles the parsed lines and returns every produced artifact.
    pub fn assemble(mut self, lines: Vec<SourceLine>) -> Assembly {
        let span = tracing::debug_span!("assemble", lines = lines.len());
        let _enter = span.enter();

        self.lines = lines;
        self.run();
        self.finalize()
    }

    fn finalize(mut self) -> Assembly {
        // Safety net: a diagnostic-terminated body may leave scopes or
        // modules open; every exit path still pops them.
        while self.registry.in_scope() {
            self.close_scope();
        }
        while self.registry.current_module() != 0 {
            self.close_module();
        }

        let fixups = self.registry.take_module_fixups(0);
        debug!(pending = fixups.len(), "global fixup resolution");
        self.resolve_fixup_list(fixups, true);

        let failed = self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error);
        let modules = self
            .registry
            .snapshot()
            .into_iter()
            .map(|(path, symbols)| ModuleSymbols { path, symbols })
            .collect();

        Assembly {
            segments: self.segments,
            modules,
            listing: self.listing,
            source_map: self.source_map,
            diagnostics: self.diagnostics,
            entry: self.entry,
            export_entry: self.export_entry,
            trace: self.trace,
            compare_requests: self.compare_requests,
            failed,
        }
    }

    // ---- diagnostics ----------------------------------------------------

    pub(crate) fn report_at(
        &mut self,
        code: DiagCode,
        message: impl Into<String>,
        file: usize,
        line: u32,
    ) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            file,
            line,
            column: 0,
            token: String::new(),
        });
    }

    /// Reports an error at the line currently being executed.
    pub(crate) fn report(&mut self, code: DiagCode, message: impl Into<String>) {
        self.report_at(code, message, self.cur_file, self.cur_line);
    }

    /// Reports an error carrying the offending token text.
    pub(crate) fn report_token(
        &mut self,
        code: DiagCode,
        message: impl Into<String>,
        token: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            file: self.cur_file,
            line: self.cur_line,
            column: 0,
            token: token.into(),
        });
    }

    pub(crate) fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    // ---- segments and emission ------------------------------------------

    /// The current segment, created on first use.
    pub(crate) fn seg_mut(&mut self) -> &mut Segment {
        if self.current_segment.is_none() {
            let start = self.options.default_start_address;
            debug!("segment created at {start:#06x}");
            self.segments.push(Segment::new(start));
            self.current_segment = Some(self.segments.len() - 1);
            self.overflow_reported = false;
        }
        let idx = self.current_segment.expect("just ensured");
        &mut self.segments[idx]
    }

    /// Starts a fresh segment based at `start`.
    pub(crate) fn open_segment(&mut self, start: u16) {
        debug!("segment opened at {start:#06x}");
        self.segments.push(Segment::new(start));
        self.current_segment = Some(self.segments.len() - 1);
        self.overflow_reported = false;
    }

    pub(crate) fn logical_address(&self) -> u16 {
        match self.current_segment {
            Some(idx) => self.segments[idx].logical_address(),
            None => self.options.default_start_address,
        }
    }

    pub(crate) fn instruction_address(&self) -> u16 {
        match self.current_segment {
            Some(idx) => self.segments[idx].instruction_address(),
            None => self.options.default_start_address,
        }
    }

    /// Latches `$$` at the start of each pragma or operation.
    pub(crate) fn mark_instruction(&mut self) {
        if let Some(idx) = self.current_segment {
            self.segments[idx].mark_instruction();
        }
    }

    pub(crate) fn emit_byte(&mut self, byte: u8) {
        if self.seg_mut().emit_byte(byte).is_err() && !self.overflow_reported {
            self.overflow_reported = true;
            self.report(
                DiagCode::EmissionOverflow,
                "emission reached past the top of the 64K address space",
            );
        }
    }

    pub(crate) fn emit_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.emit_byte(*byte);
        }
    }

    pub(crate) fn emit_word(&mut self, word: u16) {
        self.emit_byte(word as u8);
        self.emit_byte((word >> 8) as u8);
    }

    // ---- evaluation -----------------------------------------------------

    pub(crate) fn eval(&mut self, expr: &Expr) -> Eval {
        evaluate(expr, self)
    }

    /// Evaluates an expression that must have a value right now; deferral
    /// is not acceptable. `None` means a diagnostic was recorded.
    pub(crate) fn eval_immediate(&mut self, expr: &Expr, what: &str) -> Option<Value> {
        match self.eval(expr) {
            Eval::Valid(v) => Some(v),
            Eval::NonEvaluated(name) => {
                self.report_token(
                    DiagCode::UnresolvedSymbol,
                    format!("{what} must be known at this point; {name} is undefined"),
                    name.clone(),
                );
                None
            }
            Eval::Invalid(fault) => {
                self.report(fault.code, fault.message);
                None
            }
        }
    }

    /// Like [`Self::eval_immediate`], additionally rejecting strings.
    pub(crate) fn eval_immediate_int(&mut self, expr: &Expr, what: &str) -> Option<i64> {
        let value = self.eval_immediate(expr, what)?;
        match value.as_int() {
            Some(i) => Some(i),
            None => {
                self.report(
                    DiagCode::StringWhereNumericRequired,
                    format!("{what} requires a numeric value"),
                );
                None
            }
        }
    }

    // ---- fixups ---------------------------------------------------------

    /// Records a deferred resolution. For patching kinds, call before the
    /// placeholder bytes are emitted so the offset points at them.
    pub(crate) fn defer(
        &mut self,
        kind: FixupKind,
        expr: Expr,
        label: Option<String>,
        width: usize,
    ) {
        let segment = match kind {
            FixupKind::Equ | FixupKind::Ent | FixupKind::Xent => {
                self.current_segment.unwrap_or(0)
            }
            _ => {
                self.seg_mut();
                self.current_segment.expect("just ensured")
            }
        };
        let (offset, instruction_address) = match self.current_segment {
            Some(idx) => (
                self.segments[idx].emitted.len(),
                self.segments[idx].instruction_address(),
            ),
            None => (0, self.options.default_start_address),
        };
        let fixup = Fixup {
            kind,
            segment,
            offset,
            width,
            expr,
            label,
            module: self.registry.current_module(),
            at_address: self.logical_address(),
            instruction_address,
            file: self.cur_file,
            line: self.cur_line,
        };
        self.registry.record_fixup(fixup);
    }

    /// Emits one byte for `expr`, deferring through a `Bit8` fixup when the
    /// expression cannot be evaluated yet.
    pub(crate) fn emit_expr_byte(&mut self, expr: &Expr) {
        match self.eval(expr) {
            Eval::Valid(v) => match v.as_byte() {
                Some(byte) => self.emit_byte(byte),
                None => {
                    self.report(
                        DiagCode::StringWhereNumericRequired,
                        format!("a numeric value is required, got {}", v.type_name()),
                    );
                    self.emit_byte(0);
                }
            },
            Eval::NonEvaluated(_) => {
                self.defer(FixupKind::Bit8, expr.clone(), None, 1);
                self.emit_byte(0);
            }
            Eval::Invalid(fault) => {
                self.report(fault.code, fault.message);
                self.emit_byte(0);
            }
        }
    }

    /// Emits a little-endian word for `expr`, deferring through `Bit16`.
    pub(crate) fn emit_expr_word(&mut self, expr: &Expr) {
        match self.eval(expr) {
            Eval::Valid(v) => match v.as_word() {
                Some(word) => self.emit_word(word),
                None => {
                    self.report(
                        DiagCode::StringWhereNumericRequired,
                        format!("a numeric value is required, got {}", v.type_name()),
                    );
                    self.emit_word(0);
                }
            },
            Eval::NonEvaluated(_) => {
                self.defer(FixupKind::Bit16, expr.clone(), None, 2);
                self.emit_word(0);
            }
            Eval::Invalid(fault) => {
                self.report(fault.code, fault.message);
                self.emit_word(0);
            }
        }
    }

    /// Emits the displacement byte of a `JR`/`DJNZ` target.
    pub(crate) fn emit_jr_target(&mut self, expr: &Expr) {
        let base = i32::from(self.instruction_address()) + 2;
        match self.eval(expr) {
            Eval::Valid(v) => match v.as_word() {
                Some(target) => {
                    let displacement = i32::from(target) - base;
                    if (-128..=127).contains(&displacement) {
                        self.emit_byte(displacement as u8);
                    } else {
                        self.report(
                            DiagCode::RelativeJumpOutOfRange,
                            format!(
                                "relative jump of {displacement} is outside -128..127"
                            ),
                        );
                        self.emit_byte(0);
                    }
                }
                None => {
                    self.report(
                        DiagCode::StringWhereNumericRequired,
                        "a jump target must be numeric",
                    );
                    self.emit_byte(0);
                }
            },
            Eval::NonEvaluated(_) => {
                self.defer(FixupKind::Jr, expr.clone(), None, 1);
                self.emit_byte(0);
            }
            Eval::Invalid(fault) => {
                self.report(fault.code, fault.message);
                self.emit_byte(0);
            }
        }
    }

    // ---- symbols --------------------------------------------------------

    /// Defines a symbol at the current line, reporting collisions.
    pub(crate) fn define_symbol(&mut self, name: &str, value: Value, kind: SymbolKind) {
        let symbol = Symbol {
            name: name.to_owned(),
            value,
            kind,
            usages: 0,
            file: self.cur_file,
            line: self.cur_line,
        };
        match self.registry.define(name, symbol) {
            Ok(()) => {}
            Err(crate::symbols::DefineIssue::Duplicate) => {
                self.report_token(
                    DiagCode::DuplicateSymbol,
                    format!("{name} is already defined in this scope"),
                    name,
                );
            }
            Err(crate::symbols::DefineIssue::TemporaryOutsideScope) => {
                self.report_token(
                    DiagCode::InvalidLocalName,
                    format!("temporary name {name} is only valid inside a loop body"),
                    name,
                );
            }
        }
    }

    /// `VAR` assignment: rebinds an existing variable in place, or binds a
    /// fresh one in the innermost scope.
    pub(crate) fn assign_var_symbol(&mut self, name: &str, value: Value) {
        let symbol = Symbol {
            name: name.to_owned(),
            value,
            kind: SymbolKind::Var,
            usages: 0,
            file: self.cur_file,
            line: self.cur_line,
        };
        match self.registry.assign_var(name, symbol) {
            Ok(()) => {}
            Err(crate::symbols::DefineIssue::Duplicate) => {
                self.report_token(
                    DiagCode::DuplicateSymbol,
                    format!("{name} is already defined and is not a variable"),
                    name,
                );
            }
            Err(crate::symbols::DefineIssue::TemporaryOutsideScope) => {
                self.report_token(
                    DiagCode::InvalidLocalName,
                    format!("temporary name {name} is only valid inside a loop body"),
                    name,
                );
            }
        }
    }

    /// Binds a label to the current logical address.
    pub(crate) fn bind_label_here(&mut self, name: &str) {
        let address = self.logical_address();
        self.define_symbol(name, Value::from(address), SymbolKind::Label);
    }

    // ---- model and randomness -------------------------------------------

    pub(crate) fn active_model(&self) -> Model {
        self.model.unwrap_or(self.options.default_model)
    }

    /// Diagnoses use of a Next-only instruction on other models.
    pub(crate) fn require_next_model(&mut self, mnemonic: &str) {
        if !self.active_model().supports_next_ops() {
            self.report_token(
                DiagCode::NextOnlyInstruction,
                format!("{mnemonic} is only available on the Spectrum Next"),
                mnemonic,
            );
        }
    }

    pub(crate) fn next_random(&mut self) -> u16 {
        self.rng.gen()
    }

    pub(crate) fn reseed(&mut self, seed: Option<u64>) {
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
    }
}

impl EvalContext for Assembler {
    fn lookup(&mut self, sym: &SymbolRef) -> Lookup {
        self.registry.lookup(sym)
    }

    fn current_address(&self) -> u16 {
        self.logical_address()
    }

    fn current_instruction_address(&self) -> u16 {
        self.instruction_address()
    }

    fn random_word(&mut self) -> u16 {
        self.next_random()
    }
}

/// Evaluation context used while resolving fixups: `$`/`$$` refer to the
/// addresses captured when the fixup was created.
pub(crate) struct FixupEvalCx<'a> {
    pub at: u16,
    pub instruction: u16,
    pub asm: &'a mut Assembler,
}

impl EvalContext for FixupEvalCx<'_> {
    fn lookup(&mut self, sym: &SymbolRef) -> Lookup {
        self.asm.registry.lookup(sym)
    }

    fn current_address(&self) -> u16 {
        self.at
    }

    fn current_instruction_address(&self) -> u16 {
        self.instruction
    }

    fn random_word(&mut self) -> u16 {
        self.asm.next_random()
    }
}
