//! The statement driver: walks the parsed line list, anchors overflow
//! labels, dispatches pragmas and operations, and executes block
//! statements by scanning for their matching end and re-running line
//! ranges.

use crate::{
    assembler::Assembler,
    ast::{
        Expr,
        IfKind,
        Payload,
        Pragma,
        SourceLine,
        Statement,
        SymbolRef,
    },
    diag::DiagCode,
    eval::Eval,
    fixup::{
        Fixup,
        FixupKind,
    },
    output::ListingItem,
    symbols::{
        MacroDef,
        ScopeFlags,
        StructDef,
        StructField,
        SymbolKind,
    },
    value::Value,
};

use itertools::Itertools;
use std::ops::Range;
use tracing::{
    debug,
    trace,
};

fn is_block_start(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::If(_)
            | Statement::Loop(_)
            | Statement::Repeat
            | Statement::While(_)
            | Statement::For { .. }
            | Statement::Proc
            | Statement::Module(_)
            | Statement::MacroDef(_)
            | Statement::StructDef
    )
}

fn is_block_end(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::Endif
            | Statement::EndLoop
            | Statement::Until(_)
            | Statement::Wend
            | Statement::Next
            | Statement::Endp
            | Statement::EndModule
            | Statement::EndMacro
            | Statement::EndStruct
    )
}

enum IfArm {
    Head(IfKind),
    Elif(Expr),
    Else,
}

enum Counter {
    Int(i64, i64, i64),
    Real(f64, f64, f64),
}

impl Counter {
    fn in_range(&self) -> bool {
        match self {
            Counter::Int(v, to, step) => {
                if *step > 0 {
                    v <= to
                } else {
                    v >= to
                }
            }
            Counter::Real(v, to, step) => {
                if *step > 0.0 {
                    v <= to
                } else {
                    v >= to
                }
            }
        }
    }

    fn value(&self) -> Value {
        match self {
            Counter::Int(v, ..) => Value::Int(*v),
            Counter::Real(v, ..) => Value::Real(*v),
        }
    }

    fn advance(&mut self) {
        match self {
            Counter::Int(v, _, step) => *v = v.wrapping_add(*step),
            Counter::Real(v, _, step) => *v += *step,
        }
    }
}

impl Assembler {
    /// Executes the whole line list.
    pub(crate) fn run(&mut self) {
        let end = self.lines.len();
        self.exec_range(0..end);
        // A trailing label-only line anchors at the final address.
        if let Some(label) = self.pending_label.take() {
            self.bind_label_here(&label);
        }
    }

    fn exec_range(&mut self, range: Range<usize>) {
        let mut idx = range.start;
        while idx < range.end {
            if self.flow_break || self.flow_continue {
                break;
            }
            idx = self.exec_line(idx, range.end);
        }
    }

    fn exec_line(&mut self, idx: usize, end: usize) -> usize {
        let line = self.lines[idx].clone();
        self.cur_file = line.file;
        self.cur_line = line.line;
        trace!(line = line.line, "dispatch");

        if let Some(issue) = &line.parse_issue {
            self.report(DiagCode::SyntaxIssue, issue.clone());
        }

        // Placeholder spans survive only inside macro bodies, which the
        // collection pass skips wholesale; anywhere else they are misuse.
        if !line.macro_params.is_empty() {
            self.report(
                DiagCode::MacroParamOutsideMacro,
                "macro parameter placeholders are only valid inside a macro body",
            );
            return idx + 1;
        }

        match &line.payload {
            Payload::NoInstr => {
                if let Some(label) = &line.label {
                    if let Some(previous) = self.pending_label.take() {
                        self.bind_label_here(&previous);
                    }
                    self.pending_label = Some(label.clone());
                }
                idx + 1
            }
            Payload::Pragma(pragma) => {
                self.mark_instruction();
                let effective = self.effective_label(&line);
                let binds_itself =
                    matches!(pragma, Pragma::Equ(_) | Pragma::Var(_) | Pragma::Org(_));
                let pragma_label = if binds_itself {
                    effective
                } else {
                    if let Some(label) = &effective {
                        self.bind_label_here(label);
                    }
                    None
                };
                let mark = self.emission_mark();
                self.apply_pragma(pragma_label.as_deref(), pragma);
                self.record_emission(&line, mark);
                idx + 1
            }
            Payload::Operation(op) => {
                self.mark_instruction();
                if let Some(label) = self.effective_label(&line) {
                    self.bind_label_here(&label);
                }
                let mark = self.emission_mark();
                self.emit_operation(op);
                self.record_emission(&line, mark);
                idx + 1
            }
            Payload::Statement(stmt) => self.exec_statement(idx, end, &line, stmt),
        }
    }

    fn exec_statement(
        &mut self,
        idx: usize,
        end: usize,
        line: &SourceLine,
        stmt: &Statement,
    ) -> usize {
        match stmt {
            Statement::If(kind) => self.exec_if(idx, end, line, kind),
            Statement::Loop(count) => self.exec_loop(idx, end, line, count),
            Statement::Repeat => self.exec_repeat(idx, end, line),
            Statement::While(cond) => self.exec_while(idx, end, line, cond),
            Statement::For {
                var,
                from,
                to,
                step,
            } => self.exec_for(idx, end, line, var, from, to, step.as_ref()),
            Statement::Proc => self.exec_proc(idx, end, line),
            Statement::Module(name) => self.exec_module(idx, end, line, name.as_deref()),
            Statement::MacroDef(params) => self.collect_macro(idx, end, line, params),
            Statement::StructDef => self.collect_struct(idx, end, line),
            Statement::Invocation { name, args } => {
                self.exec_invocation(idx, end, line, name, args)
            }
            Statement::FieldAssign { .. } => {
                self.report(
                    DiagCode::FieldOutsideStructInvocation,
                    "field assignment is only valid right after a struct invocation",
                );
                idx + 1
            }
            Statement::Local(names) => {
                if let Some(label) = self.effective_label(line) {
                    self.bind_label_here(&label);
                }
                self.book_locals(names);
                idx + 1
            }
            Statement::Break => {
                if self.registry.has_loop_scope() {
                    self.flow_break = true;
                } else {
                    self.report(DiagCode::FlowOutsideLoop, "BREAK outside a loop body");
                }
                idx + 1
            }
            Statement::Continue => {
                if self.registry.has_loop_scope() {
                    self.flow_continue = true;
                } else {
                    self.report(DiagCode::FlowOutsideLoop, "CONTINUE outside a loop body");
                }
                idx + 1
            }
            // A block end reached directly means its opener was missing.
            Statement::Elif(_)
            | Statement::Else
            | Statement::Endif
            | Statement::EndLoop
            | Statement::Until(_)
            | Statement::Wend
            | Statement::Next
            | Statement::Endp
            | Statement::EndModule
            | Statement::EndMacro
            | Statement::EndStruct => {
                self.report(
                    DiagCode::MissingBlockEnd,
                    "block end without a matching block statement",
                );
                idx + 1
            }
        }
    }

    // ---- block scanning -------------------------------------------------

    /// Scans forward for the matching end of the block opened at
    /// `after - 1`, tracking the nesting of inner block statements.
    fn find_block_end(
        &self,
        after: usize,
        end: usize,
        matches_end: fn(&Statement) -> bool,
    ) -> Option<usize> {
        let mut depth = 0u32;
        for j in after..end {
            let stmt = match &self.lines[j].payload {
                Payload::Statement(stmt) => stmt,
                _ => continue,
            };
            if is_block_end(stmt) {
                if depth == 0 {
                    return matches_end(stmt).then_some(j);
                }
                depth -= 1;
            } else if is_block_start(stmt) {
                depth += 1;
            }
        }
        None
    }

    fn missing_end(&mut self, what: &str) -> usize {
        self.report(
            DiagCode::MissingBlockEnd,
            format!("{what} has no matching end"),
        );
        self.lines.len()
    }

    /// Binds the label of a block-end line at the address following the
    /// block.
    fn bind_end_label(&mut self, end_idx: usize) {
        if let Some(label) = self.lines[end_idx].label.clone() {
            self.cur_file = self.lines[end_idx].file;
            self.cur_line = self.lines[end_idx].line;
            self.bind_label_here(&label);
        }
    }

    // ---- conditionals ---------------------------------------------------

    fn exec_if(&mut self, idx: usize, end: usize, line: &SourceLine, kind: &IfKind) -> usize {
        if let Some(label) = self.effective_label(line) {
            self.bind_label_here(&label);
        }

        // Record every arm's body range up front.
        let mut arms: Vec<(IfArm, Range<usize>)> = Vec::new();
        let mut head = IfArm::Head(kind.clone());
        let mut body_start = idx + 1;
        let mut endif = None;
        let mut depth = 0u32;
        for j in idx + 1..end {
            let stmt = match &self.lines[j].payload {
                Payload::Statement(stmt) => stmt,
                _ => continue,
            };
            if depth == 0 {
                match stmt {
                    Statement::Elif(expr) => {
                        arms.push((head, body_start..j));
                        head = IfArm::Elif(expr.clone());
                        body_start = j + 1;
                        continue;
                    }
                    Statement::Else => {
                        arms.push((head, body_start..j));
                        head = IfArm::Else;
                        body_start = j + 1;
                        continue;
                    }
                    Statement::Endif => {
                        arms.push((head, body_start..j));
                        endif = Some(j);
                        break;
                    }
                    _ => {}
                }
            }
            if is_block_end(stmt) {
                depth = depth.saturating_sub(1);
            } else if is_block_start(stmt) {
                depth += 1;
            }
        }
        let Some(endif) = endif else {
            return self.missing_end("IF");
        };

        // Conditions evaluate immediately, top to bottom; the first truthy
        // arm is emitted.
        for (arm, body) in arms {
            let taken = match arm {
                IfArm::Head(IfKind::Expr(expr)) | IfArm::Elif(expr) => {
                    self.eval_condition(&expr)
                }
                IfArm::Head(IfKind::Used(sref)) => self.symbol_used(&sref),
                IfArm::Head(IfKind::NotUsed(sref)) => !self.symbol_used(&sref),
                IfArm::Head(IfKind::Defined(sref)) => self.registry.is_defined(&sref),
                IfArm::Head(IfKind::NotDefined(sref)) => !self.registry.is_defined(&sref),
                IfArm::Else => true,
            };
            if taken {
                self.exec_range(body);
                break;
            }
        }

        self.bind_end_label(endif);
        endif + 1
    }

    fn symbol_used(&self, sref: &SymbolRef) -> bool {
        self.registry.usage_of(sref).unwrap_or(0) > 0
    }

    fn eval_condition(&mut self, expr: &Expr) -> bool {
        match self.eval_immediate(expr, "a condition") {
            Some(value) if value.is_str() => {
                self.report(
                    DiagCode::StringWhereNumericRequired,
                    "a string cannot be used as a condition",
                );
                false
            }
            Some(value) => value.is_truthy(),
            None => false,
        }
    }

    // ---- loops ----------------------------------------------------------

    fn exec_loop(&mut self, idx: usize, end: usize, line: &SourceLine, count: &Expr) -> usize {
        if let Some(label) = self.effective_label(line) {
            self.bind_label_here(&label);
        }
        let Some(end_idx) = self.find_block_end(idx + 1, end, |s| {
            matches!(s, Statement::EndLoop)
        }) else {
            return self.missing_end("LOOP");
        };

        let count = match self.eval_immediate_int(count, "the LOOP count") {
            Some(count) if count <= i64::from(self.options.max_loop_iterations) => count,
            Some(_) => {
                self.report(
                    DiagCode::LoopLimitExceeded,
                    format!(
                        "loop count exceeds the {} iteration limit",
                        self.options.max_loop_iterations
                    ),
                );
                i64::from(self.options.max_loop_iterations)
            }
            None => 0,
        };

        let errors_at_start = self.error_count();
        for iteration in 0..count.max(0) {
            self.begin_iteration_scope(iteration as u32 + 1);
            self.exec_range(idx + 1..end_idx);
            self.close_scope();
            if self.end_iteration(errors_at_start) {
                break;
            }
        }

        self.bind_end_label(end_idx);
        end_idx + 1
    }

    fn exec_repeat(&mut self, idx: usize, end: usize, line: &SourceLine) -> usize {
        if let Some(label) = self.effective_label(line) {
            self.bind_label_here(&label);
        }
        let Some(end_idx) = self.find_block_end(idx + 1, end, |s| {
            matches!(s, Statement::Until(_))
        }) else {
            return self.missing_end("REPEAT");
        };
        let until = match &self.lines[end_idx].payload {
            Payload::Statement(Statement::Until(expr)) => expr.clone(),
            _ => unreachable!("matched by the scanner"),
        };

        let errors_at_start = self.error_count();
        let mut iteration = 0u32;
        loop {
            iteration += 1;
            if iteration > self.options.max_loop_iterations {
                self.report(
                    DiagCode::LoopLimitExceeded,
                    "REPEAT exceeded the iteration limit",
                );
                break;
            }
            self.begin_iteration_scope(iteration);
            self.exec_range(idx + 1..end_idx);
            // The exit condition sees the iteration scope's symbols.
            self.cur_file = self.lines[end_idx].file;
            self.cur_line = self.lines[end_idx].line;
            let done = self.eval_condition(&until);
            self.close_scope();
            if self.end_iteration(errors_at_start) || done {
                break;
            }
        }

        self.bind_end_label(end_idx);
        end_idx + 1
    }

    fn exec_while(&mut self, idx: usize, end: usize, line: &SourceLine, cond: &Expr) -> usize {
        if let Some(label) = self.effective_label(line) {
            self.bind_label_here(&label);
        }
        let Some(end_idx) =
            self.find_block_end(idx + 1, end, |s| matches!(s, Statement::Wend))
        else {
            return self.missing_end("WHILE");
        };

        let errors_at_start = self.error_count();
        let mut iteration = 0u32;
        loop {
            if !self.eval_condition(cond) {
                break;
            }
            iteration += 1;
            if iteration > self.options.max_loop_iterations {
                self.report(
                    DiagCode::LoopLimitExceeded,
                    "WHILE exceeded the iteration limit",
                );
                break;
            }
            self.begin_iteration_scope(iteration);
            self.exec_range(idx + 1..end_idx);
            self.close_scope();
            if self.end_iteration(errors_at_start) {
                break;
            }
        }

        self.bind_end_label(end_idx);
        end_idx + 1
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_for(
        &mut self,
        idx: usize,
        end: usize,
        line: &SourceLine,
        var: &str,
        from: &Expr,
        to: &Expr,
        step: Option<&Expr>,
    ) -> usize {
        if let Some(label) = self.effective_label(line) {
            self.bind_label_here(&label);
        }
        let Some(end_idx) =
            self.find_block_end(idx + 1, end, |s| matches!(s, Statement::Next))
        else {
            return self.missing_end("FOR");
        };

        let (Some(from), Some(to)) = (
            self.eval_immediate(from, "the FOR start value"),
            self.eval_immediate(to, "the FOR end value"),
        ) else {
            return end_idx + 1;
        };
        let step = match step {
            None => Value::Int(1),
            Some(expr) => match self.eval_immediate(expr, "the FOR step") {
                Some(value) => value,
                None => return end_idx + 1,
            },
        };

        // Integer semantics when all three bounds are integral.
        let integral = !matches!(from, Value::Real(_))
            && !matches!(to, Value::Real(_))
            && !matches!(step, Value::Real(_));
        let mut counter = if integral {
            match (from.as_int(), to.as_int(), step.as_int()) {
                (Some(f), Some(t), Some(s)) => Counter::Int(f, t, s),
                _ => {
                    self.report(
                        DiagCode::StringWhereNumericRequired,
                        "FOR bounds must be numeric",
                    );
                    return end_idx + 1;
                }
            }
        } else {
            match (from.as_real(), to.as_real(), step.as_real()) {
                (Some(f), Some(t), Some(s)) => Counter::Real(f, t, s),
                _ => {
                    self.report(
                        DiagCode::StringWhereNumericRequired,
                        "FOR bounds must be numeric",
                    );
                    return end_idx + 1;
                }
            }
        };
        if matches!(counter, Counter::Int(_, _, 0))
            || matches!(counter, Counter::Real(_, _, s) if s == 0.0)
        {
            self.report(DiagCode::ForStepZero, "FOR step cannot be zero");
            return end_idx + 1;
        }

        let errors_at_start = self.error_count();
        let mut iteration = 0u32;
        while counter.in_range() {
            iteration += 1;
            if iteration > self.options.max_loop_iterations {
                self.report(
                    DiagCode::LoopLimitExceeded,
                    "FOR exceeded the iteration limit",
                );
                break;
            }
            self.begin_iteration_scope(iteration);
            self.define_symbol(var, counter.value(), SymbolKind::Var);
            self.exec_range(idx + 1..end_idx);
            self.close_scope();
            if self.end_iteration(errors_at_start) {
                break;
            }
            counter.advance();
        }

        self.bind_end_label(end_idx);
        end_idx + 1
    }

    /// Pushes the per-iteration temporary scope and its `$cnt` counter.
    fn begin_iteration_scope(&mut self, iteration: u32) {
        self.registry
            .push_scope(ScopeFlags::LOOP | ScopeFlags::TEMPORARY);
        if let Some(scope) = self.registry.top_scope_mut() {
            scope.loop_counter = iteration;
        }
        self.define_symbol("$cnt", Value::Int(i64::from(iteration)), SymbolKind::Var);
    }

    /// Consumes break/continue flags and applies the loop error threshold.
    /// `true` means the loop must stop.
    fn end_iteration(&mut self, errors_at_start: usize) -> bool {
        if self.flow_break {
            self.flow_break = false;
            self.flow_continue = false;
            return true;
        }
        self.flow_continue = false;
        if self.error_count() - errors_at_start > self.options.loop_error_limit as usize {
            self.report(
                DiagCode::TooManyErrorsInLoop,
                "loop aborted after too many errors in its body",
            );
            return true;
        }
        false
    }

    // ---- procedures and modules -----------------------------------------

    fn exec_proc(&mut self, idx: usize, end: usize, line: &SourceLine) -> usize {
        if let Some(label) = self.effective_label(line) {
            self.bind_label_here(&label);
        }
        let Some(end_idx) =
            self.find_block_end(idx + 1, end, |s| matches!(s, Statement::Endp))
        else {
            return self.missing_end("PROC");
        };

        self.registry.push_scope(ScopeFlags::PROC);
        self.exec_range(idx + 1..end_idx);
        self.close_scope();

        self.bind_end_label(end_idx);
        end_idx + 1
    }

    fn book_locals(&mut self, names: &[String]) {
        for name in names {
            match self.registry.book_local(name) {
                Ok(()) => {}
                Err(crate::symbols::LocalIssue::TemporaryName) => self.report_token(
                    DiagCode::InvalidLocalName,
                    format!("{name} cannot be declared LOCAL"),
                    name,
                ),
                Err(crate::symbols::LocalIssue::NotInProc) => self.report(
                    DiagCode::InvalidLocalName,
                    "LOCAL is only valid inside a PROC body",
                ),
                Err(crate::symbols::LocalIssue::Duplicate) => self.report_token(
                    DiagCode::InvalidLocalName,
                    format!("{name} is already declared LOCAL"),
                    name,
                ),
            }
        }
    }

    fn exec_module(
        &mut self,
        idx: usize,
        end: usize,
        line: &SourceLine,
        name: Option<&str>,
    ) -> usize {
        let Some(end_idx) = self.find_block_end(idx + 1, end, |s| {
            matches!(s, Statement::EndModule)
        }) else {
            return self.missing_end("MODULE");
        };

        let effective = self.effective_label(line);
        let name = match name.map(str::to_owned).or(effective) {
            Some(name) => name,
            None => {
                self.report(DiagCode::LabelRequired, "MODULE requires a name");
                return end_idx + 1;
            }
        };
        if self.registry.push_module(&name).is_err() {
            self.report_token(
                DiagCode::DuplicateSymbol,
                format!("module {name} is already defined here"),
                &name,
            );
            return end_idx + 1;
        }
        debug!(module = %name, "module entered");

        self.exec_range(idx + 1..end_idx);
        self.close_module();

        self.bind_end_label(end_idx);
        end_idx + 1
    }

    // ---- macro and struct collection ------------------------------------

    fn collect_macro(
        &mut self,
        idx: usize,
        end: usize,
        line: &SourceLine,
        params: &[String],
    ) -> usize {
        let Some(end_idx) = self.find_block_end(idx + 1, end, |s| {
            matches!(s, Statement::EndMacro)
        }) else {
            return self.missing_end("MACRO");
        };

        let Some(name) = self.effective_label(line) else {
            self.report(DiagCode::LabelRequired, "MACRO requires a name label");
            return end_idx + 1;
        };
        for duplicate in params.iter().duplicates_by(|p| p.to_uppercase()) {
            self.report_token(
                DiagCode::DuplicateMacroParameter,
                format!("macro parameter {duplicate} is declared twice"),
                duplicate,
            );
        }

        let def = MacroDef {
            name: name.clone(),
            params: params.to_vec(),
            body: idx + 1..end_idx,
            end_label: self.lines[end_idx].label.clone(),
        };
        if self.registry.register_macro(def).is_err() {
            self.report_token(
                DiagCode::MacroNameCollision,
                format!("{name} collides with an existing definition"),
                &name,
            );
        }
        end_idx + 1
    }

    fn collect_struct(&mut self, idx: usize, end: usize, line: &SourceLine) -> usize {
        let Some(end_idx) = self.find_block_end(idx + 1, end, |s| {
            matches!(s, Statement::EndStruct)
        }) else {
            return self.missing_end("STRUCT");
        };

        let Some(name) = self.effective_label(line) else {
            self.report(DiagCode::LabelRequired, "STRUCT requires a name label");
            return end_idx + 1;
        };

        let mut fields: Vec<StructField> = Vec::new();
        let mut offset = 0usize;
        for j in idx + 1..end_idx {
            let body_line = self.lines[j].clone();
            self.cur_file = body_line.file;
            self.cur_line = body_line.line;
            let (unit, total) = match &body_line.payload {
                Payload::NoInstr => (1, 0),
                Payload::Pragma(pragma) => match self.struct_field_size(pragma) {
                    Some(sizes) => sizes,
                    None => {
                        self.report(
                            DiagCode::InvalidStructBody,
                            "only data pragmas may appear in a struct body",
                        );
                        (1, 0)
                    }
                },
                _ => {
                    self.report(
                        DiagCode::InvalidStructBody,
                        "only data pragmas may appear in a struct body",
                    );
                    (1, 0)
                }
            };
            if let Some(label) = &body_line.label {
                if fields
                    .iter()
                    .any(|f| f.name.eq_ignore_ascii_case(label))
                {
                    self.report_token(
                        DiagCode::DuplicateSymbol,
                        format!("struct field {label} is already defined"),
                        label,
                    );
                } else {
                    fields.push(StructField {
                        name: label.clone(),
                        offset,
                        width: unit,
                    });
                }
            }
            offset += total;
        }

        self.cur_file = line.file;
        self.cur_line = line.line;
        let def = StructDef {
            name: name.clone(),
            body: idx + 1..end_idx,
            fields,
            size: offset,
        };
        if self.registry.register_struct(def).is_err() {
            self.report_token(
                DiagCode::MacroNameCollision,
                format!("{name} collides with an existing definition"),
                &name,
            );
        }
        end_idx + 1
    }

    /// `(unit width, total bytes)` contributed by a struct-body pragma, or
    /// `None` for pragmas that may not appear there.
    fn struct_field_size(&mut self, pragma: &Pragma) -> Option<(usize, usize)> {
        match pragma {
            Pragma::DefB(exprs) => Some((1, exprs.len())),
            Pragma::DefW(exprs) => Some((2, 2 * exprs.len())),
            Pragma::DefM {
                text,
                null_terminator,
                ..
            } => {
                let value = self.eval_immediate(text, "a struct DEFM string")?;
                let s = value.as_str()?;
                let extra = usize::from(*null_terminator);
                Some((1, crate::pragma::spectrum_bytes(s).len() + extra))
            }
            Pragma::DefH(expr) => {
                let value = self.eval_immediate(expr, "a struct DEFH pattern")?;
                let s = value.as_str()?;
                Some((1, s.chars().filter(|c| !c.is_whitespace()).count() / 2))
            }
            Pragma::DefS { count, .. } => {
                let count = self.eval_immediate_int(count, "a struct DEFS count")?;
                Some((1, count.max(0) as usize))
            }
            Pragma::FillB { count, .. } => {
                let count = self.eval_immediate_int(count, "a struct fill count")?;
                Some((1, count.max(0) as usize))
            }
            Pragma::FillW { count, .. } => {
                let count = self.eval_immediate_int(count, "a struct fill count")?;
                Some((2, 2 * count.max(0) as usize))
            }
            Pragma::DefG(pattern) => Some((1, crate::pragma::pixel_byte_len(pattern))),
            Pragma::DefGx(expr) => {
                let value = self.eval_immediate(expr, "a struct DEFGX pattern")?;
                let s = value.as_str()?;
                let pattern = s.trim_start().trim_start_matches(&['<', '>'][..]);
                Some((1, crate::pragma::pixel_byte_len(pattern)))
            }
            _ => None,
        }
    }

    // ---- invocation -----------------------------------------------------

    fn exec_invocation(
        &mut self,
        idx: usize,
        end: usize,
        line: &SourceLine,
        name: &str,
        args: &[Expr],
    ) -> usize {
        if let Some(def) = self.registry.find_macro(name).cloned() {
            if let Some(label) = self.effective_label(line) {
                self.bind_label_here(&label);
            }
            self.expand_macro(line, &def, args);
            return idx + 1;
        }
        if let Some(def) = self.registry.find_struct(name).cloned() {
            return self.invoke_struct(idx, end, line, &def);
        }
        self.report_token(
            DiagCode::UnknownMacroOrStruct,
            format!("{name} names no macro or struct"),
            name,
        );
        idx + 1
    }

    fn expand_macro(&mut self, line: &SourceLine, def: &MacroDef, args: &[Expr]) {
        if args.len() != def.params.len() {
            return self.report(
                DiagCode::InvalidOperands,
                format!(
                    "macro {} takes {} argument(s), got {}",
                    def.name,
                    def.params.len(),
                    args.len()
                ),
            );
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.eval_immediate(arg, "a macro argument") {
                Some(value) => values.push(value),
                None => values.push(Value::Int(0)),
            }
        }

        // Textual substitution over the body's source text, then re-parse
        // through the host and replay in a nested scope.
        let text = def
            .body
            .clone()
            .map(|j| {
                let body_line = self.lines[j].clone();
                let mut line_text = body_line.text.clone();
                for span in body_line.macro_params.iter().rev() {
                    match def
                        .params
                        .iter()
                        .position(|p| p.eq_ignore_ascii_case(&span.name))
                    {
                        Some(k) => line_text.replace_range(
                            span.start..span.end,
                            &values[k].substitution_text(),
                        ),
                        None => self.report_token(
                            DiagCode::UnknownMacroParameter,
                            format!("{{{{{}}}}} names no parameter of {}", span.name, def.name),
                            &span.name,
                        ),
                    }
                }
                line_text
            })
            .join("\n");

        let parsed = match self.line_source.parse(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                return self.report(DiagCode::MacroExpansionFailed, err.to_string());
            }
        };
        debug!(name = %def.name, lines = parsed.len(), "macro expanded");

        // Expanded lines report at the invocation site.
        let base = self.lines.len();
        for mut expanded in parsed {
            expanded.file = line.file;
            expanded.line = line.line;
            self.lines.push(expanded);
        }
        let expansion_end = self.lines.len();

        self.registry
            .push_scope(ScopeFlags::MACRO | ScopeFlags::TEMPORARY);
        for (param, value) in def.params.iter().zip(values) {
            self.define_symbol(param, value, SymbolKind::MacroArg);
        }
        self.exec_range(base..expansion_end);
        self.close_scope();
        self.lines.truncate(base);

        self.cur_file = line.file;
        self.cur_line = line.line;
        if let Some(end_label) = &def.end_label {
            self.bind_label_here(end_label);
        }
    }

    fn invoke_struct(
        &mut self,
        idx: usize,
        end: usize,
        line: &SourceLine,
        def: &StructDef,
    ) -> usize {
        if let Some(label) = self.effective_label(line) {
            self.bind_label_here(&label);
        }

        if usize::from(self.logical_address()) + def.size > 0x10000 {
            self.report(
                DiagCode::StructSizeOverflow,
                format!("{} bytes do not fit below the 64K boundary", def.size),
            );
            return self.skip_field_assignments(idx + 1, end);
        }

        let mark = self.emission_mark();
        self.seg_mut();
        let seg_idx = self.current_segment.expect("just ensured");
        let start_offset = self.segments[seg_idx].emitted.len();

        // Clone pass: replay the body pragmas to emit the default pattern.
        // Field labels are not bound as symbols here.
        for j in def.body.clone() {
            let body_line = self.lines[j].clone();
            self.cur_file = body_line.file;
            self.cur_line = body_line.line;
            if let Payload::Pragma(pragma) = &body_line.payload {
                self.apply_pragma(None, pragma);
            }
        }

        // Field-assignment lines overlay bytes until a different statement
        // closes the invocation.
        let mut next = idx + 1;
        while next < end {
            let field_line = self.lines[next].clone();
            let Payload::Statement(Statement::FieldAssign { name, expr }) =
                &field_line.payload
            else {
                break;
            };
            self.cur_file = field_line.file;
            self.cur_line = field_line.line;
            match def.field(name) {
                None => self.report_token(
                    DiagCode::UnknownStructField,
                    format!("{} has no field named {name}", def.name),
                    name,
                ),
                Some(field) => {
                    let offset = start_offset + field.offset;
                    let width = field.width.max(1);
                    self.overlay_field(seg_idx, offset, width, expr);
                }
            }
            next += 1;
        }

        self.cur_file = line.file;
        self.cur_line = line.line;
        self.record_emission(line, mark);
        next
    }

    fn overlay_field(&mut self, seg_idx: usize, offset: usize, width: usize, expr: &Expr) {
        match self.eval(expr) {
            Eval::Valid(value) => match value.as_int() {
                Some(int) => {
                    let bytes: Vec<u8> =
                        (0..width).map(|i| (int >> (8 * i)) as u8).collect();
                    self.segments[seg_idx].patch(offset, &bytes);
                }
                None => self.report(
                    DiagCode::StringWhereNumericRequired,
                    "a struct field override must be numeric",
                ),
            },
            Eval::NonEvaluated(_) => {
                let fixup = Fixup {
                    kind: FixupKind::Struct,
                    segment: seg_idx,
                    offset,
                    width,
                    expr: expr.clone(),
                    label: None,
                    module: self.registry.current_module(),
                    at_address: self.segments[seg_idx].logical_at(offset),
                    instruction_address: self.segments[seg_idx].instruction_address(),
                    file: self.cur_file,
                    line: self.cur_line,
                };
                self.registry.record_fixup(fixup);
            }
            Eval::Invalid(fault) => self.report(fault.code, fault.message),
        }
    }

    fn skip_field_assignments(&mut self, mut next: usize, end: usize) -> usize {
        while next < end {
            match &self.lines[next].payload {
                Payload::Statement(Statement::FieldAssign { .. }) => next += 1,
                _ => break,
            }
        }
        next
    }

    // ---- scope and module teardown --------------------------------------

    /// Pops the innermost scope after resolving its fixups; whatever stays
    /// unresolved propagates outward.
    pub(crate) fn close_scope(&mut self) {
        let fixups = match self.registry.top_scope_mut() {
            Some(scope) => std::mem::take(&mut scope.fixups),
            None => return,
        };
        let unresolved = self.resolve_fixup_list(fixups, false);
        self.registry.pop_scope();
        for fixup in unresolved {
            self.registry.record_fixup(fixup);
        }
    }

    /// Resolves the current module's fixups and leaves it; leftovers move
    /// to the parent module.
    pub(crate) fn close_module(&mut self) {
        let module = self.registry.current_module();
        let fixups = self.registry.take_module_fixups(module);
        let unresolved = self.resolve_fixup_list(fixups, false);
        if self.registry.pop_module().is_some() {
            debug!("module left");
        }
        let parent = self.registry.current_module();
        self.registry.extend_module_fixups(parent, unresolved);
    }

    // ---- labels and bookkeeping -----------------------------------------

    /// The label in effect for this line: a pending overflow label wins,
    /// and when the line carries its own label too, the pending one is
    /// anchored at the current address first.
    fn effective_label(&mut self, line: &SourceLine) -> Option<String> {
        match (self.pending_label.take(), &line.label) {
            (Some(pending), Some(own)) => {
                self.bind_label_here(&pending);
                Some(own.clone())
            }
            (Some(pending), None) => Some(pending),
            (None, Some(own)) => Some(own.clone()),
            (None, None) => None,
        }
    }

    fn emission_mark(&self) -> (Option<usize>, usize) {
        match self.current_segment {
            Some(idx) => (Some(idx), self.segments[idx].emitted.len()),
            None => (None, 0),
        }
    }

    /// Appends the listing record and source-map entries for whatever the
    /// line emitted.
    fn record_emission(&mut self, line: &SourceLine, mark: (Option<usize>, usize)) {
        let Some(seg_idx) = self.current_segment else {
            return;
        };
        let start = if mark.0 == Some(seg_idx) { mark.1 } else { 0 };
        let len = self.segments[seg_idx].emitted.len();
        if len <= start {
            return;
        }
        let address = self.segments[seg_idx].logical_at(start);
        self.listing.push(ListingItem {
            address,
            file: line.file,
            line: line.line,
            segment: seg_idx,
            range: start..len,
            text: line.text.clone(),
        });
        for offset in start..len {
            let at = self.segments[seg_idx].logical_at(offset);
            self.source_map.record(at, line.file, line.line);
        }
    }
}
