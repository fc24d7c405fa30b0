//! Line builders and a miniature line parser shared by the scenario
//! tests. Real hosts feed the engine from a full lexer/parser; the tests
//! construct the same structures by hand.

#![allow(dead_code)]

use z80_assembler::{
    ast::{
        Expr,
        LineSource,
        MacroParamSpan,
        Operand,
        Operation,
        Payload,
        Pragma,
        Sign,
        SourceLine,
        Statement,
        SymbolRef,
    },
    Assembler,
    AssemblerOptions,
    Assembly,
    ExpansionError,
    Severity,
    Value,
};

use z80_asm::{
    Condition,
    Reg16,
    Reg16Idx,
    Reg16Spec,
    Reg8,
    Reg8Idx,
    Reg8Spec,
};

// ---- expressions --------------------------------------------------------

pub fn int(value: i64) -> Expr {
    Expr::Int(value)
}

pub fn real(value: f64) -> Expr {
    Expr::Real(value)
}

pub fn string(value: &str) -> Expr {
    Expr::Str(value.to_owned())
}

pub fn sym(name: &str) -> Expr {
    Expr::symbol(name)
}

pub fn qualified(segments: &[&str]) -> Expr {
    Expr::Symbol(SymbolRef::qualified(
        segments.iter().map(|s| (*s).to_owned()).collect(),
    ))
}

// ---- operands -----------------------------------------------------------

pub fn r8(reg: Reg8) -> Operand {
    Operand::Reg8(reg)
}

pub fn r8x(reg: Reg8Idx) -> Operand {
    Operand::Reg8Idx(reg)
}

pub fn r8s(reg: Reg8Spec) -> Operand {
    Operand::Reg8Spec(reg)
}

pub fn rr(reg: Reg16) -> Operand {
    Operand::Reg16(reg)
}

pub fn rrx(reg: Reg16Idx) -> Operand {
    Operand::Reg16Idx(reg)
}

pub fn rrs(reg: Reg16Spec) -> Operand {
    Operand::Reg16Spec(reg)
}

pub fn ind(reg: Reg16) -> Operand {
    Operand::RegIndirect(reg)
}

pub fn mem(expr: Expr) -> Operand {
    Operand::MemIndirect(expr)
}

pub fn cport() -> Operand {
    Operand::CPort
}

pub fn cond(cc: Condition) -> Operand {
    Operand::Condition(cc)
}

pub fn imm(expr: Expr) -> Operand {
    Operand::Expr(expr)
}

pub fn idx(reg: Reg16Idx, displacement: i64) -> Operand {
    let (sign, magnitude) = if displacement < 0 {
        (Sign::Minus, -displacement)
    } else {
        (Sign::Plus, displacement)
    };
    Operand::IndexedAddress {
        reg,
        sign,
        offset: Some(Expr::Int(magnitude)),
    }
}

pub fn idx_bare(reg: Reg16Idx) -> Operand {
    Operand::IndexedAddress {
        reg,
        sign: Sign::Plus,
        offset: None,
    }
}

// ---- lines --------------------------------------------------------------

pub fn op(mnemonic: &str, operands: Vec<Operand>) -> SourceLine {
    SourceLine::new(
        0,
        0,
        Payload::Operation(Operation {
            mnemonic: mnemonic.to_owned(),
            operands,
        }),
    )
}

pub fn pragma(pragma: Pragma) -> SourceLine {
    SourceLine::new(0, 0, Payload::Pragma(pragma))
}

pub fn stmt(statement: Statement) -> SourceLine {
    SourceLine::new(0, 0, Payload::Statement(statement))
}

pub fn label_only(label: &str) -> SourceLine {
    SourceLine::new(0, 0, Payload::NoInstr).with_label(label)
}

pub fn org(address: u16) -> SourceLine {
    pragma(Pragma::Org(int(i64::from(address))))
}

/// A macro body line carrying raw text with `{{param}}` spans located for
/// the substitution machinery.
pub fn macro_body_line(text: &str) -> SourceLine {
    let mut spans = Vec::new();
    let mut search = 0;
    while let Some(start) = text[search..].find("{{") {
        let start = search + start;
        let Some(close) = text[start..].find("}}") else {
            break;
        };
        let end = start + close + 2;
        spans.push(MacroParamSpan {
            name: text[start + 2..end - 2].trim().to_owned(),
            start,
            end,
        });
        search = end;
    }
    let mut line = SourceLine::new(0, 0, Payload::NoInstr).with_text(text);
    line.macro_params = spans;
    line
}

// ---- assembling ---------------------------------------------------------

fn number_lines(mut lines: Vec<SourceLine>) -> Vec<SourceLine> {
    for (index, line) in lines.iter_mut().enumerate() {
        if line.line == 0 {
            line.line = index as u32 + 1;
        }
    }
    lines
}

pub fn assemble(lines: Vec<SourceLine>) -> Assembly {
    Assembler::new(AssemblerOptions::default()).assemble(number_lines(lines))
}

pub fn assemble_with_parser(lines: Vec<SourceLine>) -> Assembly {
    Assembler::with_line_source(AssemblerOptions::default(), Box::new(MiniParser))
        .assemble(number_lines(lines))
}

/// Asserts a clean run and returns the output.
pub fn assemble_ok(lines: Vec<SourceLine>) -> Assembly {
    let out = assemble(lines);
    assert!(
        !out.failed,
        "unexpected diagnostics: {:?}",
        out.diagnostics
    );
    out
}

pub fn assemble_ok_with_parser(lines: Vec<SourceLine>) -> Assembly {
    let out = assemble_with_parser(lines);
    assert!(
        !out.failed,
        "unexpected diagnostics: {:?}",
        out.diagnostics
    );
    out
}

/// The value of a global-module symbol.
pub fn symbol_value(out: &Assembly, name: &str) -> Value {
    global_symbol(out, name)
        .unwrap_or_else(|| panic!("symbol {name} not found"))
}

pub fn global_symbol(out: &Assembly, name: &str) -> Option<Value> {
    out.modules
        .iter()
        .find(|m| m.path.is_empty())?
        .symbols
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .map(|s| s.value.clone())
}

pub fn has_error(out: &Assembly, code: &str) -> bool {
    out.diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error && d.code.code() == code)
}

// ---- a miniature parser for macro expansion -----------------------------

/// Parses the tiny grammar the macro tests expand into: optional label,
/// `nop`/`halt`/`ret`, `ld r,n`, `ld r,r'`, and `defb n,…`. Numbers are
/// decimal or `#`-prefixed hex.
pub struct MiniParser;

impl LineSource for MiniParser {
    fn parse(&mut self, text: &str) -> Result<Vec<SourceLine>, ExpansionError> {
        let mut out = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let number = index as u32 + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                out.push(SourceLine::new(0, number, Payload::NoInstr));
                continue;
            }
            out.push(parse_line(trimmed, number)?);
        }
        Ok(out)
    }
}

fn parse_line(text: &str, number: u32) -> Result<SourceLine, ExpansionError> {
    let (mnemonic, rest) = match text.split_once(char::is_whitespace) {
        Some((m, rest)) => (m, rest.trim()),
        None => (text, ""),
    };
    let payload = match mnemonic.to_ascii_lowercase().as_str() {
        "nop" | "halt" | "ret" => Payload::Operation(Operation {
            mnemonic: mnemonic.to_owned(),
            operands: Vec::new(),
        }),
        "ld" => {
            let (dst, src) = rest
                .split_once(',')
                .ok_or_else(|| ExpansionError::Parse(format!("ld needs operands: {text}")))?;
            Payload::Operation(Operation {
                mnemonic: "ld".to_owned(),
                operands: vec![parse_operand(dst.trim())?, parse_operand(src.trim())?],
            })
        }
        "defb" => {
            let exprs = rest
                .split(',')
                .map(|part| parse_number(part.trim()).map(Expr::Int))
                .collect::<Result<Vec<_>, _>>()?;
            Payload::Pragma(Pragma::DefB(exprs))
        }
        other => {
            return Err(ExpansionError::Parse(format!(
                "mini parser cannot handle {other}"
            )));
        }
    };
    Ok(SourceLine::new(0, number, payload).with_text(text))
}

fn parse_operand(text: &str) -> Result<Operand, ExpansionError> {
    if let Ok(reg) = text.parse::<Reg8>() {
        return Ok(Operand::Reg8(reg));
    }
    parse_number(text).map(|n| Operand::Expr(Expr::Int(n)))
}

fn parse_number(text: &str) -> Result<i64, ExpansionError> {
    let parsed = match text.strip_prefix('#') {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| ExpansionError::Parse(format!("not a number: {text}")))
}
