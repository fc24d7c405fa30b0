//! Directive processing: output shaping (`ORG`/`XORG`/`DISP`), symbol
//! binding (`EQU`/`VAR`/`ENT`/`XENT`), data emission (`DEFB`…`DEFGX`,
//! `FILLB`/`FILLW`, `SKIP`, `ALIGN`) and the host-facing pragmas
//! (`TRACE`, `MODEL`, `RNDSEED`, `INCLUDEBIN`, `COMPAREBIN`, `ERROR`).

use crate::{
    assembler::Assembler,
    ast::{
        Expr,
        Pragma,
    },
    diag::DiagCode,
    eval::Eval,
    fixup::FixupKind,
    output::CompareBinRequest,
    symbols::SymbolKind,
    value::Value,
};

use std::path::{
    Path,
    PathBuf,
};
use tracing::debug;

impl Assembler {
    /// Applies one pragma. `label` is the effective label of the line; the
    /// binding pragmas (`ORG`, `EQU`, `VAR`) consume it themselves, every
    /// other pragma receives it already bound by the driver.
    pub(crate) fn apply_pragma(&mut self, label: Option<&str>, pragma: &Pragma) {
        match pragma {
            Pragma::Org(expr) => self.pragma_org(label, expr),
            Pragma::Xorg(expr) => self.pragma_xorg(expr),
            Pragma::Disp(expr) => self.pragma_disp(expr),
            Pragma::Equ(expr) => self.pragma_equ(label, expr),
            Pragma::Var(expr) => self.pragma_var(label, expr),
            Pragma::Ent(expr) => self.pragma_entry(expr, FixupKind::Ent),
            Pragma::Xent(expr) => self.pragma_entry(expr, FixupKind::Xent),
            Pragma::DefB(exprs) => {
                for expr in exprs {
                    self.emit_expr_byte(expr);
                }
            }
            Pragma::DefW(exprs) => {
                for expr in exprs {
                    self.emit_expr_word(expr);
                }
            }
            Pragma::DefM {
                text,
                bit7_terminator,
                null_terminator,
            } => self.pragma_defm(text, *bit7_terminator, *null_terminator),
            Pragma::DefH(expr) => self.pragma_defh(expr),
            Pragma::DefS { count, fill } => self.pragma_defs(count, fill.as_ref()),
            Pragma::FillB { count, value } => self.pragma_fill(count, value, false),
            Pragma::FillW { count, value } => self.pragma_fill(count, value, true),
            Pragma::Align(expr) => self.pragma_align(expr.as_ref()),
            Pragma::DefG(pattern) => self.pragma_defg(pattern),
            Pragma::DefGx(expr) => self.pragma_defgx(expr),
            Pragma::Skip { target, fill } => self.pragma_skip(target, fill.as_ref()),
            Pragma::Trace { hex, exprs } => self.pragma_trace(*hex, exprs),
            Pragma::Model(name) => self.pragma_model(name),
            Pragma::RndSeed(expr) => self.pragma_rndseed(expr.as_ref()),
            Pragma::IncludeBin {
                path,
                offset,
                length,
            } => self.pragma_includebin(path, offset.as_ref(), length.as_ref()),
            Pragma::CompareBin(path) => self.pragma_comparebin(path),
            Pragma::Error(expr) => self.pragma_error(expr),
        }
    }

    fn pragma_org(&mut self, label: Option<&str>, expr: &Expr) {
        let Some(addr) = self.eval_word(expr, "the ORG address") else {
            return;
        };
        match self.current_segment {
            Some(idx) if self.segments[idx].emitted.is_empty() => {
                self.segments[idx].start_address = addr;
                self.segments[idx].displacement = 0;
            }
            // A new origin after emission starts a new segment instead of
            // moving the cursor.
            Some(_) => self.open_segment(addr),
            None => self.open_segment(addr),
        }
        if let Some(label) = label {
            self.bind_label_here(label);
        }
    }

    fn pragma_xorg(&mut self, expr: &Expr) {
        let Some(addr) = self.eval_word(expr, "the XORG address") else {
            return;
        };
        let occupied = self
            .current_segment
            .map(|idx| !self.segments[idx].emitted.is_empty())
            .unwrap_or(false);
        if occupied {
            self.report(
                DiagCode::XorgAfterEmission,
                "XORG must precede any emission in its segment",
            );
            return;
        }
        self.seg_mut().xorg = Some(addr);
    }

    fn pragma_disp(&mut self, expr: &Expr) {
        let Some(value) = self.eval_immediate_int(expr, "the DISP offset") else {
            return;
        };
        self.seg_mut().displacement = value as i16;
    }

    fn pragma_equ(&mut self, label: Option<&str>, expr: &Expr) {
        let Some(label) = label else {
            return self.report(DiagCode::LabelRequired, "EQU requires a label");
        };
        match self.eval(expr) {
            Eval::Valid(value) => self.define_symbol(label, value, SymbolKind::Label),
            Eval::NonEvaluated(_) => {
                self.defer(FixupKind::Equ, expr.clone(), Some(label.to_owned()), 0);
            }
            Eval::Invalid(fault) => self.report(fault.code, fault.message),
        }
    }

    fn pragma_var(&mut self, label: Option<&str>, expr: &Expr) {
        let Some(label) = label else {
            return self.report(DiagCode::LabelRequired, "VAR requires a label");
        };
        let Some(value) = self.eval_immediate(expr, "a VAR value") else {
            return;
        };
        self.assign_var_symbol(label, value);
    }

    fn pragma_entry(&mut self, expr: &Expr, kind: FixupKind) {
        match self.eval(expr) {
            Eval::Valid(value) => match value.as_word() {
                Some(word) => match kind {
                    FixupKind::Xent => self.export_entry = Some(word),
                    _ => self.entry = Some(word),
                },
                None => self.report(
                    DiagCode::StringWhereNumericRequired,
                    "an entry point must be numeric",
                ),
            },
            Eval::NonEvaluated(_) => self.defer(kind, expr.clone(), None, 0),
            Eval::Invalid(fault) => self.report(fault.code, fault.message),
        }
    }

    fn pragma_defm(&mut self, text: &Expr, bit7: bool, null: bool) {
        let Some(value) = self.eval_immediate(text, "a DEFM string") else {
            return;
        };
        let Some(s) = value.as_str() else {
            return self.report(DiagCode::TypeMismatch, "DEFM requires a string operand");
        };
        let mut bytes = spectrum_bytes(s);
        if bit7 {
            if let Some(last) = bytes.last_mut() {
                *last |= 0x80;
            }
        }
        if null {
            bytes.push(0x00);
        }
        self.emit_bytes(&bytes);
    }

    fn pragma_defh(&mut self, expr: &Expr) {
        let Some(value) = self.eval_immediate(expr, "a DEFH pattern") else {
            return;
        };
        let Some(s) = value.as_str() else {
            return self.report(DiagCode::TypeMismatch, "DEFH requires a string operand");
        };
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.len() % 2 != 0 || !compact.chars().all(|c| c.is_ascii_hexdigit()) {
            return self.report(
                DiagCode::InvalidHexPattern,
                "DEFH requires an even number of hex digits",
            );
        }
        let bytes: Vec<u8> = compact
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
                let lo = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
                (hi << 4) | lo
            })
            .collect();
        self.emit_bytes(&bytes);
    }

    fn pragma_defs(&mut self, count: &Expr, fill: Option<&Expr>) {
        let Some(count) = self.eval_count(count, "the DEFS count") else {
            return;
        };
        for _ in 0..count {
            match fill {
                Some(expr) => self.emit_expr_byte(expr),
                None => self.emit_byte(0),
            }
        }
    }

    fn pragma_fill(&mut self, count: &Expr, value: &Expr, word: bool) {
        let Some(count) = self.eval_count(count, "the fill count") else {
            return;
        };
        for _ in 0..count {
            if word {
                self.emit_expr_word(value);
            } else {
                self.emit_expr_byte(value);
            }
        }
    }

    fn pragma_align(&mut self, expr: Option<&Expr>) {
        let alignment = match expr {
            None => 256,
            Some(expr) => match self.eval_immediate_int(expr, "the ALIGN boundary") {
                Some(value) if (1..=16384).contains(&value) => value,
                Some(value) => {
                    return self.report(
                        DiagCode::AlignOutOfRange,
                        format!("alignment {value} is outside 1..16384"),
                    );
                }
                None => return,
            },
        };
        let alignment = alignment as u32;
        let rem = u32::from(self.logical_address()) % alignment;
        if rem == 0 {
            return;
        }
        for _ in 0..(alignment - rem) {
            self.emit_byte(0);
        }
    }

    fn pragma_defg(&mut self, pattern: &str) {
        let bytes = pixel_bytes(pattern, PixelAlign::Left);
        self.emit_bytes(&bytes);
    }

    fn pragma_defgx(&mut self, expr: &Expr) {
        let Some(value) = self.eval_immediate(expr, "a DEFGX pattern") else {
            return;
        };
        let Some(s) = value.as_str() else {
            return self.report(DiagCode::TypeMismatch, "DEFGX requires a string operand");
        };
        let trimmed = s.trim_start();
        let (align, rest) = match trimmed.chars().next() {
            Some('<') => (PixelAlign::Left, &trimmed[1..]),
            Some('>') => (PixelAlign::Right, &trimmed[1..]),
            _ => (PixelAlign::Left, trimmed),
        };
        let bytes = pixel_bytes(rest, align);
        self.emit_bytes(&bytes);
    }

    fn pragma_skip(&mut self, target: &Expr, fill: Option<&Expr>) {
        let Some(target) = self.eval_word(target, "the SKIP target") else {
            return;
        };
        let fill = match fill {
            None => 0xFF,
            Some(expr) => match self.eval_immediate_int(expr, "the SKIP fill byte") {
                Some(value) => value as u8,
                None => return,
            },
        };
        let current = self.logical_address();
        if target < current {
            return self.report(
                DiagCode::SkipTargetBelowCurrent,
                format!("SKIP target {target:#06x} is below the current address {current:#06x}"),
            );
        }
        for _ in 0..(target - current) {
            self.emit_byte(fill);
        }
    }

    fn pragma_trace(&mut self, hex: bool, exprs: &[Expr]) {
        let mut message = String::new();
        for expr in exprs {
            let Some(value) = self.eval_immediate(expr, "a TRACE argument") else {
                return;
            };
            match (&value, hex) {
                (Value::Int(i), true) => message.push_str(&format!("${:04X}", *i as u16)),
                _ => message.push_str(&value.to_string()),
            }
        }
        debug!(%message, "trace");
        self.trace.push(message);
    }

    fn pragma_model(&mut self, name: &str) {
        if self.model.is_some() {
            return self.report(DiagCode::ModelAlreadySet, "MODEL may appear only once");
        }
        match name.parse() {
            Ok(model) => self.model = Some(model),
            Err(()) => self.report_token(
                DiagCode::InvalidOperands,
                format!("unknown model {name}"),
                name,
            ),
        }
    }

    fn pragma_rndseed(&mut self, expr: Option<&Expr>) {
        match expr {
            Some(expr) => {
                let Some(seed) = self.eval_immediate_int(expr, "the RNDSEED value") else {
                    return;
                };
                self.reseed(Some(seed as u64));
            }
            None => self.reseed(None),
        }
    }

    fn pragma_includebin(
        &mut self,
        path: &Expr,
        offset: Option<&Expr>,
        length: Option<&Expr>,
    ) {
        let Some(path) = self.eval_path(path, "the INCLUDEBIN path") else {
            return;
        };
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(err) => {
                return self.report(
                    DiagCode::IncludeBinNotFound,
                    format!("cannot read {}: {err}", path.display()),
                );
            }
        };

        let offset = match offset {
            None => 0,
            Some(expr) => match self.eval_immediate_int(expr, "the INCLUDEBIN offset") {
                Some(value) if value >= 0 && (value as usize) <= data.len() => value as usize,
                Some(value) => {
                    return self.report(
                        DiagCode::IncludeBinOffsetOutOfRange,
                        format!("offset {value} is outside the {}-byte file", data.len()),
                    );
                }
                None => return,
            },
        };
        let length = match length {
            None => data.len() - offset,
            Some(expr) => match self.eval_immediate_int(expr, "the INCLUDEBIN length") {
                Some(value) if value >= 0 && offset + value as usize <= data.len() => {
                    value as usize
                }
                Some(value) => {
                    return self.report(
                        DiagCode::IncludeBinLengthOutOfRange,
                        format!("length {value} reaches past the end of the file"),
                    );
                }
                None => return,
            },
        };
        let slice = data[offset..offset + length].to_vec();
        self.emit_bytes(&slice);
    }

    fn pragma_comparebin(&mut self, path: &Expr) {
        let Some(path) = self.eval_path(path, "the COMPAREBIN path") else {
            return;
        };
        self.seg_mut();
        let segment = self.current_segment.expect("just ensured");
        let offset = self.segments[segment].emitted.len();
        let request = CompareBinRequest {
            path,
            segment,
            offset,
            file: self.cur_file,
            line: self.cur_line,
        };
        self.compare_requests.push(request);
    }

    fn pragma_error(&mut self, expr: &Expr) {
        let message = match self.eval_immediate(expr, "the ERROR message") {
            Some(value) => value.to_string(),
            None => return,
        };
        self.report(DiagCode::UserError, message);
    }

    // ---- shared evaluation helpers --------------------------------------

    fn eval_word(&mut self, expr: &Expr, what: &str) -> Option<u16> {
        self.eval_immediate_int(expr, what).map(|value| value as u16)
    }

    fn eval_count(&mut self, expr: &Expr, what: &str) -> Option<usize> {
        match self.eval_immediate_int(expr, what) {
            Some(value) if value >= 0 => Some(value as usize),
            Some(value) => {
                self.report(
                    DiagCode::TypeMismatch,
                    format!("{what} cannot be negative, got {value}"),
                );
                None
            }
            None => None,
        }
    }

    fn eval_path(&mut self, expr: &Expr, what: &str) -> Option<PathBuf> {
        let value = self.eval_immediate(expr, what)?;
        match value.as_str() {
            Some(s) => Some(self.resolve_path(s)),
            None => {
                self.report(
                    DiagCode::TypeMismatch,
                    format!("{what} must be a string"),
                );
                None
            }
        }
    }

    /// Resolves a pragma path relative to the including source file.
    fn resolve_path(&self, relative: &str) -> PathBuf {
        let relative = Path::new(relative);
        if relative.is_absolute() {
            return relative.to_owned();
        }
        match self
            .options
            .source_files
            .get(self.cur_file)
            .and_then(|p| p.parent())
        {
            Some(base) => base.join(relative),
            None => relative.to_owned(),
        }
    }
}

/// Encodes a string the way the Spectrum character set expects.
///
/// Escapes: `\i \p \f \b \I \o \a \t` map to `0x10..0x17`, `\P` is the
/// pound sign, `\C` the copyright sign, `\xHH` a literal byte, `\0` NUL,
/// and `\" \' \\` themselves. An unknown escape emits the character as-is.
pub(crate) fn spectrum_bytes(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut bytes, c);
            continue;
        }
        match chars.next() {
            Some('i') => bytes.push(0x10),
            Some('p') => bytes.push(0x11),
            Some('f') => bytes.push(0x12),
            Some('b') => bytes.push(0x13),
            Some('I') => bytes.push(0x14),
            Some('o') => bytes.push(0x15),
            Some('a') => bytes.push(0x16),
            Some('t') => bytes.push(0x17),
            Some('P') => bytes.push(0x60),
            Some('C') => bytes.push(0x7F),
            Some('0') => bytes.push(0x00),
            Some('x') => {
                let hi = chars.next().and_then(|c| c.to_digit(16));
                let lo = chars.next().and_then(|c| c.to_digit(16));
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    bytes.push(((hi << 4) | lo) as u8);
                }
            }
            Some(other) => push_char(&mut bytes, other),
            None => bytes.push(b'\\'),
        }
    }
    bytes
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

/// Number of bytes a pixel pattern packs into.
pub(crate) fn pixel_byte_len(pattern: &str) -> usize {
    let bits = pattern.chars().filter(|c| !c.is_whitespace()).count();
    (bits + 7) / 8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelAlign {
    Left,
    Right,
}

/// Packs an ASCII pixel pattern into bytes. `.`, `_` and `-` are clear
/// pixels, anything else is set; whitespace separates groups and is
/// ignored.
fn pixel_bytes(pattern: &str, align: PixelAlign) -> Vec<u8> {
    let bits: Vec<bool> = pattern
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| !matches!(c, '.' | '_' | '-'))
        .collect();
    if bits.is_empty() {
        return Vec::new();
    }
    let pad = (8 - bits.len() % 8) % 8;
    let padded: Vec<bool> = match align {
        PixelAlign::Left => bits.into_iter().chain(std::iter::repeat(false).take(pad)).collect(),
        PixelAlign::Right => std::iter::repeat(false).take(pad).chain(bits).collect(),
    };
    padded
        .chunks(8)
        .map(|byte| byte.iter().fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_escapes_map_to_control_bytes() {
        assert_eq!(spectrum_bytes("AB"), vec![0x41, 0x42]);
        assert_eq!(
            spectrum_bytes("\\i\\p\\f\\b\\I\\o\\a\\t"),
            vec![0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17]
        );
        assert_eq!(spectrum_bytes("\\P\\C\\0"), vec![0x60, 0x7F, 0x00]);
        assert_eq!(spectrum_bytes("\\x41\\x0a"), vec![0x41, 0x0A]);
        assert_eq!(spectrum_bytes("\\\"\\'\\\\"), vec![b'"', b'\'', b'\\']);
    }

    #[test]
    fn pixel_patterns_pack_to_bytes() {
        assert_eq!(pixel_bytes("XXXX....", PixelAlign::Left), vec![0xF0]);
        assert_eq!(pixel_bytes("..XX XX..", PixelAlign::Left), vec![0x3C]);
        // Twelve pixels: left alignment pads the tail bits.
        assert_eq!(
            pixel_bytes("XXXXXXXX XXXX", PixelAlign::Left),
            vec![0xFF, 0xF0]
        );
        // Right alignment pads in front instead.
        assert_eq!(
            pixel_bytes("XXXXXXXX XXXX", PixelAlign::Right),
            vec![0x0F, 0xFF]
        );
    }

    #[test]
    fn clear_pixel_characters() {
        assert_eq!(pixel_bytes("._-X", PixelAlign::Left), vec![0x10]);
    }
}
