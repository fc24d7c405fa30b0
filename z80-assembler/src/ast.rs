//! The parsed-line data model consumed by the assembler.
//!
//! The lexer/parser is an external collaborator; it hands the engine an
//! ordered list of [`SourceLine`]s carrying expression ASTs, operand
//! descriptors and statement payloads. The types here are that contract.

use crate::diag::ExpansionError;

use z80_asm::{
    Condition,
    Reg16,
    Reg16Idx,
    Reg16Spec,
    Reg8,
    Reg8Idx,
    Reg8Spec,
};

/// How a symbol reference anchors its lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameRoot {
    /// Plain name; scope and module chains are searched.
    Scoped,
    /// `::`-rooted; resolution starts at the root module.
    Global,
    /// `@`-rooted; only the current module's scopes and symbols.
    Local,
    /// Backtick-prefixed; only the enclosing temporary scope.
    Temporary,
}

/// A (possibly qualified) symbol reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolRef {
    /// Lookup anchor.
    pub root: NameRoot,
    /// `.`-separated path segments; at least one.
    pub segments: Vec<String>,
}

impl SymbolRef {
    /// A plain single-segment reference.
    pub fn plain(name: impl Into<String>) -> Self {
        SymbolRef {
            root: NameRoot::Scoped,
            segments: vec![name.into()],
        }
    }

    /// A reference with an explicit root.
    pub fn rooted(root: NameRoot, name: impl Into<String>) -> Self {
        SymbolRef {
            root,
            segments: vec![name.into()],
        }
    }

    /// A `.`-qualified reference.
    pub fn qualified(segments: Vec<String>) -> Self {
        SymbolRef {
            root: NameRoot::Scoped,
            segments,
        }
    }

    /// The display form, prefix included.
    pub fn display_name(&self) -> String {
        let prefix = match self.root {
            NameRoot::Scoped => "",
            NameRoot::Global => "::",
            NameRoot::Local => "@",
            NameRoot::Temporary => "`",
        };
        format!("{prefix}{}", self.segments.join("."))
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    /// `+e`
    Plus,
    /// `-e`
    Minus,
    /// `~e`
    BitNot,
    /// `!e`
    LogNot,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `&`
    BitAnd,
    /// `^`
    BitXor,
    /// `|`
    BitOr,
    /// `&&`
    LogAnd,
    /// `||`
    LogOr,
}

/// An expression AST node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Real literal.
    Real(f64),
    /// String literal (escape sequences still in source form).
    Str(String),
    /// `$`: the logical current address.
    CurAddress,
    /// `$$`: the current instruction start address.
    CurInstruction,
    /// A symbol reference.
    Symbol(SymbolRef),
    /// A unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// A binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : else`.
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// A built-in function call.
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Shorthand for a plain symbol reference expression.
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(SymbolRef::plain(name))
    }
}

/// Sign of an indexed-address displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sign {
    /// `(IX+d)`
    Plus,
    /// `(IX-d)`
    Minus,
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// `A`, `B`, `C`, `D`, `E`, `H`, `L`.
    Reg8(Reg8),
    /// `XH`, `XL`, `YH`, `YL`.
    Reg8Idx(Reg8Idx),
    /// `I`, `R`.
    Reg8Spec(Reg8Spec),
    /// `BC`, `DE`, `HL`, `SP`.
    Reg16(Reg16),
    /// `IX`, `IY`.
    Reg16Idx(Reg16Idx),
    /// `AF`, `AF'`.
    Reg16Spec(Reg16Spec),
    /// `(BC)`, `(DE)`, `(HL)`, `(SP)`.
    RegIndirect(Reg16),
    /// `(expr)`.
    MemIndirect(Expr),
    /// `(IX±d)` / `(IY±d)`; no displacement means `(IX)`.
    IndexedAddress {
        /// The index register.
        reg: Reg16Idx,
        /// Displacement sign.
        sign: Sign,
        /// Displacement expression, absent for a bare `(IX)`.
        offset: Option<Expr>,
    },
    /// `(C)`.
    CPort,
    /// `NZ`, `Z`, `NC`, `C`, `PO`, `PE`, `P`, `M`.
    Condition(Condition),
    /// An immediate expression.
    Expr(Expr),
}

/// A mnemonic with its operands.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    /// The mnemonic as written.
    pub mnemonic: String,
    /// Zero, one or two operands.
    pub operands: Vec<Operand>,
}

/// Output-shaping and data directives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pragma {
    /// `ORG expr`
    Org(Expr),
    /// `XORG expr`
    Xorg(Expr),
    /// `DISP expr`
    Disp(Expr),
    /// `label EQU expr`
    Equ(Expr),
    /// `label VAR expr` (`=` form included)
    Var(Expr),
    /// `ENT expr`
    Ent(Expr),
    /// `XENT expr`
    Xent(Expr),
    /// `DEFB expr,…`
    DefB(Vec<Expr>),
    /// `DEFW expr,…`
    DefW(Vec<Expr>),
    /// `DEFM`/`DEFN`/`DEFMN`: one pragma parameterised by its terminator
    /// flags.
    DefM {
        /// The string expression.
        text: Expr,
        /// Set the MSB of the last byte.
        bit7_terminator: bool,
        /// Append a zero byte.
        null_terminator: bool,
    },
    /// `DEFH "hex"`
    DefH(Expr),
    /// `DEFS count[,fill]`
    DefS {
        /// Repeat count.
        count: Expr,
        /// Fill byte, default `0`.
        fill: Option<Expr>,
    },
    /// `FILLB count,value`
    FillB {
        /// Repeat count.
        count: Expr,
        /// The byte to repeat.
        value: Expr,
    },
    /// `FILLW count,value`
    FillW {
        /// Repeat count.
        count: Expr,
        /// The little-endian word to repeat.
        value: Expr,
    },
    /// `ALIGN [expr]`, default 256.
    Align(Option<Expr>),
    /// `DEFG pattern` (raw pixel pattern, left-aligned).
    DefG(String),
    /// `DEFGX expr` (string pattern; leading `<`/`>` picks alignment).
    DefGx(Expr),
    /// `SKIP target[,fill]`
    Skip {
        /// Absolute target address.
        target: Expr,
        /// Fill byte, default `0xFF`.
        fill: Option<Expr>,
    },
    /// `TRACE`/`HTRACE expr,…`
    Trace {
        /// Hex-format integers.
        hex: bool,
        /// The message parts.
        exprs: Vec<Expr>,
    },
    /// `MODEL name`
    Model(String),
    /// `RNDSEED [expr]`
    RndSeed(Option<Expr>),
    /// `INCLUDEBIN path[,offset[,length]]`
    IncludeBin {
        /// Path expression (string), relative to the including file.
        path: Expr,
        /// First byte to include.
        offset: Option<Expr>,
        /// Number of bytes to include.
        length: Option<Expr>,
    },
    /// `COMPAREBIN path`
    CompareBin(Expr),
    /// `ERROR expr`
    Error(Expr),
}

/// The head of an `IF` statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IfKind {
    /// `IF expr`
    Expr(Expr),
    /// `IFUSED name`
    Used(SymbolRef),
    /// `IFNUSED name`
    NotUsed(SymbolRef),
    /// `IFDEF name`
    Defined(SymbolRef),
    /// `IFNDEF name`
    NotDefined(SymbolRef),
}

/// Control-flow and block statements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Statement {
    /// `IF …` (all heads).
    If(IfKind),
    /// `ELIF expr`
    Elif(Expr),
    /// `ELSE`
    Else,
    /// `ENDIF`
    Endif,
    /// `LOOP expr`
    Loop(Expr),
    /// `ENDL`
    EndLoop,
    /// `REPEAT`
    Repeat,
    /// `UNTIL expr`
    Until(Expr),
    /// `WHILE expr`
    While(Expr),
    /// `WEND`
    Wend,
    /// `FOR var = from TO to [STEP step]`
    For {
        /// Loop variable name.
        var: String,
        /// Start value.
        from: Expr,
        /// End bound (inclusive in the sign of the step).
        to: Expr,
        /// Step, default 1.
        step: Option<Expr>,
    },
    /// `NEXT`
    Next,
    /// `BREAK`
    Break,
    /// `CONTINUE`
    Continue,
    /// `PROC`
    Proc,
    /// `ENDP`
    Endp,
    /// `LOCAL name,…`
    Local(Vec<String>),
    /// `MODULE [name]` (name may come from the label).
    Module(Option<String>),
    /// `ENDMODULE`
    EndModule,
    /// `label MACRO(param,…)`
    MacroDef(Vec<String>),
    /// `ENDM`
    EndMacro,
    /// `label STRUCT`
    StructDef,
    /// `ENDS`
    EndStruct,
    /// `name(arg,…)` — macro or struct invocation.
    Invocation {
        /// Macro or struct name.
        name: String,
        /// Actual arguments.
        args: Vec<Expr>,
    },
    /// `field = expr` inside a struct invocation.
    FieldAssign {
        /// Field name.
        name: String,
        /// Replacement value.
        expr: Expr,
    },
}

/// The payload of a parsed line.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload {
    /// Label-only or empty line.
    NoInstr,
    /// A directive.
    Pragma(Pragma),
    /// A CPU operation.
    Operation(Operation),
    /// A control-flow statement.
    Statement(Statement),
}

/// The byte span of one `{{name}}` placeholder in a line's source text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroParamSpan {
    /// Parameter name between the braces.
    pub name: String,
    /// Byte offset of `{{`.
    pub start: usize,
    /// Byte offset one past `}}`.
    pub end: usize,
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceLine {
    /// Index of the source file.
    pub file: usize,
    /// 1-based line number.
    pub line: u32,
    /// Leading label, when present.
    pub label: Option<String>,
    /// The original source text of the line.
    pub text: String,
    /// Spans of `{{param}}` placeholders in `text`.
    pub macro_params: Vec<MacroParamSpan>,
    /// A parse-time issue the parser chose to defer to assembly time.
    pub parse_issue: Option<String>,
    /// What the line carries.
    pub payload: Payload,
}

impl SourceLine {
    /// A line with just a payload; coordinates filled by the builder calls.
    pub fn new(file: usize, line: u32, payload: Payload) -> Self {
        SourceLine {
            file,
            line,
            label: None,
            text: String::new(),
            macro_params: Vec::new(),
            parse_issue: None,
            payload,
        }
    }

    /// Attaches a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches the original source text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// Re-parsing hook used by macro invocation.
///
/// The assembler substitutes macro arguments textually and needs the host's
/// lexer/parser to turn the substituted text back into lines. Hosts that
/// never assemble macros can use [`NoExpansion`].
pub trait LineSource {
    /// Parses a block of substituted source text into lines.
    fn parse(&mut self, text: &str) -> Result<Vec<SourceLine>, ExpansionError>;
}

/// A [`LineSource`] that refuses every expansion.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExpansion;

impl LineSource for NoExpansion {
    fn parse(&mut self, _text: &str) -> Result<Vec<SourceLine>, ExpansionError> {
        Err(ExpansionError::Unavailable)
    }
}
