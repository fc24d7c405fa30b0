//! Expression evaluation over the tagged [`Value`] type.
//!
//! Evaluation distinguishes three outcomes: a concrete value, a
//! *non-evaluated* state (some referenced symbol is not defined yet, the
//! caller should record a fixup and retry later), and an *invalid* state
//! (type or arithmetic fault; the caller reports it and substitutes a
//! placeholder).

use crate::{
    ast::{
        BinaryOp,
        Expr,
        SymbolRef,
        UnaryOp,
    },
    diag::DiagCode,
    value::{
        NumericPair,
        Value,
    },
};

/// Result of a symbol lookup during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The symbol has a value.
    Value(Value),
    /// Not defined yet; may resolve later.
    Undefined,
}

/// What the evaluator needs from its surroundings.
pub trait EvalContext {
    /// Resolves a symbol reference, counting the usage.
    fn lookup(&mut self, sym: &SymbolRef) -> Lookup;
    /// The logical current address (`$`).
    fn current_address(&self) -> u16;
    /// The current instruction start address (`$$`).
    fn current_instruction_address(&self) -> u16;
    /// A pseudo-random word from the per-instance generator.
    fn random_word(&mut self) -> u16;
}

/// A fault that makes an expression invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFault {
    /// Diagnostic code to report.
    pub code: DiagCode,
    /// Message to report.
    pub message: String,
}

impl EvalFault {
    fn new(code: DiagCode, message: impl Into<String>) -> Self {
        EvalFault {
            code,
            message: message.into(),
        }
    }

    fn types(message: impl Into<String>) -> Self {
        EvalFault::new(DiagCode::TypeMismatch, message)
    }

    fn string_operand(context: &str) -> Self {
        EvalFault::new(
            DiagCode::StringWhereNumericRequired,
            format!("string operand is not allowed in {context}"),
        )
    }
}

/// Outcome of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Eval {
    /// A concrete value.
    Valid(Value),
    /// At least one referenced symbol is currently undefined; carries the
    /// first such name.
    NonEvaluated(String),
    /// Type or arithmetic fault.
    Invalid(EvalFault),
}

impl Eval {
    /// The value, when the evaluation produced one.
    pub fn value(self) -> Option<Value> {
        match self {
            Eval::Valid(v) => Some(v),
            _ => None,
        }
    }
}

/// Evaluates an expression AST.
pub fn evaluate(expr: &Expr, ctx: &mut dyn EvalContext) -> Eval {
    match expr {
        Expr::Bool(b) => Eval::Valid(Value::Bool(*b)),
        Expr::Int(i) => Eval::Valid(Value::Int(*i)),
        Expr::Real(r) => Eval::Valid(Value::Real(*r)),
        Expr::Str(s) => Eval::Valid(Value::Str(s.clone())),
        Expr::CurAddress => Eval::Valid(Value::from(ctx.current_address())),
        Expr::CurInstruction => Eval::Valid(Value::from(ctx.current_instruction_address())),
        Expr::Symbol(sym) => match ctx.lookup(sym) {
            Lookup::Value(v) => Eval::Valid(v),
            Lookup::Undefined => Eval::NonEvaluated(sym.display_name()),
        },
        Expr::Unary(op, inner) => match evaluate(inner, ctx) {
            Eval::Valid(v) => apply_unary(*op, v),
            other => other,
        },
        Expr::Binary(op, lhs, rhs) => evaluate_binary(*op, lhs, rhs, ctx),
        Expr::Conditional(cond, then, otherwise) => match evaluate(cond, ctx) {
            Eval::Valid(v) if v.is_str() => {
                Eval::Invalid(EvalFault::string_operand("a condition"))
            }
            Eval::Valid(v) => {
                if v.is_truthy() {
                    evaluate(then, ctx)
                } else {
                    evaluate(otherwise, ctx)
                }
            }
            other => other,
        },
        Expr::Call(name, args) => evaluate_call(name, args, ctx),
    }
}

fn evaluate_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, ctx: &mut dyn EvalContext) -> Eval {
    // The logical operators short-circuit on a decided left side.
    if matches!(op, BinaryOp::LogAnd | BinaryOp::LogOr) {
        let left = match evaluate(lhs, ctx) {
            Eval::Valid(v) => v,
            other => return other,
        };
        if left.is_str() {
            return Eval::Invalid(EvalFault::string_operand("a logical operation"));
        }
        let decided = match op {
            BinaryOp::LogAnd => !left.is_truthy(),
            _ => left.is_truthy(),
        };
        if decided {
            return Eval::Valid(Value::Bool(left.is_truthy()));
        }
        return match evaluate(rhs, ctx) {
            Eval::Valid(v) if v.is_str() => {
                Eval::Invalid(EvalFault::string_operand("a logical operation"))
            }
            Eval::Valid(v) => Eval::Valid(Value::Bool(v.is_truthy())),
            other => other,
        };
    }

    let left = match evaluate(lhs, ctx) {
        Eval::Valid(v) => v,
        other => return other,
    };
    let right = match evaluate(rhs, ctx) {
        Eval::Valid(v) => v,
        other => return other,
    };
    match apply_binary(op, left, right) {
        Ok(v) => Eval::Valid(v),
        Err(fault) => Eval::Invalid(fault),
    }
}

fn apply_unary(op: UnaryOp, value: Value) -> Eval {
    let result = match op {
        UnaryOp::Plus => match value {
            Value::Str(_) => Err(EvalFault::string_operand("unary plus")),
            v => Ok(v),
        },
        UnaryOp::Minus => match value {
            Value::Bool(b) => Ok(Value::Int(-i64::from(b))),
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Real(r) => Ok(Value::Real(-r)),
            Value::Str(_) => Err(EvalFault::string_operand("unary minus")),
        },
        UnaryOp::BitNot => match value.as_int() {
            Some(i) => Ok(Value::Int(!i)),
            None => Err(EvalFault::string_operand("bitwise complement")),
        },
        UnaryOp::LogNot => match value {
            Value::Str(_) => Err(EvalFault::string_operand("logical negation")),
            v => Ok(Value::Bool(!v.is_truthy())),
        },
    };
    match result {
        Ok(v) => Eval::Valid(v),
        Err(fault) => Eval::Invalid(fault),
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalFault> {
    use BinaryOp::*;

    match op {
        Add => {
            if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
                return Ok(Value::Str(format!("{a}{b}")));
            }
            numeric(op, &left, &right).map(|pair| match pair {
                NumericPair::Int(a, b) => Value::Int(a.wrapping_add(b)),
                NumericPair::Real(a, b) => Value::Real(a + b),
            })
        }
        Sub => numeric(op, &left, &right).map(|pair| match pair {
            NumericPair::Int(a, b) => Value::Int(a.wrapping_sub(b)),
            NumericPair::Real(a, b) => Value::Real(a - b),
        }),
        Mul => numeric(op, &left, &right).map(|pair| match pair {
            NumericPair::Int(a, b) => Value::Int(a.wrapping_mul(b)),
            NumericPair::Real(a, b) => Value::Real(a * b),
        }),
        Div => match numeric(op, &left, &right)? {
            NumericPair::Int(_, 0) => Err(EvalFault::new(
                DiagCode::DivisionByZero,
                "division by zero",
            )),
            NumericPair::Int(a, b) => Ok(Value::Int(a.wrapping_div(b))),
            NumericPair::Real(_, b) if b == 0.0 => Err(EvalFault::new(
                DiagCode::DivisionByZero,
                "division by zero",
            )),
            NumericPair::Real(a, b) => Ok(Value::Real(a / b)),
        },
        Mod => match numeric(op, &left, &right)? {
            NumericPair::Int(_, 0) => Err(EvalFault::new(
                DiagCode::DivisionByZero,
                "modulo by zero",
            )),
            NumericPair::Int(a, b) => Ok(Value::Int(a.wrapping_rem(b))),
            NumericPair::Real(_, b) if b == 0.0 => Err(EvalFault::new(
                DiagCode::DivisionByZero,
                "modulo by zero",
            )),
            NumericPair::Real(a, b) => Ok(Value::Real(a % b)),
        },
        Shl | Shr | BitAnd | BitXor | BitOr => {
            let (a, b) = match (left.as_int(), right.as_int()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(EvalFault::string_operand("a bitwise operation")),
            };
            let value = match op {
                Shl => {
                    if b < 0 {
                        return Err(EvalFault::types("negative shift count"));
                    }
                    a.wrapping_shl(b as u32)
                }
                Shr => {
                    if b < 0 {
                        return Err(EvalFault::types("negative shift count"));
                    }
                    a.wrapping_shr(b as u32)
                }
                BitAnd => a & b,
                BitXor => a ^ b,
                BitOr => a | b,
                _ => unreachable!(),
            };
            Ok(Value::Int(value))
        }
        Lt | Le | Gt | Ge => {
            if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
                let outcome = match op {
                    Lt => a < b,
                    Le => a <= b,
                    Gt => a > b,
                    _ => a >= b,
                };
                return Ok(Value::Bool(outcome));
            }
            numeric(op, &left, &right).map(|pair| {
                let outcome = match pair {
                    NumericPair::Int(a, b) => match op {
                        Lt => a < b,
                        Le => a <= b,
                        Gt => a > b,
                        _ => a >= b,
                    },
                    NumericPair::Real(a, b) => match op {
                        Lt => a < b,
                        Le => a <= b,
                        Gt => a > b,
                        _ => a >= b,
                    },
                };
                Value::Bool(outcome)
            })
        }
        Eq | Ne => {
            let equal = match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    return Err(EvalFault::types(
                        "cannot compare a string with a numeric value",
                    ));
                }
                _ => match left.promote(&right) {
                    Some(NumericPair::Int(a, b)) => a == b,
                    Some(NumericPair::Real(a, b)) => a == b,
                    None => false,
                },
            };
            Ok(Value::Bool(if matches!(op, Eq) { equal } else { !equal }))
        }
        LogAnd | LogOr => unreachable!("handled by the short-circuit path"),
    }
}

fn numeric(op: BinaryOp, left: &Value, right: &Value) -> Result<NumericPair, EvalFault> {
    left.promote(right)
        .ok_or_else(|| EvalFault::string_operand(&format!("the {op:?} operation").to_lowercase()))
}

fn evaluate_call(name: &str, args: &[Expr], ctx: &mut dyn EvalContext) -> Eval {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match evaluate(arg, ctx) {
            Eval::Valid(v) => values.push(v),
            other => return other,
        }
    }

    let fault_arity = |expected: usize| {
        Eval::Invalid(EvalFault::types(format!(
            "{name}() takes {expected} argument(s), got {}",
            values.len()
        )))
    };

    match name.to_ascii_lowercase().as_str() {
        "abs" => match values.as_slice() {
            [Value::Int(i)] => Eval::Valid(Value::Int(i.wrapping_abs())),
            [Value::Bool(b)] => Eval::Valid(Value::Int(i64::from(*b))),
            [Value::Real(r)] => Eval::Valid(Value::Real(r.abs())),
            [Value::Str(_)] => Eval::Invalid(EvalFault::string_operand("abs()")),
            _ => fault_arity(1),
        },
        "sign" => match values.as_slice() {
            [v] => match v.as_real() {
                Some(r) => Eval::Valid(Value::Int(if r > 0.0 {
                    1
                } else if r < 0.0 {
                    -1
                } else {
                    0
                })),
                None => Eval::Invalid(EvalFault::string_operand("sign()")),
            },
            _ => fault_arity(1),
        },
        "min" | "max" => match values.as_slice() {
            [a, b] => match a.promote(b) {
                Some(NumericPair::Int(x, y)) => Eval::Valid(Value::Int(
                    if (name.eq_ignore_ascii_case("min")) == (x < y) { x } else { y },
                )),
                Some(NumericPair::Real(x, y)) => Eval::Valid(Value::Real(
                    if (name.eq_ignore_ascii_case("min")) == (x < y) { x } else { y },
                )),
                None => Eval::Invalid(EvalFault::string_operand("min()/max()")),
            },
            _ => fault_arity(2),
        },
        "low" => match values.as_slice() {
            [v] => match v.as_int() {
                Some(i) => Eval::Valid(Value::Int(i & 0xFF)),
                None => Eval::Invalid(EvalFault::string_operand("low()")),
            },
            _ => fault_arity(1),
        },
        "high" => match values.as_slice() {
            [v] => match v.as_int() {
                Some(i) => Eval::Valid(Value::Int((i >> 8) & 0xFF)),
                None => Eval::Invalid(EvalFault::string_operand("high()")),
            },
            _ => fault_arity(1),
        },
        "word" => match values.as_slice() {
            [lo, hi] => match (lo.as_int(), hi.as_int()) {
                (Some(lo), Some(hi)) => {
                    Eval::Valid(Value::Int((lo & 0xFF) | ((hi & 0xFF) << 8)))
                }
                _ => Eval::Invalid(EvalFault::string_operand("word()")),
            },
            _ => fault_arity(2),
        },
        "int" => match values.as_slice() {
            [v] => match v.as_int() {
                Some(i) => Eval::Valid(Value::Int(i)),
                None => Eval::Invalid(EvalFault::string_operand("int()")),
            },
            _ => fault_arity(1),
        },
        "frac" => match values.as_slice() {
            [v] => match v.as_real() {
                Some(r) => Eval::Valid(Value::Real(r.fract())),
                None => Eval::Invalid(EvalFault::string_operand("frac()")),
            },
            _ => fault_arity(1),
        },
        "sqrt" => match values.as_slice() {
            [v] => match v.as_real() {
                Some(r) if r >= 0.0 => Eval::Valid(Value::Real(r.sqrt())),
                Some(_) => Eval::Invalid(EvalFault::types("sqrt() of a negative value")),
                None => Eval::Invalid(EvalFault::string_operand("sqrt()")),
            },
            _ => fault_arity(1),
        },
        "length" | "len" => match values.as_slice() {
            [Value::Str(s)] => Eval::Valid(Value::Int(s.chars().count() as i64)),
            [_] => Eval::Invalid(EvalFault::types("length() requires a string")),
            _ => fault_arity(1),
        },
        "left" | "right" => match values.as_slice() {
            [Value::Str(s), count] => match count.as_int() {
                Some(n) if n >= 0 => {
                    let n = n as usize;
                    let taken: String = if name.eq_ignore_ascii_case("left") {
                        s.chars().take(n).collect()
                    } else {
                        let skip = s.chars().count().saturating_sub(n);
                        s.chars().skip(skip).collect()
                    };
                    Eval::Valid(Value::Str(taken))
                }
                _ => Eval::Invalid(EvalFault::types("count must be a non-negative integer")),
            },
            [_, _] => Eval::Invalid(EvalFault::types("left()/right() require a string")),
            _ => fault_arity(2),
        },
        "lcase" => match values.as_slice() {
            [Value::Str(s)] => Eval::Valid(Value::Str(s.to_lowercase())),
            [_] => Eval::Invalid(EvalFault::types("lcase() requires a string")),
            _ => fault_arity(1),
        },
        "ucase" => match values.as_slice() {
            [Value::Str(s)] => Eval::Valid(Value::Str(s.to_uppercase())),
            [_] => Eval::Invalid(EvalFault::types("ucase() requires a string")),
            _ => fault_arity(1),
        },
        "rnd" => match values.as_slice() {
            [] => Eval::Valid(Value::from(ctx.random_word())),
            _ => fault_arity(0),
        },
        _ => Eval::Invalid(EvalFault::types(format!("unknown function {name}()"))),
    }
}
