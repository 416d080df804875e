//! Sandboxed arithmetic evaluation
//!
//! Index expressions such as `i-1` or `(lo + hi) // 2` come from the traced
//! program's own source text, so they are never handed to anything that can
//! execute code. This module accepts only:
//!
//! - integer and decimal literals
//! - identifiers, resolved exclusively against the supplied bindings
//! - `+ - * / // %`, unary `+`/`-`, and parentheses
//!
//! Attribute access, subscripts, calls and every other construct fail to
//! lex or parse. Input length and nesting depth are bounded, so evaluation
//! always terminates in time linear in the input.

use crate::trace::{Mapping, Value, ValueKind};
use thiserror::Error;

/// Longest expression accepted, in bytes
pub const MAX_EXPR_LEN: usize = 512;
/// Deepest nesting of parentheses and unary operators accepted
pub const MAX_DEPTH: usize = 64;

/// Why an expression could not be evaluated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("`{name}` is bound to a non-numeric {kind}")]
    NonNumeric { name: String, kind: ValueKind },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("expression nests deeper than {} levels", MAX_DEPTH)]
    TooDeep,

    #[error("expression is longer than {} bytes", MAX_EXPR_LEN)]
    TooLong,
}

impl EvalError {
    /// Errors caused by syntax the sandbox refuses, as opposed to a valid
    /// expression that could not be computed
    pub fn is_rejected_syntax(&self) -> bool {
        matches!(
            self,
            EvalError::UnexpectedChar { .. }
                | EvalError::UnexpectedToken { .. }
                | EvalError::UnexpectedEnd
                | EvalError::TooDeep
                | EvalError::TooLong
        )
    }
}

/// Result of an arithmetic evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(x) => x == 0.0,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(n) => Value::Integer(n),
            Number::Float(x) => Value::Float(x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

/// Parsed arithmetic expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Int(n) => format!("number {}", n),
            Token::Float(x) => format!("number {}", x),
            Token::Ident(name) => format!("identifier `{}`", name),
            Token::Plus => "`+`".into(),
            Token::Minus => "`-`".into(),
            Token::Star => "`*`".into(),
            Token::Slash => "`/`".into(),
            Token::DoubleSlash => "`//`".into(),
            Token::Percent => "`%`".into(),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, EvalError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let c = bytes[pos];
        let token = match c {
            b' ' | b'\t' => {
                pos += 1;
                continue;
            }
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'%' => Token::Percent,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'/' => {
                if bytes.get(pos + 1) == Some(&b'/') {
                    pos += 1;
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            b'0'..=b'9' => {
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                let mut is_float = false;
                if pos < bytes.len() && bytes[pos] == b'.' {
                    is_float = true;
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
                // `3abc`, `1e5`, `1_000` and the like are refused outright
                if pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    return Err(EvalError::UnexpectedChar {
                        ch: bytes[pos] as char,
                        offset: pos,
                    });
                }
                let text = &source[start..pos];
                let token = if is_float {
                    text.parse::<f64>()
                        .map(Token::Float)
                        .map_err(|_| EvalError::UnexpectedToken {
                            found: text.to_string(),
                            offset: start,
                        })?
                } else {
                    text.parse::<i64>().map(Token::Int).map_err(|_| EvalError::Overflow)?
                };
                tokens.push((token, start));
                continue;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                tokens.push((Token::Ident(source[start..pos].to_string()), start));
                continue;
            }
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('\u{FFFD}');
                return Err(EvalError::UnexpectedChar { ch, offset: pos });
            }
        };
        tokens.push((token, start));
        pos += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // term := unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::DoubleSlash) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // unary := ('+' | '-') unary | primary
    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Plus) | Some(Token::Minus) => {
                let negate = matches!(self.peek(), Some(Token::Minus));
                self.pos += 1;
                self.enter()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(if negate { Expr::Neg(Box::new(inner)) } else { inner })
            }
            _ => self.parse_primary(),
        }
    }

    // primary := INT | FLOAT | IDENT | '(' expr ')'
    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Some((Token::Int(n), _)) => Ok(Expr::Int(n)),
            Some((Token::Float(x), _)) => Ok(Expr::Float(x)),
            Some((Token::Ident(name), _)) => Ok(Expr::Var(name)),
            Some((Token::LParen, _)) => {
                self.enter()?;
                let inner = self.parse_expr()?;
                self.depth -= 1;
                match self.next() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, offset)) => Err(EvalError::UnexpectedToken {
                        found: token.describe(),
                        offset,
                    }),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some((token, offset)) => Err(EvalError::UnexpectedToken {
                found: token.describe(),
                offset,
            }),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

impl Expr {
    /// Parse an arithmetic expression, refusing anything outside the sandbox
    pub fn parse(source: &str) -> Result<Self, EvalError> {
        if source.len() > MAX_EXPR_LEN {
            return Err(EvalError::TooLong);
        }
        let mut parser = Parser {
            tokens: tokenize(source)?,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_expr()?;
        match parser.next() {
            None => Ok(expr),
            Some((token, offset)) => Err(EvalError::UnexpectedToken {
                found: token.describe(),
                offset,
            }),
        }
    }

    /// Evaluate against `bindings`; no other names are visible
    pub fn eval(&self, bindings: &Mapping) -> Result<Number, EvalError> {
        match self {
            Expr::Int(n) => Ok(Number::Int(*n)),
            Expr::Float(x) => Ok(Number::Float(*x)),
            Expr::Var(name) => match bindings.get(name) {
                Some(Value::Integer(n)) => Ok(Number::Int(*n)),
                Some(Value::Float(x)) => Ok(Number::Float(*x)),
                Some(other) => Err(EvalError::NonNumeric {
                    name: name.clone(),
                    kind: other.kind(),
                }),
                None => Err(EvalError::UnknownIdentifier(name.clone())),
            },
            Expr::Neg(inner) => match inner.eval(bindings)? {
                Number::Int(n) => n.checked_neg().map(Number::Int).ok_or(EvalError::Overflow),
                Number::Float(x) => Ok(Number::Float(-x)),
            },
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval(bindings)?;
                let rhs = rhs.eval(bindings)?;
                apply(*op, lhs, rhs)
            }
        }
    }
}

fn apply(op: BinOp, lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    if matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) && rhs.is_zero() {
        return Err(EvalError::DivisionByZero);
    }

    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Div => return Ok(Number::Float(a as f64 / b as f64)),
                BinOp::FloorDiv => floor_div(a, b),
                BinOp::Mod => floor_mod(a, b),
            };
            result.map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => {
            let (a, b) = (lhs.as_f64(), rhs.as_f64());
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::FloorDiv => (a / b).floor(),
                BinOp::Mod => {
                    let r = a % b;
                    if r != 0.0 && (r < 0.0) != (b < 0.0) {
                        r + b
                    } else {
                        r
                    }
                }
            };
            Ok(Number::Float(result))
        }
    }
}

/// Division rounding towards negative infinity
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Remainder taking the sign of the divisor
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

/// Parse and evaluate in one step
pub fn evaluate(source: &str, bindings: &Mapping) -> Result<Number, EvalError> {
    Expr::parse(source.trim())?.eval(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> Mapping {
        vec![
            ("i".to_string(), Value::Integer(4)),
            ("lo".to_string(), Value::Integer(-7)),
            ("half".to_string(), Value::Float(0.5)),
            ("name".to_string(), Value::from("dp")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_basic_arithmetic() {
        let b = bindings();
        assert_eq!(evaluate("i-1", &b), Ok(Number::Int(3)));
        assert_eq!(evaluate("i - 2 * 3", &b), Ok(Number::Int(-2)));
        assert_eq!(evaluate("(i - 2) * 3", &b), Ok(Number::Int(6)));
        assert_eq!(evaluate("-i + +2", &b), Ok(Number::Int(-2)));
        assert_eq!(evaluate("i / 2", &b), Ok(Number::Float(2.0)));
        assert_eq!(evaluate("i * half", &b), Ok(Number::Float(2.0)));
    }

    #[test]
    fn test_floor_semantics() {
        let b = bindings();
        assert_eq!(evaluate("lo // 2", &b), Ok(Number::Int(-4)));
        assert_eq!(evaluate("lo % 3", &b), Ok(Number::Int(2)));
        assert_eq!(evaluate("7 % -3", &b), Ok(Number::Int(-2)));
        assert_eq!(evaluate("7.0 // 2", &b), Ok(Number::Float(3.0)));
    }

    #[test]
    fn test_runtime_failures() {
        let b = bindings();
        assert_eq!(evaluate("i // 0", &b), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("i % 0.0", &b), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("j + 1", &b), Err(EvalError::UnknownIdentifier("j".into())));
        assert!(matches!(evaluate("name", &b), Err(EvalError::NonNumeric { .. })));
        assert_eq!(evaluate("9223372036854775807 + 1", &b), Err(EvalError::Overflow));
    }

    #[test]
    fn test_sandbox_rejects_non_arithmetic() {
        let b = bindings();
        for source in [
            "__import__('os')",
            "i.real",
            "len(i)",
            "dp[i]",
            "i ** 2",
            "i if i else 0",
            "i == 4",
            "lambda: 0",
            "1e5",
            "",
            "(i",
            "i)",
        ] {
            let err = evaluate(source, &b).unwrap_err();
            assert!(err.is_rejected_syntax(), "{:?} should be rejected, got {:?}", source, err);
        }
    }

    #[test]
    fn test_limits() {
        let b = bindings();
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(evaluate(&deep, &b), Err(EvalError::TooDeep));

        let negations = format!("{}1", "-".repeat(MAX_DEPTH + 1));
        assert_eq!(evaluate(&negations, &b), Err(EvalError::TooDeep));

        let long = "1+".repeat(MAX_EXPR_LEN) + "1";
        assert_eq!(evaluate(&long, &b), Err(EvalError::TooLong));

        let ok = format!("{}i{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(evaluate(&ok, &b), Ok(Number::Int(4)));
    }
}
