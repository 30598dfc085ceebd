//! Restricted arithmetic expressions
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := number | reference | '(' expr ')'
//! ```
//!
//! References (`price.last`, `$item.qty`, `rows[0].v`) are leaves; their
//! numeric values are supplied by the caller at evaluation time. Nothing
//! else is accepted: no calls, no property access on results.

use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, multispace0, one_of, satisfy},
    combinator::{all_consuming, cut, map, map_res, recognize},
    error::{context, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::many0,
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded},
    IResult,
};
use thiserror::Error;

/// Maximum parenthesis / unary nesting accepted by the parser
const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithError {
    #[error("invalid arithmetic expression at offset {0}")]
    Syntax(usize),

    #[error("expression nested deeper than {} levels", MAX_NESTING)]
    TooDeep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_char(c: char) -> Self {
        match c {
            '+' => Self::Add,
            '-' => Self::Sub,
            '*' => Self::Mul,
            _ => Self::Div,
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(f64),
    Reference(String),
    Negate(Box<ArithExpr>),
    Binary {
        op: BinaryOp,
        lhs: Box<ArithExpr>,
        rhs: Box<ArithExpr>,
    },
}

/// True if `src` contains an arithmetic operator
pub fn has_operator(src: &str) -> bool {
    src.contains(&['+', '-', '*', '/'][..])
}

// ============================================================================
// Internal Parsers
// ============================================================================

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

fn is_reference_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_reference_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']' | ':')
}

fn nesting_guard(input: &str, depth: usize) -> ParseResult<'_, ()> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(VerboseError::from_error_kind(
            input,
            ErrorKind::TooLarge,
        )));
    }
    Ok((input, ()))
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> ParseResult<'a, O>,
) -> impl FnMut(&'a str) -> ParseResult<'a, O> {
    delimited(multispace0, inner, multispace0)
}

fn fold_binary(first: ArithExpr, rest: Vec<(char, ArithExpr)>) -> ArithExpr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| ArithExpr::Binary {
        op: BinaryOp::from_char(op),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn expr(input: &str, depth: usize) -> ParseResult<'_, ArithExpr> {
    let (input, first) = term(input, depth)?;
    let (input, rest) = many0(pair(ws(one_of("+-")), |i| term(i, depth)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn term(input: &str, depth: usize) -> ParseResult<'_, ArithExpr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(pair(ws(one_of("*/")), |i| unary(i, depth)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn unary(input: &str, depth: usize) -> ParseResult<'_, ArithExpr> {
    let (input, _) = nesting_guard(input, depth)?;
    alt((
        map(preceded(ws(char('-')), |i| unary(i, depth + 1)), |e| {
            ArithExpr::Negate(Box::new(e))
        }),
        preceded(ws(char('+')), |i| unary(i, depth + 1)),
        ws(|i| primary(i, depth)),
    ))(input)
}

fn primary(input: &str, depth: usize) -> ParseResult<'_, ArithExpr> {
    alt((
        map(number, ArithExpr::Number),
        map(reference, |r: &str| ArithExpr::Reference(r.to_string())),
        |i| parenthesized(i, depth),
    ))(input)
}

fn parenthesized(input: &str, depth: usize) -> ParseResult<'_, ArithExpr> {
    let (input, _) = char('(')(input)?;
    let (input, _) = nesting_guard(input, depth + 1)?;
    let (input, inner) = expr(input, depth + 1)?;
    let (input, _) = cut(context("closing parenthesis", char(')')))(input)?;
    Ok((input, inner))
}

fn number(input: &str) -> ParseResult<'_, f64> {
    map_res(recognize_float, str::parse::<f64>)(input)
}

fn reference(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(satisfy(is_reference_start), take_while(is_reference_char)))(input)
}

// ============================================================================
// Public API
// ============================================================================

impl ArithExpr {
    pub fn parse(src: &str) -> Result<Self, ArithError> {
        match all_consuming(|i| expr(i, 0))(src) {
            Ok((_, parsed)) => Ok(parsed),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let too_deep = e
                    .errors
                    .iter()
                    .any(|(_, kind)| matches!(kind, VerboseErrorKind::Nom(ErrorKind::TooLarge)));
                if too_deep {
                    return Err(ArithError::TooDeep);
                }
                // innermost error first; its remaining input locates the fault
                let offset = e
                    .errors
                    .first()
                    .map_or(0, |(rest, _)| src.len() - rest.len());
                Err(ArithError::Syntax(offset))
            }
            Err(nom::Err::Incomplete(_)) => Err(ArithError::Syntax(src.len())),
        }
    }

    /// Evaluate with `resolve` supplying the value of each reference
    pub fn eval(&self, resolve: &mut impl FnMut(&str) -> f64) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Reference(r) => resolve(r),
            Self::Negate(inner) => -inner.eval(resolve),
            Self::Binary { op, lhs, rhs } => {
                let l = lhs.eval(resolve);
                let r = rhs.eval(resolve);
                op.apply(l, r)
            }
        }
    }

    /// References in evaluation order
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Number(_) => {}
            Self::Reference(r) => out.push(r),
            Self::Negate(inner) => inner.collect_references(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_literal(src: &str) -> Result<f64, ArithError> {
        ArithExpr::parse(src).map(|e| e.eval(&mut |_| 0.0))
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(eval_literal("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(eval_literal("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(eval_literal("10 / 4 - 1").unwrap(), 1.5);
        assert_eq!(eval_literal("8 - 3 - 2").unwrap(), 3.0);
        assert_eq!(eval_literal(" ( 2 ) ").unwrap(), 2.0);
    }

    #[test]
    fn test_unary_minus_and_exponent() {
        assert_eq!(eval_literal("-2 * -3").unwrap(), 6.0);
        assert_eq!(eval_literal("1.5e3 + .5").unwrap(), 1500.5);
        assert_eq!(eval_literal("--4").unwrap(), 4.0);
        assert_eq!(eval_literal("2-1").unwrap(), 1.0);
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        assert_eq!(eval_literal("1 / 0").unwrap(), f64::INFINITY);
        assert!(eval_literal("0 / 0").unwrap().is_nan());
    }

    #[test]
    fn test_references_resolved_by_caller() {
        let expr = ArithExpr::parse("a.b + $item.qty * rows[0].v").unwrap();
        assert_eq!(expr.references(), vec!["a.b", "$item.qty", "rows[0].v"]);

        let value = expr.eval(&mut |r| match r {
            "a.b" => 1.0,
            "$item.qty" => 2.0,
            "rows[0].v" => 5.0,
            _ => f64::NAN,
        });
        assert_eq!(value, 11.0);
    }

    #[test]
    fn test_malformed_inputs() {
        for src in ["", "1 +", "(1 + 2", "1 2", "alert(1)", "1 % 2", "1.2.3", "3px * 2", "a.b()"] {
            assert!(
                matches!(ArithExpr::parse(src), Err(ArithError::Syntax(_))),
                "{:?} should not parse",
                src
            );
        }
    }

    #[test]
    fn test_syntax_error_offset() {
        assert_eq!(ArithExpr::parse("1 % 2"), Err(ArithError::Syntax(2)));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval_literal(&deep), Err(ArithError::TooDeep));
        let deep_negation = format!("{}1", "-".repeat(100));
        assert_eq!(eval_literal(&deep_negation), Err(ArithError::TooDeep));

        let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(eval_literal(&shallow), Ok(1.0));
    }

    #[test]
    fn test_has_operator() {
        assert!(has_operator("a+b"));
        assert!(has_operator("-1"));
        assert!(!has_operator("$item[0].name"));
    }
}
