//! Parser from user text to `Expr`, built on nom combinators.
//!
//! Grammar (lowest to highest precedence):
//! ```text
//! expression := product (('+' | '-') product)*
//! product    := unary (('*' | '/') unary)*
//! unary      := ('-' | '+') unary | power
//! power      := atom (('^' | '**') unary)?        right associative
//! atom       := number | '(' expression ')' | function '(' expression ')' | x | y | pi | e
//! ```
//! Both `^` and the Python-style `**` are accepted for exponentiation.
//!
//! Input longer than `MAX_EXPRESSION_LENGTH` bytes or nesting signs, parentheses, calls and
//! exponents deeper than `MAX_NESTING_DEPTH` is rejected, so every later tree walk stays shallow.

use crate::symbolic::symbolic_engine::Expr;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{cut, map, map_res, not, opt, recognize},
    error::{ErrorKind, FromExternalError, ParseError as NomParseError},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use std::f64::consts::{E, PI};
use std::str::FromStr;
use strum_macros::{EnumIter, EnumString};
use thiserror::Error;

/// Longest accepted expression, in bytes.
pub const MAX_EXPRESSION_LENGTH: usize = 512;
/// Deepest accepted nesting of unary signs, parentheses, function calls and exponents.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Why a string could not be turned into an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("unbalanced parentheses: {0}")]
    UnbalancedParentheses(String),
    #[error("unknown identifier '{name}' at position {position} (variables are x and y)")]
    UnknownIdentifier { name: String, position: usize },
    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("unexpected input at position {position}: '{fragment}'")]
    UnexpectedInput { position: usize, fragment: String },
    #[error("expression is {length} bytes long, the limit is {limit}")]
    TooLong { length: usize, limit: usize },
    #[error("expression is nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Named functions accepted in expressions, with their aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter)]
pub enum ElementaryFunction {
    #[strum(serialize = "sin")]
    Sin,
    #[strum(serialize = "cos")]
    Cos,
    #[strum(serialize = "tan", serialize = "tg")]
    Tan,
    #[strum(serialize = "cot", serialize = "ctg")]
    Cot,
    #[strum(serialize = "asin", serialize = "arcsin")]
    Asin,
    #[strum(serialize = "acos", serialize = "arccos")]
    Acos,
    #[strum(serialize = "atan", serialize = "arctan", serialize = "arctg")]
    Atan,
    #[strum(serialize = "acot", serialize = "arccot", serialize = "arcctg")]
    Acot,
    #[strum(serialize = "exp")]
    Exp,
    #[strum(serialize = "log", serialize = "ln")]
    Ln,
    #[strum(serialize = "log10")]
    Log10,
    #[strum(serialize = "sqrt")]
    Sqrt,
    #[strum(serialize = "sinh")]
    Sinh,
    #[strum(serialize = "cosh")]
    Cosh,
    #[strum(serialize = "tanh")]
    Tanh,
}

impl ElementaryFunction {
    pub fn name(self) -> &'static str {
        match self {
            ElementaryFunction::Sin => "sin",
            ElementaryFunction::Cos => "cos",
            ElementaryFunction::Tan => "tan",
            ElementaryFunction::Cot => "cot",
            ElementaryFunction::Asin => "asin",
            ElementaryFunction::Acos => "acos",
            ElementaryFunction::Atan => "atan",
            ElementaryFunction::Acot => "acot",
            ElementaryFunction::Exp => "exp",
            ElementaryFunction::Ln => "log",
            ElementaryFunction::Log10 => "log10",
            ElementaryFunction::Sqrt => "sqrt",
            ElementaryFunction::Sinh => "sinh",
            ElementaryFunction::Cosh => "cosh",
            ElementaryFunction::Tanh => "tanh",
        }
    }

    /// Builds the expression tree for `self(arg)`.
    pub fn apply(self, arg: Expr) -> Expr {
        match self {
            ElementaryFunction::Sin => Expr::sin(arg.boxed()),
            ElementaryFunction::Cos => Expr::cos(arg.boxed()),
            ElementaryFunction::Tan => Expr::tg(arg.boxed()),
            ElementaryFunction::Cot => Expr::ctg(arg.boxed()),
            ElementaryFunction::Asin => Expr::arcsin(arg.boxed()),
            ElementaryFunction::Acos => Expr::arccos(arg.boxed()),
            ElementaryFunction::Atan => Expr::arctg(arg.boxed()),
            ElementaryFunction::Acot => Expr::arcctg(arg.boxed()),
            ElementaryFunction::Exp => arg.exp(),
            ElementaryFunction::Ln => arg.ln(),
            ElementaryFunction::Log10 => arg.log10(),
            ElementaryFunction::Sqrt => arg.sqrt(),
            // sinh(u) = (e^u - e^-u)/2
            ElementaryFunction::Sinh => {
                (arg.clone().exp() - (-arg).exp()) / Expr::Const(2.0)
            }
            // cosh(u) = (e^u + e^-u)/2
            ElementaryFunction::Cosh => {
                (arg.clone().exp() + (-arg).exp()) / Expr::Const(2.0)
            }
            // tanh(u) = (e^2u - 1)/(e^2u + 1)
            ElementaryFunction::Tanh => {
                let e2u = (Expr::Const(2.0) * arg).exp();
                (e2u.clone() - Expr::Const(1.0)) / (e2u + Expr::Const(1.0))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SyntaxErrorKind {
    Nom(ErrorKind),
    UnknownIdentifier(String),
    UnknownFunction(String),
    TooDeep,
}

/// nom error carrying the remaining input, so the position can be recovered.
#[derive(Debug, Clone, PartialEq)]
struct SyntaxError<'a> {
    input: &'a str,
    kind: SyntaxErrorKind,
}

impl<'a> SyntaxError<'a> {
    fn new(input: &'a str, kind: SyntaxErrorKind) -> Self {
        SyntaxError { input, kind }
    }

    fn into_parse_error(self, source: &str) -> ParseError {
        let position = source.len() - self.input.len();
        match self.kind {
            SyntaxErrorKind::UnknownIdentifier(name) => {
                ParseError::UnknownIdentifier { name, position }
            }
            SyntaxErrorKind::UnknownFunction(name) => ParseError::UnknownFunction { name, position },
            SyntaxErrorKind::TooDeep => ParseError::TooDeep {
                limit: MAX_NESTING_DEPTH,
            },
            SyntaxErrorKind::Nom(_) => unexpected_input(source, self.input),
        }
    }
}

impl<'a> NomParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        SyntaxError::new(input, SyntaxErrorKind::Nom(kind))
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    // report the alternative that got furthest into the input
    fn or(self, other: Self) -> Self {
        if other.input.len() < self.input.len() {
            other
        } else {
            self
        }
    }
}

impl<'a, E> FromExternalError<&'a str, E> for SyntaxError<'a> {
    fn from_external_error(input: &'a str, kind: ErrorKind, _e: E) -> Self {
        SyntaxError::new(input, SyntaxErrorKind::Nom(kind))
    }
}

type PResult<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

fn unexpected_input(source: &str, rest: &str) -> ParseError {
    let trimmed = rest.trim_start();
    let position = source.len() - trimmed.len();
    let fragment: String = if trimmed.is_empty() {
        "end of input".to_string()
    } else {
        trimmed.chars().take(16).collect()
    };
    ParseError::UnexpectedInput { position, fragment }
}

fn check_parentheses(input: &str) -> Result<(), ParseError> {
    let mut depth: usize = 0;
    for (position, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Err(ParseError::UnbalancedParentheses(format!(
                        "unmatched ')' at position {}",
                        position
                    )));
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(ParseError::UnbalancedParentheses(format!(
            "{} unclosed '('",
            depth
        )));
    }
    Ok(())
}

fn number(input: &str) -> PResult<'_, Expr> {
    let mut parser = map_res(
        recognize((
            alt((
                recognize((digit1, opt((char('.'), digit0)))),
                recognize((char('.'), digit1)),
            )),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        // 1e999 would become inf, which Display cannot write back
        |text: &str| match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Expr::Const(value)),
            _ => Err(ErrorKind::Float),
        },
    );
    parser.parse(input)
}

fn identifier(input: &str) -> PResult<'_, &str> {
    let mut parser = recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ));
    parser.parse(input)
}

/// variable, constant or function call
fn named_term<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let (rest, name) = identifier(input)?;
    let (after_space, _) = multispace0::<&str, SyntaxError<'_>>(rest)?;
    let open: PResult<'_, char> = char('(').parse(after_space);
    if let Ok((after_paren, _)) = open {
        let function = ElementaryFunction::from_str(name).map_err(|_| {
            nom::Err::Failure(SyntaxError::new(
                input,
                SyntaxErrorKind::UnknownFunction(name.to_string()),
            ))
        })?;
        let (rest, argument) =
            cut(terminated(|i: &'a str| expression(i, depth), char(')'))).parse(after_paren)?;
        return Ok((rest, function.apply(argument)));
    }
    let expr = match name {
        "x" | "y" => Expr::variable(name),
        "pi" => Expr::Const(PI),
        "e" | "E" => Expr::Const(E),
        _ => {
            return Err(nom::Err::Failure(SyntaxError::new(
                input,
                SyntaxErrorKind::UnknownIdentifier(name.to_string()),
            )));
        }
    };
    Ok((rest, expr))
}

fn parenthesized<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let mut parser = preceded(
        char('('),
        cut(terminated(|i: &'a str| expression(i, depth), char(')'))),
    );
    parser.parse(input)
}

fn atom<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let mut parser = delimited(
        multispace0,
        alt((
            number,
            |i: &'a str| parenthesized(i, depth),
            |i: &'a str| named_term(i, depth),
        )),
        multispace0,
    );
    parser.parse(input)
}

fn power<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let mut parser = pair(
        |i: &'a str| atom(i, depth),
        opt(preceded(
            delimited(multispace0, alt((tag("**"), tag("^"))), multispace0),
            cut(|i: &'a str| unary(i, depth)),
        )),
    );
    let (input, (base, exponent)) = parser.parse(input)?;
    let expr = match exponent {
        Some(exponent) => base.pow(exponent),
        None => base,
    };
    Ok((input, expr))
}

/// Every nested sign, group, call or exponent passes through here once, one level deeper.
fn unary<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    if depth > MAX_NESTING_DEPTH {
        return Err(nom::Err::Failure(SyntaxError::new(
            input,
            SyntaxErrorKind::TooDeep,
        )));
    }
    let inner = depth + 1;
    let negation = map(
        preceded(char('-'), cut(move |i: &'a str| unary(i, inner))),
        |expr| match expr {
            Expr::Const(value) => Expr::Const(-value),
            other => -other,
        },
    );
    let plus = preceded(char('+'), cut(move |i: &'a str| unary(i, inner)));
    let mut parser = preceded(
        multispace0,
        alt((negation, plus, move |i: &'a str| power(i, inner))),
    );
    parser.parse(input)
}

fn product<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let operator = delimited(
        multispace0,
        alt((terminated(char('*'), not(char('*'))), char('/'))),
        multispace0,
    );
    let mut parser = pair(
        |i: &'a str| unary(i, depth),
        many0(pair(operator, cut(|i: &'a str| unary(i, depth)))),
    );
    let (input, (first, rest)) = parser.parse(input)?;
    let expr = rest.into_iter().fold(first, |acc, (op, rhs)| match op {
        '*' => acc * rhs,
        _ => acc / rhs,
    });
    Ok((input, expr))
}

fn expression<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let operator = delimited(multispace0, one_of("+-"), multispace0);
    let mut parser = pair(
        |i: &'a str| product(i, depth),
        many0(pair(operator, cut(|i: &'a str| product(i, depth)))),
    );
    let (input, (first, rest)) = parser.parse(input)?;
    let expr = rest.into_iter().fold(first, |acc, (op, rhs)| match op {
        '+' => acc + rhs,
        _ => acc - rhs,
    });
    Ok((input, expr))
}

/// Parses `input` into an expression over the variables `x` and `y`.
///
/// # Examples
/// ```rust, ignore
/// let f = parse_expression("x**2 + y**2").unwrap();
/// assert_eq!(f.to_string(), "x^2 + y^2");
/// ```
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    if input.len() > MAX_EXPRESSION_LENGTH {
        return Err(ParseError::TooLong {
            length: input.len(),
            limit: MAX_EXPRESSION_LENGTH,
        });
    }
    check_parentheses(input)?;
    match expression(input, 0) {
        Ok((rest, expr)) if rest.trim().is_empty() => Ok(expr),
        Ok((rest, _)) => Err(unexpected_input(input, rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_parse_error(input)),
        Err(nom::Err::Incomplete(_)) => Err(unexpected_input(input, "")),
    }
}

impl Expr {
    /// `parse_expression` as an associated function.
    pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
        parse_expression(input)
    }
}
