//! Compilation of symbolic expressions into numeric functions.
//!
//! `Expr::compile` resolves every variable to a slot index once and produces a `Lambda`
//! tree that is evaluated without any name lookups. Surface grids, Newton iterations and
//! quadrature all evaluate through this path.

use crate::symbolic::symbolic_engine::Expr;
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("variable '{name}' is not among the arguments {expected:?}")]
    UnknownVariable { name: String, expected: Vec<String> },
}

/// Expression tree with variables resolved to argument positions.
#[derive(Clone, Debug)]
pub enum Lambda {
    Var(usize),
    Const(f64),
    Add(Box<Lambda>, Box<Lambda>),
    Sub(Box<Lambda>, Box<Lambda>),
    Mul(Box<Lambda>, Box<Lambda>),
    Div(Box<Lambda>, Box<Lambda>),
    Pow(Box<Lambda>, Box<Lambda>),
    Exp(Box<Lambda>),
    Ln(Box<Lambda>),
    Sin(Box<Lambda>),
    Cos(Box<Lambda>),
    Tg(Box<Lambda>),
    Ctg(Box<Lambda>),
    ArcSin(Box<Lambda>),
    ArcCos(Box<Lambda>),
    ArcTg(Box<Lambda>),
    ArcCtg(Box<Lambda>),
}

impl Expr {
    /// LAMBDIFICATION - Converting Symbolic Expressions to Executable Functions

    /// Resolves variables against `vars` and builds the evaluation tree.
    ///
    /// Fails if the expression mentions a variable that is not in `vars`.
    pub fn compile(&self, vars: &[&str]) -> Result<Lambda, EvalError> {
        let compile = |e: &Expr| e.compile(vars).map(Box::new);
        let lambda = match self {
            Expr::Var(name) => {
                let idx = vars.iter().position(|&v| v == name).ok_or_else(|| {
                    EvalError::UnknownVariable {
                        name: name.clone(),
                        expected: vars.iter().map(|v| v.to_string()).collect(),
                    }
                })?;
                Lambda::Var(idx)
            }
            Expr::Const(v) => Lambda::Const(*v),
            Expr::Add(a, b) => Lambda::Add(compile(a)?, compile(b)?),
            Expr::Sub(a, b) => Lambda::Sub(compile(a)?, compile(b)?),
            Expr::Mul(a, b) => Lambda::Mul(compile(a)?, compile(b)?),
            Expr::Div(a, b) => Lambda::Div(compile(a)?, compile(b)?),
            Expr::Pow(a, b) => Lambda::Pow(compile(a)?, compile(b)?),
            Expr::Exp(e) => Lambda::Exp(compile(e)?),
            Expr::Ln(e) => Lambda::Ln(compile(e)?),
            Expr::sin(e) => Lambda::Sin(compile(e)?),
            Expr::cos(e) => Lambda::Cos(compile(e)?),
            Expr::tg(e) => Lambda::Tg(compile(e)?),
            Expr::ctg(e) => Lambda::Ctg(compile(e)?),
            Expr::arcsin(e) => Lambda::ArcSin(compile(e)?),
            Expr::arccos(e) => Lambda::ArcCos(compile(e)?),
            Expr::arctg(e) => Lambda::ArcTg(compile(e)?),
            Expr::arcctg(e) => Lambda::ArcCtg(compile(e)?),
        };
        Ok(lambda)
    }

    /// Thread-safe closure of (x, y); used for row-parallel grid evaluation and quadrature.
    pub fn lambdify_xy(&self) -> Result<impl Fn(f64, f64) -> f64 + Send + Sync + use<>, EvalError> {
        let lambda = self.compile(&["x", "y"])?;
        Ok(move |x: f64, y: f64| lambda.eval(&[x, y]))
    }
}

impl Lambda {
    /// Evaluates with positional arguments. IEEE semantics: domain errors yield NaN and
    /// poles yield infinities, they are never reported as errors here.
    ///
    /// `args` must hold one value per variable passed to `compile`.
    #[inline(always)]
    pub(crate) fn eval(&self, args: &[f64]) -> f64 {
        match self {
            Lambda::Var(i) => args[*i],
            Lambda::Const(v) => *v,
            Lambda::Add(a, b) => a.eval(args) + b.eval(args),
            Lambda::Sub(a, b) => a.eval(args) - b.eval(args),
            Lambda::Mul(a, b) => a.eval(args) * b.eval(args),
            Lambda::Div(a, b) => a.eval(args) / b.eval(args),
            Lambda::Pow(a, b) => a.eval(args).powf(b.eval(args)),
            Lambda::Exp(e) => e.eval(args).exp(),
            Lambda::Ln(e) => e.eval(args).ln(),
            Lambda::Sin(e) => e.eval(args).sin(),
            Lambda::Cos(e) => e.eval(args).cos(),
            Lambda::Tg(e) => e.eval(args).tan(),
            Lambda::Ctg(e) => 1.0 / e.eval(args).tan(),
            Lambda::ArcSin(e) => e.eval(args).asin(),
            Lambda::ArcCos(e) => e.eval(args).acos(),
            Lambda::ArcTg(e) => e.eval(args).atan(),
            Lambda::ArcCtg(e) => (PI / 2.0) - e.eval(args).atan(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parse_expr::parse_expression;
    use approx::assert_relative_eq;

    #[test]
    fn test_compile_polynomial() {
        let expr = parse_expression("x^2 + 2*x*y + 1").unwrap();
        let f = expr.compile(&["x", "y"]).unwrap();
        assert_eq!(f.eval(&[3.0, 1.0]), 16.0);
        assert_eq!(expr.lambdify_xy().unwrap()(3.0, 1.0), 16.0);
    }

    #[test]
    fn test_compile_argument_order() {
        let expr = parse_expression("x - y").unwrap();
        let f = expr.compile(&["y", "x"]).unwrap();
        assert_eq!(f.eval(&[1.0, 5.0]), 4.0);
    }

    #[test]
    fn test_lambdify_functions() {
        let expr = parse_expression("sin(x)*cos(y) + exp(0) + acot(1)").unwrap();
        let f = expr.lambdify_xy().unwrap();
        assert_relative_eq!(
            f(PI / 2.0, 0.0),
            2.0 + PI / 4.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let expr = Expr::variable("z") + Expr::variable("x");
        let err = expr.compile(&["x", "y"]).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnknownVariable {
                name: "z".to_string(),
                expected: vec!["x".to_string(), "y".to_string()],
            }
        );
    }

    #[test]
    fn test_domain_errors_are_not_finite() {
        let f = parse_expression("log(x) + 1/y").unwrap().lambdify_xy().unwrap();
        assert!(f(-1.0, 1.0).is_nan());
        assert!(f(1.0, 0.0).is_infinite());
    }
}
