//! # Symbolic Engine Derivatives Module
//!
//! Analytical differentiation of `Expr` and the gradient of f(x, y).
//!
//! ## Key Methods
//! - `diff(var)` - partial derivative, returned unsimplified
//! - `Gradient::of(f)` - both simplified partials of f(x, y)
//! - `Gradient::at(x, y)` - numeric gradient with per-component `Outcome`s
//!
//! Differentiation is total over the grammar: every variant has a rule, so the only
//! way to fail is upstream, in the parser.

use crate::outcome::Outcome;
use crate::symbolic::symbolic_engine::Expr;
use std::collections::HashMap;

impl Expr {
    /// DIFFERENTIATION

    /// Computes the analytical derivative of the expression with respect to a variable.
    ///
    /// Implements the standard rules:
    /// - Power rule: d/dx(u^n) = n*u^(n-1)*u' for exponents free of `var`
    /// - General power: d/dx(u^v) = u^v*(v'*ln(u) + v*u'/u)
    /// - Product rule: d/dx(f*g) = f'*g + f*g'
    /// - Quotient rule: d/dx(f/g) = (f'*g - f*g')/g^2
    /// - Chain rule for every elementary function
    ///
    /// # Examples
    /// ```rust, ignore
    /// let x = Expr::Var("x".to_string());
    /// let f = x.clone().pow(Expr::Const(2.0)); // x^2
    /// let df_dx = f.diff("x").simplify(); // 2*x
    /// ```
    pub fn diff(&self, var: &str) -> Expr {
        match self {
            Expr::Var(name) => {
                if name == var {
                    Expr::Const(1.0)
                } else {
                    Expr::Const(0.0)
                }
            }
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Add(lhs, rhs) => Expr::Add(Box::new(lhs.diff(var)), Box::new(rhs.diff(var))),
            Expr::Sub(lhs, rhs) => Expr::Sub(Box::new(lhs.diff(var)), Box::new(rhs.diff(var))),
            Expr::Mul(lhs, rhs) => Expr::Add(
                Box::new(Expr::Mul(Box::new(lhs.diff(var)), rhs.clone())),
                Box::new(Expr::Mul(lhs.clone(), Box::new(rhs.diff(var)))),
            ),
            Expr::Div(lhs, rhs) => Expr::Div(
                Box::new(Expr::Sub(
                    Box::new(Expr::Mul(Box::new(lhs.diff(var)), rhs.clone())),
                    Box::new(Expr::Mul(lhs.clone(), Box::new(rhs.diff(var)))),
                )),
                Box::new(Expr::Pow(rhs.clone(), Box::new(Expr::Const(2.0)))),
            ),
            Expr::Pow(base, exp) if !exp.contains_variable(var) => Expr::Mul(
                Box::new(Expr::Mul(
                    exp.clone(),
                    Box::new(Expr::Pow(
                        base.clone(),
                        Box::new(Expr::Sub(exp.clone(), Box::new(Expr::Const(1.0)))),
                    )),
                )),
                Box::new(base.diff(var)),
            ),
            Expr::Pow(base, exp) => Expr::Mul(
                Box::new(self.clone()),
                Box::new(Expr::Add(
                    Box::new(Expr::Mul(
                        Box::new(exp.diff(var)),
                        Box::new(Expr::Ln(base.clone())),
                    )),
                    Box::new(Expr::Div(
                        Box::new(Expr::Mul(exp.clone(), Box::new(base.diff(var)))),
                        base.clone(),
                    )),
                )),
            ),
            Expr::Exp(expr) => {
                Expr::Mul(Box::new(Expr::Exp(expr.clone())), Box::new(expr.diff(var)))
            }
            Expr::Ln(expr) => Expr::Div(Box::new(expr.diff(var)), expr.clone()),
            Expr::sin(expr) => {
                Expr::Mul(Box::new(Expr::cos(expr.clone())), Box::new(expr.diff(var)))
            }
            Expr::cos(expr) => Expr::Mul(
                Box::new(Expr::Mul(
                    Box::new(Expr::Const(-1.0)),
                    Box::new(Expr::sin(expr.clone())),
                )),
                Box::new(expr.diff(var)),
            ),
            Expr::tg(expr) => Expr::Div(
                Box::new(expr.diff(var)),
                Box::new(Expr::Pow(
                    Box::new(Expr::cos(expr.clone())),
                    Box::new(Expr::Const(2.0)),
                )),
            ),
            Expr::ctg(expr) => Expr::Div(
                Box::new(Expr::Mul(
                    Box::new(Expr::Const(-1.0)),
                    Box::new(expr.diff(var)),
                )),
                Box::new(Expr::Pow(
                    Box::new(Expr::sin(expr.clone())),
                    Box::new(Expr::Const(2.0)),
                )),
            ),
            Expr::arcsin(expr) => Expr::Div(
                Box::new(expr.diff(var)),
                Box::new(Expr::Pow(
                    Box::new(Expr::Sub(
                        Box::new(Expr::Const(1.0)),
                        Box::new(Expr::Pow(expr.clone(), Box::new(Expr::Const(2.0)))),
                    )),
                    Box::new(Expr::Const(0.5)),
                )),
            ),
            Expr::arccos(expr) => Expr::Div(
                Box::new(Expr::Mul(
                    Box::new(Expr::Const(-1.0)),
                    Box::new(expr.diff(var)),
                )),
                Box::new(Expr::Pow(
                    Box::new(Expr::Sub(
                        Box::new(Expr::Const(1.0)),
                        Box::new(Expr::Pow(expr.clone(), Box::new(Expr::Const(2.0)))),
                    )),
                    Box::new(Expr::Const(0.5)),
                )),
            ),
            Expr::arctg(expr) => Expr::Div(
                Box::new(expr.diff(var)),
                Box::new(Expr::Add(
                    Box::new(Expr::Const(1.0)),
                    Box::new(Expr::Pow(expr.clone(), Box::new(Expr::Const(2.0)))),
                )),
            ),
            Expr::arcctg(expr) => Expr::Div(
                Box::new(Expr::Mul(
                    Box::new(Expr::Const(-1.0)),
                    Box::new(expr.diff(var)),
                )),
                Box::new(Expr::Add(
                    Box::new(Expr::Const(1.0)),
                    Box::new(Expr::Pow(expr.clone(), Box::new(Expr::Const(2.0)))),
                )),
            ),
        }
    }

    /// Simplified partial derivatives with respect to each variable in `vars`.
    pub fn diff_multi(&self, vars: &[&str]) -> Vec<Expr> {
        vars.iter().map(|var| self.diff(var).simplify()).collect()
    }

    /// Substitutes (x, y) and folds the result to a number.
    ///
    /// Returns `Degenerate` with value 0.0 when the substitution does not reduce to a finite
    /// constant (a singularity at the point, or a branch of a function outside its domain).
    pub fn substitute_point(&self, x: f64, y: f64) -> Outcome<f64> {
        let mut point = HashMap::new();
        point.insert("x".to_string(), x);
        point.insert("y".to_string(), y);
        match self.set_variable_from_map(&point).simplify() {
            Expr::Const(value) => Outcome::from_scalar(value, 0.0),
            other => Outcome::degenerate(
                0.0,
                format!("'{}' does not reduce to a number at ({}, {})", other, x, y),
            ),
        }
    }
}

/// Symbolic gradient of f(x, y).
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub partial_x: Expr,
    pub partial_y: Expr,
}

/// Gradient evaluated at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientAt {
    pub x: Outcome<f64>,
    pub y: Outcome<f64>,
    /// Euclidean norm of the reported components (degenerate components count as 0.0)
    pub magnitude: f64,
}

impl Gradient {
    pub fn of(function: &Expr) -> Self {
        let mut partials = function.diff_multi(&["x", "y"]).into_iter();
        let partial_x = partials.next().unwrap_or(Expr::Const(0.0));
        let partial_y = partials.next().unwrap_or(Expr::Const(0.0));
        Gradient {
            partial_x,
            partial_y,
        }
    }

    pub fn at(&self, x: f64, y: f64) -> GradientAt {
        let gx = self.partial_x.substitute_point(x, y);
        let gy = self.partial_y.substitute_point(x, y);
        let magnitude = gx.value_or(0.0).hypot(gy.value_or(0.0));
        GradientAt {
            x: gx,
            y: gy,
            magnitude,
        }
    }
}
