//! # Symbolic Integration Module
//!
//! Antiderivatives by pattern rules and iterated definite integrals over a rectangle.
//!
//! Supported patterns (u is linear in the integration variable, u' = a is a nonzero constant):
//! - constants and factors free of the variable
//! - sums and differences
//! - monomials and their products: x^m * x^n
//! - u^n, 1/u, c^u
//! - exp(u), ln(u), sin(u), cos(u), tan(u), cot(u)
//! - arcsin(u), arccos(u), arctan(u), arccot(u)
//! - x^n * exp(u) and x^n * ln(x) (integration by parts)
//!
//! Anything else is reported as `SymbolicIntegrationError::NoRule` so callers can fall back
//! to numerical quadrature. The rules recurse structurally on the tree and always terminate.
//!
//! F(b) - F(a) is only taken when the integrand is bounded on [a, b]: a pole of a denominator,
//! a negative power, tan or cot inside the interval is reported as `Unbounded`.

use crate::symbolic::symbolic_engine::Expr;
use std::f64::consts::{FRAC_PI_2, PI};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SymbolicIntegrationError {
    #[error("no antiderivative rule for '{expr}' with respect to {var}")]
    NoRule { expr: String, var: String },
    #[error("symbolic result '{0}' does not reduce to a finite number")]
    NotFinite(String),
    #[error("'{expr}' is unbounded for {var} in [{lower}, {upper}]")]
    Unbounded {
        expr: String,
        var: String,
        lower: f64,
        upper: f64,
    },
}

/// Subexpression that can make the integrand unbounded.
enum Singularity<'a> {
    /// base^(-order) with order > 0, unbounded where base = 0
    Pole { base: &'a Expr, order: f64 },
    /// tan or cot of `argument`, unbounded where argument = offset + kπ
    Periodic { argument: &'a Expr, offset: f64 },
}

fn collect_singularities<'a>(expr: &'a Expr, var: &str, found: &mut Vec<Singularity<'a>>) {
    if !expr.contains_variable(var) {
        return;
    }
    match expr {
        Expr::Var(_) | Expr::Const(_) => {}
        Expr::Div(lhs, rhs) => {
            if rhs.contains_variable(var) {
                found.push(match rhs.as_ref() {
                    Expr::Pow(base, exp) if exp.as_const().is_some_and(|n| n > 0.0) => {
                        Singularity::Pole {
                            base,
                            order: exp.as_const().unwrap_or(1.0),
                        }
                    }
                    denominator => Singularity::Pole {
                        base: denominator,
                        order: 1.0,
                    },
                });
            }
            collect_singularities(lhs, var, found);
            collect_singularities(rhs, var, found);
        }
        Expr::Pow(base, exp) => {
            if let Some(n) = exp.as_const() {
                if n < 0.0 && base.contains_variable(var) {
                    found.push(Singularity::Pole { base, order: -n });
                }
            }
            collect_singularities(base, var, found);
            collect_singularities(exp, var, found);
        }
        Expr::Add(lhs, rhs) | Expr::Sub(lhs, rhs) | Expr::Mul(lhs, rhs) => {
            collect_singularities(lhs, var, found);
            collect_singularities(rhs, var, found);
        }
        Expr::tg(argument) => {
            found.push(Singularity::Periodic {
                argument,
                offset: FRAC_PI_2,
            });
            collect_singularities(argument, var, found);
        }
        Expr::ctg(argument) => {
            found.push(Singularity::Periodic {
                argument,
                offset: 0.0,
            });
            collect_singularities(argument, var, found);
        }
        Expr::Exp(inner)
        | Expr::Ln(inner)
        | Expr::sin(inner)
        | Expr::cos(inner)
        | Expr::arcsin(inner)
        | Expr::arccos(inner)
        | Expr::arctg(inner)
        | Expr::arcctg(inner) => collect_singularities(inner, var, found),
    }
}

/// (a, b) with expr = a*var + b, when var is its only variable.
fn linear_parts(expr: &Expr, var: &str) -> Option<(f64, f64)> {
    if expr.all_arguments_are_variables() != [var] {
        return None;
    }
    let a = expr.linear_coefficient(var)?;
    let b = expr.set_variable(var, 0.0).simplify().as_const()?;
    b.is_finite().then_some((a, b))
}

fn near(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * (1.0 + a.abs().max(b.abs()))
}

/// true when the singularity can lie in [lower, upper]. An endpoint pole of order below 1
/// is integrable and does not count. Unknown positions count.
fn hits_interval(singularity: &Singularity, var: &str, lower: f64, upper: f64) -> bool {
    let argument = match singularity {
        Singularity::Pole { base, .. } => base,
        Singularity::Periodic { argument, .. } => argument,
    };
    let Some((a, b)) = linear_parts(argument, var) else {
        return true;
    };
    match singularity {
        Singularity::Pole { order, .. } => {
            let root = -b / a;
            if near(root, lower) || near(root, upper) {
                *order >= 1.0
            } else {
                lower < root && root < upper
            }
        }
        Singularity::Periodic { offset, .. } => {
            let (u0, u1) = (a * lower + b, a * upper + b);
            let (u_lo, u_hi) = (u0.min(u1), u0.max(u1));
            let k = ((u_lo - offset) / PI).ceil();
            let first_pole = offset + k * PI;
            first_pole <= u_hi || near(first_pole, u_hi) || near(first_pole - PI, u_lo)
        }
    }
}


fn no_rule(expr: &Expr, var: &str) -> SymbolicIntegrationError {
    SymbolicIntegrationError::NoRule {
        expr: expr.to_string(),
        var: var.to_string(),
    }
}

/// `expr / a`, leaving `expr` alone when a == 1
fn over(expr: Expr, a: f64) -> Expr {
    if a == 1.0 {
        expr
    } else {
        expr / Expr::Const(a)
    }
}

impl Expr {
    /// SYMBOLIC INTEGRATION

    /// Indefinite integral with respect to `var`, without the constant of integration.
    pub fn integrate(&self, var: &str) -> Result<Expr, SymbolicIntegrationError> {
        // ∫ c dx = c*x, where c may depend on other variables
        if !self.contains_variable(var) {
            return Ok(self.clone() * Expr::variable(var));
        }
        match self {
            // ∫ x dx = x²/2
            Expr::Var(_) => Ok(Expr::variable(var).pow(Expr::Const(2.0)) / Expr::Const(2.0)),
            Expr::Add(lhs, rhs) => Ok(lhs.integrate(var)? + rhs.integrate(var)?),
            Expr::Sub(lhs, rhs) => Ok(lhs.integrate(var)? - rhs.integrate(var)?),
            Expr::Mul(lhs, rhs) => self.integrate_multiplication(lhs, rhs, var),
            Expr::Div(lhs, rhs) => self.integrate_division(lhs, rhs, var),
            Expr::Pow(base, exp) => self.integrate_power(base, exp, var),
            Expr::Exp(u) => {
                let a = u.linear_coefficient(var).ok_or_else(|| no_rule(self, var))?;
                Ok(over(self.clone(), a))
            }
            // ∫ ln(u) dx = (u*ln(u) - u)/a
            Expr::Ln(u) => {
                let a = u.linear_coefficient(var).ok_or_else(|| no_rule(self, var))?;
                let u = u.as_ref().clone();
                Ok(over(u.clone() * u.clone().ln() - u, a))
            }
            _ => self.integrate_function(var),
        }
    }

    /// Trigonometric and inverse trigonometric functions of a linear argument.
    fn integrate_function(&self, var: &str) -> Result<Expr, SymbolicIntegrationError> {
        let (u, antiderivative) = match self {
            Expr::sin(u) => (u, -Expr::cos(u.clone())),
            Expr::cos(u) => (u, Expr::sin(u.clone())),
            // ∫ tan(u) du = -ln(cos(u))
            Expr::tg(u) => (u, -Expr::cos(u.clone()).ln()),
            // ∫ cot(u) du = ln(sin(u))
            Expr::ctg(u) => (u, Expr::sin(u.clone()).ln()),
            Expr::arcsin(u) => {
                let arg = u.as_ref().clone();
                let root = (Expr::Const(1.0) - arg.clone().pow(Expr::Const(2.0))).sqrt();
                (u, arg.clone() * Expr::arcsin(u.clone()) + root)
            }
            Expr::arccos(u) => {
                let arg = u.as_ref().clone();
                let root = (Expr::Const(1.0) - arg.clone().pow(Expr::Const(2.0))).sqrt();
                (u, arg.clone() * Expr::arccos(u.clone()) - root)
            }
            Expr::arctg(u) => {
                let arg = u.as_ref().clone();
                let log_term =
                    (Expr::Const(1.0) + arg.clone().pow(Expr::Const(2.0))).ln() / Expr::Const(2.0);
                (u, arg.clone() * Expr::arctg(u.clone()) - log_term)
            }
            Expr::arcctg(u) => {
                let arg = u.as_ref().clone();
                let log_term =
                    (Expr::Const(1.0) + arg.clone().pow(Expr::Const(2.0))).ln() / Expr::Const(2.0);
                (u, arg.clone() * Expr::arcctg(u.clone()) + log_term)
            }
            _ => return Err(no_rule(self, var)),
        };
        let a = u.linear_coefficient(var).ok_or_else(|| no_rule(self, var))?;
        Ok(over(antiderivative, a))
    }

    fn integrate_multiplication(
        &self,
        lhs: &Expr,
        rhs: &Expr,
        var: &str,
    ) -> Result<Expr, SymbolicIntegrationError> {
        if !lhs.contains_variable(var) {
            return Ok(lhs.clone() * rhs.integrate(var)?);
        }
        if !rhs.contains_variable(var) {
            return Ok(lhs.integrate(var)? * rhs.clone());
        }
        // x^m * x^n = x^(m+n)
        if let (Some(m), Some(n)) = (lhs.monomial_degree(var), rhs.monomial_degree(var)) {
            return Expr::variable(var)
                .pow(Expr::Const(m + n))
                .integrate(var);
        }
        for (poly, other) in [(lhs, rhs), (rhs, lhs)] {
            if let Some(result) = Self::integrate_polynomial_times_exponential(poly, other, var) {
                return Ok(result);
            }
            if let Some(result) = Self::integrate_polynomial_times_logarithm(poly, other, var) {
                return Ok(result);
            }
        }
        Err(no_rule(self, var))
    }

    fn integrate_division(
        &self,
        lhs: &Expr,
        rhs: &Expr,
        var: &str,
    ) -> Result<Expr, SymbolicIntegrationError> {
        // ∫ f/c dx = (∫ f dx)/c
        if !rhs.contains_variable(var) {
            return Ok(lhs.integrate(var)? / rhs.clone());
        }
        // ∫ c/g dx = c * ∫ g^(-1) dx
        if !lhs.contains_variable(var) {
            let reciprocal = match rhs {
                Expr::Pow(base, exp) if exp.as_const().is_some() => {
                    let n = exp.as_const().unwrap_or(1.0);
                    base.as_ref().clone().pow(Expr::Const(-n))
                }
                other => other.clone().pow(Expr::Const(-1.0)),
            };
            return reciprocal
                .integrate(var)
                .map(|integral| lhs.clone() * integral)
                .map_err(|_| no_rule(self, var));
        }
        Err(no_rule(self, var))
    }

    fn integrate_power(
        &self,
        base: &Expr,
        exp: &Expr,
        var: &str,
    ) -> Result<Expr, SymbolicIntegrationError> {
        // ∫ u^n dx = u^(n+1)/((n+1)*a), ∫ u^(-1) dx = ln(u)/a
        if let Some(n) = exp.as_const() {
            let a = base.linear_coefficient(var).ok_or_else(|| no_rule(self, var))?;
            let u = base.clone();
            if n == -1.0 {
                return Ok(over(u.ln(), a));
            }
            return Ok(u.pow(Expr::Const(n + 1.0)) / Expr::Const((n + 1.0) * a));
        }
        // ∫ c^u dx = c^u/(a*ln(c))
        if !base.contains_variable(var) {
            if let Some(c) = base.as_const() {
                if c <= 0.0 || c == 1.0 {
                    return Err(no_rule(self, var));
                }
            }
            let a = exp.linear_coefficient(var).ok_or_else(|| no_rule(self, var))?;
            return Ok(self.clone() / (Expr::Const(a) * base.clone().ln()));
        }
        Err(no_rule(self, var))
    }

    /// ∫ x^n * exp(u) dx by repeated integration by parts:
    /// I_n = x^n*e^u/a - (n/a)*I_(n-1), I_0 = e^u/a
    fn integrate_polynomial_times_exponential(poly: &Expr, exp: &Expr, var: &str) -> Option<Expr> {
        let Expr::Exp(u) = exp else {
            return None;
        };
        let n = poly.monomial_degree(var)?;
        if n.fract() != 0.0 || n < 0.0 {
            return None;
        }
        let a = u.linear_coefficient(var)?;
        let mut result = over(exp.clone(), a);
        for k in 1..=(n as i32) {
            let xk = Expr::variable(var).pow(Expr::Const(k as f64));
            result = over(xk * exp.clone(), a) - Expr::Const(k as f64 / a) * result;
        }
        Some(result)
    }

    /// ∫ x^n * ln(x) dx = x^(n+1) * (ln(x)/(n+1) - 1/(n+1)²), and ∫ ln(x)/x dx = ln(x)²/2
    fn integrate_polynomial_times_logarithm(poly: &Expr, ln_expr: &Expr, var: &str) -> Option<Expr> {
        let Expr::Ln(inner) = ln_expr else {
            return None;
        };
        if !matches!(inner.as_ref(), Expr::Var(name) if name == var) {
            return None;
        }
        let n = poly.monomial_degree(var)?;
        let x = Expr::variable(var);
        if n == -1.0 {
            return Some(x.ln().pow(Expr::Const(2.0)) / Expr::Const(2.0));
        }
        let m = n + 1.0;
        let bracket = x.clone().ln() / Expr::Const(m) - Expr::Const(1.0 / (m * m));
        Some(x.pow(Expr::Const(m)) * bracket)
    }

    /// Exponent n if the expression is `var` or `var^n` with constant n.
    fn monomial_degree(&self, var: &str) -> Option<f64> {
        match self {
            Expr::Var(name) if name == var => Some(1.0),
            Expr::Pow(base, exp) if matches!(base.as_ref(), Expr::Var(name) if name == var) => {
                exp.as_const()
            }
            _ => None,
        }
    }

    /// a when the expression is a*var + (terms free of var), a != 0.
    pub fn linear_coefficient(&self, var: &str) -> Option<f64> {
        match self.diff(var).simplify() {
            Expr::Const(a) if a != 0.0 && a.is_finite() => Some(a),
            _ => None,
        }
    }

    /// F(upper) - F(lower) for the antiderivative F, simplified. Other variables stay symbolic.
    ///
    /// Fails with `Unbounded` when the integrand has a pole in [lower, upper], or when the
    /// position of a possible pole depends on another variable.
    pub fn definite_integrate(
        &self,
        var: &str,
        lower: f64,
        upper: f64,
    ) -> Result<Expr, SymbolicIntegrationError> {
        let antiderivative = self.integrate(var)?;
        let mut singularities = Vec::new();
        collect_singularities(self, var, &mut singularities);
        if singularities
            .iter()
            .any(|s| hits_interval(s, var, lower, upper))
        {
            return Err(SymbolicIntegrationError::Unbounded {
                expr: self.to_string(),
                var: var.to_string(),
                lower,
                upper,
            });
        }
        let difference =
            antiderivative.set_variable(var, upper) - antiderivative.set_variable(var, lower);
        Ok(difference.simplify())
    }

    /// Iterated integral over [x_min, x_max] × [y_min, y_max], x first then y.
    ///
    /// Succeeds only when the result reduces to a finite constant.
    pub fn double_definite_integrate(
        &self,
        (x_min, x_max): (f64, f64),
        (y_min, y_max): (f64, f64),
    ) -> Result<f64, SymbolicIntegrationError> {
        let inner = self.simplify().definite_integrate("x", x_min, x_max)?;
        let outer = inner.definite_integrate("y", y_min, y_max)?;
        match outer {
            Expr::Const(value) if value.is_finite() => Ok(value),
            other => Err(SymbolicIntegrationError::NotFinite(other.to_string())),
        }
    }
}
