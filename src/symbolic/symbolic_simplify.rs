//! # Symbolic Expression Simplification Module
//!
//! Rewrites an expression into a smaller equivalent one. Used after differentiation (the raw
//! derivative of `x^2` is `2*x^(2 - 1)*1`), after substituting a point, and after symbolic
//! integration.
//!
//! ## Simplification Strategy
//!
//! 1. **Constant Folding**: arithmetic and elementary functions of constants are evaluated,
//!    but only when the result is finite. `1/0` stays a division so callers can see that the
//!    expression did not reduce to a number.
//! 2. **Algebraic Identities**: `x + 0 = x`, `x * 1 = x`, `0 * x = 0`, `x^1 = x`, `x^0 = 1`, ...
//! 3. **Coefficient Normalization**: numeric factors are moved to the front of a product and
//!    merged, so `x*2*3` becomes `6*x` and `x*(-1*y)` becomes `-(x*y)`.
//! 4. **Sign Normalization**: `a + (-2)*b` becomes `a - 2*b`.
//!
//! Rules are applied bottom-up in passes until the tree stops changing.

use crate::symbolic::symbolic_engine::Expr;
use std::f64::consts::PI;

/// Upper bound on bottom-up passes; every rule shrinks or reorders the tree so a fixpoint is
/// normally reached in two or three.
const MAX_SIMPLIFY_PASSES: usize = 16;

fn finite(value: f64) -> Option<Expr> {
    if value.is_finite() {
        Some(Expr::Const(value))
    } else {
        None
    }
}

impl Expr {
    //___________________________________SIMPLIFICATION____________________________________

    /// Simplifies the expression to a fixpoint.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let f = Expr::parse_expression("x^2").unwrap();
    /// assert_eq!(f.diff("x").simplify().to_string(), "2*x");
    /// ```
    pub fn simplify(&self) -> Expr {
        let mut current = self.clone();
        for _ in 0..MAX_SIMPLIFY_PASSES {
            let next = current.simplify_pass();
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// One bottom-up pass: children first, then the rules for this node.
    fn simplify_pass(&self) -> Expr {
        let node = self.rebuild(|child| child.simplify_pass());
        node.simplify_node()
    }

    fn simplify_node(self) -> Expr {
        match self {
            Expr::Add(lhs, rhs) => Self::simplify_add(*lhs, *rhs),
            Expr::Sub(lhs, rhs) => Self::simplify_sub(*lhs, *rhs),
            Expr::Mul(lhs, rhs) => Self::simplify_mul(*lhs, *rhs),
            Expr::Div(lhs, rhs) => Self::simplify_div(*lhs, *rhs),
            Expr::Pow(base, exp) => Self::simplify_pow(*base, *exp),
            other => other.fold_function(),
        }
    }

    fn simplify_add(lhs: Expr, rhs: Expr) -> Expr {
        match (lhs, rhs) {
            (Expr::Const(a), Expr::Const(b)) if (a + b).is_finite() => Expr::Const(a + b),
            (lhs, rhs) if lhs.is_zero() => rhs,
            (lhs, rhs) if rhs.is_zero() => lhs,
            (lhs, Expr::Const(c)) if c < 0.0 => Expr::Sub(lhs.boxed(), Expr::Const(-c).boxed()),
            (lhs, Expr::Mul(coeff, term)) if matches!(*coeff, Expr::Const(c) if c < 0.0) => {
                let positive = -coeff.as_const().unwrap_or(-1.0);
                Expr::Sub(lhs.boxed(), Self::scaled(positive, *term).boxed())
            }
            (lhs, rhs) => Expr::Add(lhs.boxed(), rhs.boxed()),
        }
    }

    fn simplify_sub(lhs: Expr, rhs: Expr) -> Expr {
        match (lhs, rhs) {
            (Expr::Const(a), Expr::Const(b)) if (a - b).is_finite() => Expr::Const(a - b),
            (lhs, rhs) if rhs.is_zero() => lhs,
            (lhs, rhs) if lhs.is_zero() => Self::scaled(-1.0, rhs),
            (lhs, rhs) if lhs == rhs => Expr::Const(0.0),
            (lhs, Expr::Const(c)) if c < 0.0 => Expr::Add(lhs.boxed(), Expr::Const(-c).boxed()),
            (lhs, Expr::Mul(coeff, term)) if matches!(*coeff, Expr::Const(c) if c < 0.0) => {
                let positive = -coeff.as_const().unwrap_or(-1.0);
                Expr::Add(lhs.boxed(), Self::scaled(positive, *term).boxed())
            }
            (lhs, rhs) => Expr::Sub(lhs.boxed(), rhs.boxed()),
        }
    }

    fn simplify_mul(lhs: Expr, rhs: Expr) -> Expr {
        match (lhs, rhs) {
            (Expr::Const(a), Expr::Const(b)) if (a * b).is_finite() => Expr::Const(a * b),
            (lhs, rhs) if lhs.is_zero() || rhs.is_zero() => Expr::Const(0.0),
            (lhs, rhs) if lhs.is_one() => rhs,
            (lhs, rhs) if rhs.is_one() => lhs,
            // numeric factor first
            (lhs, Expr::Const(c)) if lhs.as_const().is_none() => Self::scaled(c, lhs),
            (Expr::Const(a), Expr::Mul(inner, term)) if inner.as_const().is_some() => {
                let b = inner.as_const().unwrap_or(1.0);
                Self::scaled(a * b, *term)
            }
            (lhs, Expr::Mul(inner, term)) if lhs.as_const().is_none() && inner.as_const().is_some() => {
                let c = inner.as_const().unwrap_or(1.0);
                Self::scaled(c, Expr::Mul(lhs.boxed(), term))
            }
            (Expr::Mul(inner, term), rhs) if inner.as_const().is_some() => {
                let c = inner.as_const().unwrap_or(1.0);
                Self::scaled(c, Expr::Mul(term, rhs.boxed()))
            }
            (lhs, rhs) => Expr::Mul(lhs.boxed(), rhs.boxed()),
        }
    }

    fn simplify_div(lhs: Expr, rhs: Expr) -> Expr {
        match (lhs, rhs) {
            (Expr::Const(a), Expr::Const(b)) if (a / b).is_finite() => Expr::Const(a / b),
            (lhs, rhs) if rhs.is_one() => lhs,
            (lhs, rhs) if lhs.is_zero() && !rhs.is_zero() => Expr::Const(0.0),
            (lhs, rhs) => Expr::Div(lhs.boxed(), rhs.boxed()),
        }
    }

    fn simplify_pow(base: Expr, exp: Expr) -> Expr {
        match (base, exp) {
            (Expr::Const(a), Expr::Const(b)) if a.powf(b).is_finite() => Expr::Const(a.powf(b)),
            (_, exp) if exp.is_zero() => Expr::Const(1.0),
            (base, exp) if exp.is_one() => base,
            (base, _) if base.is_one() => Expr::Const(1.0),
            // (a^m)^n = a^(m*n) holds for integer exponents
            (Expr::Pow(inner, m), Expr::Const(n))
                if matches!(*m, Expr::Const(m) if m.fract() == 0.0) && n.fract() == 0.0 =>
            {
                let m = m.as_const().unwrap_or(1.0);
                Expr::Pow(inner, Expr::Const(m * n).boxed())
            }
            (base, exp) => Expr::Pow(base.boxed(), exp.boxed()),
        }
    }

    /// `c*e` with the trivial coefficients collapsed.
    fn scaled(c: f64, expr: Expr) -> Expr {
        match expr {
            _ if c == 0.0 => Expr::Const(0.0),
            _ if c == 1.0 => expr,
            Expr::Const(v) if (c * v).is_finite() => Expr::Const(c * v),
            Expr::Mul(inner, term) if inner.as_const().is_some() => {
                let b = inner.as_const().unwrap_or(1.0);
                Self::scaled(c * b, *term)
            }
            expr => Expr::Mul(Expr::Const(c).boxed(), expr.boxed()),
        }
    }

    /// Evaluates an elementary function of a constant argument when the value is finite.
    fn fold_function(self) -> Expr {
        let folded = match &self {
            Expr::Exp(arg) => arg.as_const().and_then(|v| finite(v.exp())),
            Expr::Ln(arg) => arg.as_const().and_then(|v| finite(v.ln())),
            Expr::sin(arg) => arg.as_const().and_then(|v| finite(v.sin())),
            Expr::cos(arg) => arg.as_const().and_then(|v| finite(v.cos())),
            Expr::tg(arg) => arg.as_const().and_then(|v| finite(v.tan())),
            Expr::ctg(arg) => arg.as_const().and_then(|v| finite(1.0 / v.tan())),
            Expr::arcsin(arg) => arg.as_const().and_then(|v| finite(v.asin())),
            Expr::arccos(arg) => arg.as_const().and_then(|v| finite(v.acos())),
            Expr::arctg(arg) => arg.as_const().and_then(|v| finite(v.atan())),
            Expr::arcctg(arg) => arg.as_const().and_then(|v| finite(PI / 2.0 - v.atan())),
            _ => None,
        };
        folded.unwrap_or(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn x() -> Expr {
        Expr::variable("x")
    }
    fn y() -> Expr {
        Expr::variable("y")
    }

    #[test]
    fn test_constant_folding() {
        let expr = Expr::Const(2.0) * Expr::Const(3.0) + Expr::Const(4.0);
        assert_eq!(expr.simplify(), Expr::Const(10.0));
        let expr = Expr::sin(Expr::Const(0.0).boxed()) + Expr::Exp(Expr::Const(0.0).boxed());
        assert_eq!(expr.simplify(), Expr::Const(1.0));
    }

    #[test]
    fn test_non_finite_is_not_folded() {
        let expr = Expr::Const(1.0) / Expr::Const(0.0);
        assert_eq!(expr.simplify(), expr);
        let expr = Expr::Ln(Expr::Const(0.0).boxed());
        assert_eq!(expr.simplify(), expr);
    }

    #[test]
    fn test_identities() {
        assert_eq!((x() + Expr::Const(0.0)).simplify(), x());
        assert_eq!((Expr::Const(0.0) + x()).simplify(), x());
        assert_eq!((x() * Expr::Const(1.0)).simplify(), x());
        assert_eq!((x() * Expr::Const(0.0)).simplify(), Expr::Const(0.0));
        assert_eq!((x() - x()).simplify(), Expr::Const(0.0));
        assert_eq!((x() / Expr::Const(1.0)).simplify(), x());
        assert_eq!(x().pow(Expr::Const(1.0)).simplify(), x());
        assert_eq!(x().pow(Expr::Const(0.0)).simplify(), Expr::Const(1.0));
        assert_eq!((Expr::Const(0.0) - x()).simplify().to_string(), "-x");
    }

    #[test]
    fn test_coefficients_move_to_front() {
        let expr = x() * Expr::Const(2.0) * Expr::Const(3.0);
        assert_eq!(expr.simplify().to_string(), "6*x");
        let expr = x() * (Expr::Const(-1.0) * y());
        assert_eq!(expr.simplify().to_string(), "-x*y");
    }

    #[test]
    fn test_negative_terms_become_subtraction() {
        let expr = x() + Expr::Const(-2.0) * y();
        assert_eq!(expr.simplify().to_string(), "x - 2*y");
        let expr = x() + Expr::Const(-3.0);
        assert_eq!(expr.simplify().to_string(), "x - 3");
        let expr = x() - Expr::Const(-1.0) * y();
        assert_eq!(expr.simplify().to_string(), "x + y");
    }

    #[test]
    fn test_nested_integer_powers() {
        let expr = x().pow(Expr::Const(2.0)).pow(Expr::Const(3.0));
        assert_eq!(expr.simplify().to_string(), "x^6");
        // fractional outer exponent is left alone
        let expr = x().pow(Expr::Const(2.0)).pow(Expr::Const(0.5));
        assert_eq!(expr.simplify(), expr);
    }

    #[test]
    fn test_simplify_preserves_value() {
        let expr = (x() * Expr::Const(2.0) + Expr::Const(0.0) * y())
            * (y() - Expr::Const(-1.0) * x())
            / Expr::Const(4.0);
        let simplified = expr.simplify();
        let original = expr.set_variable("x", 1.5).set_variable("y", -0.5).simplify();
        let reduced = simplified.set_variable("x", 1.5).set_variable("y", -0.5).simplify();
        assert_relative_eq!(
            original.as_const().unwrap(),
            reduced.as_const().unwrap(),
            epsilon = 1e-12
        );
    }
}
