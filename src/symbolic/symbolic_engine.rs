//! # Symbolic Engine Module
//!
//! Core expression tree for functions of two variables f(x, y). Every other part of the
//! calculator (differentiation, simplification, compilation to numeric closures, symbolic
//! integration) is written as an `impl Expr` block in its own module on top of this type.
//!
//! ## Main Structures and Methods
//!
//! ### `Expr` Enum
//! - **Variables**: `Var(String)`, in practice only `x` and `y`
//! - **Constants**: `Const(f64)`
//! - **Operations**: `Add`, `Sub`, `Mul`, `Div`, `Pow`
//! - **Functions**: `Exp`, `Ln`, `sin`, `cos`, `tg`, `ctg`, `arcsin`, `arccos`, `arctg`, `arcctg`
//!
//! ### Key Methods
//! - `set_variable()` / `set_variable_from_map()` - substitute numbers for variables
//! - `contains_variable()` / `all_arguments_are_variables()` - variable queries
//! - `rebuild()` - apply a transformation to the direct children of a node
//!
//! Unary minus is stored as `Mul(Const(-1), e)`; `Display` prints it back as `-e`.
//! Square roots, base-10 logarithms and hyperbolic functions are expressed through the
//! variants above at parse time.

#![allow(non_camel_case_types)]

use std::collections::HashMap;
use std::f64::consts::LN_10;
use std::fmt;

/// Symbolic expression tree.
///
/// # Examples
/// ```rust, ignore
/// let x = Expr::Var("x".to_string());
/// let expr = Expr::Add(Box::new(x), Box::new(Expr::Const(2.0)));
/// assert_eq!(expr.to_string(), "x + 2");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Symbolic variable ("x", "y")
    Var(String),
    /// Numerical constant
    Const(f64),
    /// left + right
    Add(Box<Expr>, Box<Expr>),
    /// left - right
    Sub(Box<Expr>, Box<Expr>),
    /// left * right
    Mul(Box<Expr>, Box<Expr>),
    /// left / right
    Div(Box<Expr>, Box<Expr>),
    /// base ^ exponent
    Pow(Box<Expr>, Box<Expr>),
    /// e^x
    Exp(Box<Expr>),
    /// natural logarithm
    Ln(Box<Expr>),
    sin(Box<Expr>),
    cos(Box<Expr>),
    /// tangent
    tg(Box<Expr>),
    /// cotangent
    ctg(Box<Expr>),
    arcsin(Box<Expr>),
    arccos(Box<Expr>),
    /// arctangent
    arctg(Box<Expr>),
    /// arccotangent
    arcctg(Box<Expr>),
}

fn write_operand(f: &mut fmt::Formatter, expr: &Expr, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

/// Infix rendering with the minimum of parentheses. The output is accepted back by
/// `parse_expression`, so partial derivatives can be fed to the calculator again.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{}", name),
            // -0 prints as "0"
            Expr::Const(val) if *val == 0.0 => write!(f, "0"),
            Expr::Const(val) => write!(f, "{}", val),
            Expr::Add(lhs, rhs) => {
                write!(f, "{} + ", lhs)?;
                write_operand(f, rhs, rhs.leads_with_minus())
            }
            Expr::Sub(lhs, rhs) => {
                write!(f, "{} - ", lhs)?;
                write_operand(f, rhs, rhs.precedence() <= 1 || rhs.leads_with_minus())
            }
            Expr::Mul(lhs, rhs) if lhs.is_minus_one() => {
                write!(f, "-")?;
                write_operand(f, rhs, rhs.precedence() < 2 || rhs.leads_with_minus())
            }
            Expr::Mul(lhs, rhs) => {
                write_operand(f, lhs, lhs.precedence() < 2)?;
                write!(f, "*")?;
                write_operand(f, rhs, rhs.precedence() < 2 || rhs.leads_with_minus())
            }
            Expr::Div(lhs, rhs) => {
                write_operand(f, lhs, lhs.precedence() < 2)?;
                write!(f, "/")?;
                write_operand(f, rhs, rhs.precedence() <= 2 || rhs.leads_with_minus())
            }
            Expr::Pow(base, exp) => {
                write_operand(f, base, base.precedence() <= 4 || base.leads_with_minus())?;
                write!(f, "^")?;
                write_operand(f, exp, exp.precedence() < 4 || exp.leads_with_minus())
            }
            Expr::Exp(expr) => write!(f, "exp({})", expr),
            Expr::Ln(expr) => write!(f, "log({})", expr),
            Expr::sin(expr) => write!(f, "sin({})", expr),
            Expr::cos(expr) => write!(f, "cos({})", expr),
            Expr::tg(expr) => write!(f, "tan({})", expr),
            Expr::ctg(expr) => write!(f, "cot({})", expr),
            Expr::arcsin(expr) => write!(f, "asin({})", expr),
            Expr::arccos(expr) => write!(f, "acos({})", expr),
            Expr::arctg(expr) => write!(f, "atan({})", expr),
            Expr::arcctg(expr) => write!(f, "acot({})", expr),
        }
    }
}

impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Expr::Add(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Expr::Sub(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Expr::Mul(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Div for Expr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Expr::Div(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Expr::Mul(Box::new(Expr::Const(-1.0)), Box::new(self))
    }
}

impl Expr {
    /// BASIC FEATURES

    /// Shorthand for `Expr::Var(name.to_string())`.
    pub fn variable(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    /// Applies `f` to every direct child and rebuilds the node with the results.
    /// Leaves (`Var`, `Const`) are cloned unchanged.
    pub fn rebuild<F>(&self, f: F) -> Expr
    where
        F: Fn(&Expr) -> Expr,
    {
        match self {
            Expr::Var(_) | Expr::Const(_) => self.clone(),
            Expr::Add(lhs, rhs) => Expr::Add(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Sub(lhs, rhs) => Expr::Sub(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Mul(lhs, rhs) => Expr::Mul(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Div(lhs, rhs) => Expr::Div(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Pow(base, exp) => Expr::Pow(f(base).boxed(), f(exp).boxed()),
            Expr::Exp(expr) => Expr::Exp(f(expr).boxed()),
            Expr::Ln(expr) => Expr::Ln(f(expr).boxed()),
            Expr::sin(expr) => Expr::sin(f(expr).boxed()),
            Expr::cos(expr) => Expr::cos(f(expr).boxed()),
            Expr::tg(expr) => Expr::tg(f(expr).boxed()),
            Expr::ctg(expr) => Expr::ctg(f(expr).boxed()),
            Expr::arcsin(expr) => Expr::arcsin(f(expr).boxed()),
            Expr::arccos(expr) => Expr::arccos(f(expr).boxed()),
            Expr::arctg(expr) => Expr::arctg(f(expr).boxed()),
            Expr::arcctg(expr) => Expr::arcctg(f(expr).boxed()),
        }
    }

    /// Substitutes a variable with a constant value throughout the expression.
    ///
    /// # Arguments
    /// * `var` - Name of the variable to substitute
    /// * `value` - Numerical value to substitute for the variable
    pub fn set_variable(&self, var: &str, value: f64) -> Expr {
        match self {
            Expr::Var(name) if name == var => Expr::Const(value),
            _ => self.rebuild(|child| child.set_variable(var, value)),
        }
    }

    /// Substitutes every variable present in `var_map`; the others are left symbolic.
    pub fn set_variable_from_map(&self, var_map: &HashMap<String, f64>) -> Expr {
        match self {
            Expr::Var(name) => match var_map.get(name) {
                Some(value) => Expr::Const(*value),
                None => self.clone(),
            },
            _ => self.rebuild(|child| child.set_variable_from_map(var_map)),
        }
    }

    /// check if the expression contains a variable
    pub fn contains_variable(&self, var_name: &str) -> bool {
        match self {
            Expr::Var(name) => name == var_name,
            Expr::Const(_) => false,
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Div(lhs, rhs)
            | Expr::Pow(lhs, rhs) => {
                lhs.contains_variable(var_name) || rhs.contains_variable(var_name)
            }
            Expr::Exp(expr)
            | Expr::Ln(expr)
            | Expr::sin(expr)
            | Expr::cos(expr)
            | Expr::tg(expr)
            | Expr::ctg(expr)
            | Expr::arcsin(expr)
            | Expr::arccos(expr)
            | Expr::arctg(expr)
            | Expr::arcctg(expr) => expr.contains_variable(var_name),
        }
    }

    /// Sorted, deduplicated names of all variables in the expression.
    pub fn all_arguments_are_variables(&self) -> Vec<String> {
        fn collect(expr: &Expr, acc: &mut Vec<String>) {
            match expr {
                Expr::Var(name) => acc.push(name.clone()),
                Expr::Const(_) => {}
                Expr::Add(lhs, rhs)
                | Expr::Sub(lhs, rhs)
                | Expr::Mul(lhs, rhs)
                | Expr::Div(lhs, rhs)
                | Expr::Pow(lhs, rhs) => {
                    collect(lhs, acc);
                    collect(rhs, acc);
                }
                Expr::Exp(inner)
                | Expr::Ln(inner)
                | Expr::sin(inner)
                | Expr::cos(inner)
                | Expr::tg(inner)
                | Expr::ctg(inner)
                | Expr::arcsin(inner)
                | Expr::arccos(inner)
                | Expr::arctg(inner)
                | Expr::arcctg(inner) => collect(inner, acc),
            }
        }
        let mut vars = Vec::new();
        collect(self, &mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn exp(self) -> Expr {
        Expr::Exp(self.boxed())
    }

    pub fn ln(self) -> Expr {
        Expr::Ln(self.boxed())
    }

    /// log10(self) as ln(self)/ln(10)
    pub fn log10(self) -> Expr {
        Expr::Ln(self.boxed()) / Expr::Const(LN_10)
    }

    pub fn pow(self, rhs: Expr) -> Expr {
        Expr::Pow(self.boxed(), rhs.boxed())
    }

    pub fn sqrt(self) -> Expr {
        self.pow(Expr::Const(0.5))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(val) if *val == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Const(val) if *val == 1.0)
    }

    pub fn is_minus_one(&self) -> bool {
        matches!(self, Expr::Const(val) if *val == -1.0)
    }

    /// Numeric value if the node is a constant.
    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(val) => Some(*val),
            _ => None,
        }
    }

    /// Binding strength used by `Display`: 1 additive, 2 multiplicative (and negation),
    /// 4 power, 5 atoms and function calls.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Pow(..) => 4,
            _ => 5,
        }
    }

    /// true when the rendered text starts with a minus sign
    fn leads_with_minus(&self) -> bool {
        match self {
            Expr::Const(val) => *val < 0.0,
            Expr::Mul(lhs, _) | Expr::Div(lhs, _) | Expr::Add(lhs, _) | Expr::Sub(lhs, _) => {
                lhs.leads_with_minus()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::variable("x")
    }
    fn y() -> Expr {
        Expr::variable("y")
    }

    #[test]
    fn test_display_minimal_parentheses() {
        let expr = x().pow(Expr::Const(2.0)) + y().pow(Expr::Const(2.0));
        assert_eq!(expr.to_string(), "x^2 + y^2");

        let expr = Expr::Const(2.0) * (x() + y());
        assert_eq!(expr.to_string(), "2*(x + y)");

        let expr = x() - (y() - Expr::Const(1.0));
        assert_eq!(expr.to_string(), "x - (y - 1)");

        let expr = x() / (Expr::Const(2.0) * y());
        assert_eq!(expr.to_string(), "x/(2*y)");
    }

    #[test]
    fn test_display_negation() {
        assert_eq!((-x()).to_string(), "-x");
        assert_eq!((-(x() + y())).to_string(), "-(x + y)");
        let expr = (-x()).pow(Expr::Const(2.0));
        assert_eq!(expr.to_string(), "(-x)^2");
        let expr = x() * Expr::Const(-3.0);
        assert_eq!(expr.to_string(), "x*(-3)");
        assert_eq!(Expr::Const(-0.0).to_string(), "0");
    }

    #[test]
    fn test_display_functions() {
        let expr = Expr::sin(x().boxed()) * Expr::cos(y().boxed());
        assert_eq!(expr.to_string(), "sin(x)*cos(y)");
        let expr = (-(x().pow(Expr::Const(2.0)) + y().pow(Expr::Const(2.0)))).exp();
        assert_eq!(expr.to_string(), "exp(-(x^2 + y^2))");
        assert_eq!(x().ln().to_string(), "log(x)");
    }

    #[test]
    fn test_set_variable() {
        let expr = x() * y() + x();
        let substituted = expr.set_variable("x", 2.0);
        assert_eq!(
            substituted,
            Expr::Const(2.0) * y() + Expr::Const(2.0)
        );
        assert!(!substituted.contains_variable("x"));
        assert!(substituted.contains_variable("y"));
    }

    #[test]
    fn test_set_variable_from_map() {
        let expr = Expr::sin(x().boxed()) + y();
        let mut map = HashMap::new();
        map.insert("x".to_string(), 0.0);
        map.insert("y".to_string(), 3.0);
        let substituted = expr.set_variable_from_map(&map);
        assert_eq!(
            substituted,
            Expr::sin(Expr::Const(0.0).boxed()) + Expr::Const(3.0)
        );
    }

    #[test]
    fn test_all_arguments_are_variables() {
        let expr = y() * x() + Expr::Exp(x().boxed());
        assert_eq!(expr.all_arguments_are_variables(), vec!["x", "y"]);
        assert!(Expr::Const(1.0).all_arguments_are_variables().is_empty());
    }
}
