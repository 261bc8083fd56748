#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// turns a string such as "x**2 + sin(y)" into a symbolic expression
///
///# Example
/// ```
/// use multivar_calc::symbolic::parse_expr::parse_expression;
/// let f = parse_expression("x**2 + y**2").unwrap();
/// assert_eq!(f.to_string(), "x^2 + y^2");
/// assert!(parse_expression("x + z").is_err());
/// ```
pub mod parse_expr;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// 1) expression tree, substitution and printing
/// 2) analytical partial derivatives and the gradient
/// 3) simplification
/// 4) compilation into numeric functions
///# Example
/// ```
/// use multivar_calc::symbolic::parse_expr::parse_expression;
/// use multivar_calc::symbolic::symbolic_engine_derivatives::Gradient;
/// let f = parse_expression("x**2 + y**2").unwrap();
/// let gradient = Gradient::of(&f);
/// assert_eq!(gradient.partial_x.to_string(), "2*x");
/// let f_xy = f.lambdify_xy().unwrap();
/// assert_eq!(f_xy(1.0, 2.0), 5.0);
/// ```
pub mod symbolic_engine;
pub mod symbolic_engine_derivatives;
pub mod symbolic_lambdify;
pub mod symbolic_simplify;
///________________________________________________________________________________________________________________________________________________
///
/// calculate symbolic jacobian and evaluate it into nalgebra matrices
pub mod symbolic_functions;
///______________________________________________________________________________________________________________________________________________
/// antiderivatives by pattern rules, definite and iterated double integrals
/// ```
/// use multivar_calc::symbolic::parse_expr::parse_expression;
/// let f = parse_expression("1").unwrap();
/// assert_eq!(f.double_definite_integrate((0.0, 1.0), (0.0, 1.0)).unwrap(), 1.0);
/// ```
pub mod symbolic_integration;
