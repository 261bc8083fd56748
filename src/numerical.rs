/// Sampling f(x, y) on a grid: evaluation domain, clamping of non-finite cells and the
/// ordered evaluation strategies
///
///  Example#1
/// ```
/// use multivar_calc::numerical::surface::{EvaluationDomain, GridStatus, Surface};
/// use multivar_calc::symbolic::parse_expr::parse_expression;
/// let f = parse_expression("x**2 + y**2").unwrap();
/// let grid = Surface::for_expression(&f).sample(&EvaluationDomain::visualization_default());
/// assert_eq!(grid.z.dim(), (100, 100));
/// assert_eq!(grid.status, GridStatus::Computed);
/// ```
pub mod surface;
///  Example#1
/// ```
/// use multivar_calc::numerical::NR::NR;
/// use multivar_calc::symbolic::parse_expr::parse_expression;
/// let mut NR_instanse = NR::new();
/// let eq_system = vec![parse_expression("x^2+y^2-10").unwrap(), parse_expression("x-y-4").unwrap()];
/// NR_instanse.set_equation_system(eq_system, vec!["x".to_string(), "y".to_string()], 1e-6, 100).unwrap();
/// NR_instanse.eq_generate().unwrap();
/// let result = NR_instanse.solve(&[1.0, 1.0]).unwrap();
/// println!("result = {:?} \n", result);
/// ```
pub mod NR;
/// Newton from a lattice of seeds on ∇f = 0, points classified by the Hessian
pub mod critical_points;
/// Lagrange multipliers: Newton on the KKT system of f - λg
pub mod constrained;
/// adaptive Gauss-Legendre cubature over a rectangle
pub mod quadrature;
/// symbolic double integral with the numerical fallback
///
///  Example#1
/// ```
/// use multivar_calc::numerical::double_integral::{DoubleIntegral, IntegrationMethod};
/// use multivar_calc::numerical::surface::EvaluationDomain;
/// use multivar_calc::symbolic::parse_expr::parse_expression;
/// let f = parse_expression("exp(-(x^2 + y^2))").unwrap();
/// let result = DoubleIntegral::default()
///     .integrate(&f, &EvaluationDomain::integration_default())
///     .unwrap();
/// assert_eq!(result.method, IntegrationMethod::Numeric);
/// ```
pub mod double_integral;
