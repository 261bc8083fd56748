//! Equality-constrained optimization of f(x, y) subject to g(x, y) = 0.
//!
//! Stationary points of the Lagrangian L = f - λg solve the system
//!
//! ```text
//! f_x - λ g_x = 0
//! f_y - λ g_y = 0
//!           g = 0
//! ```
//!
//! which is handed to the Newton solver in the unknowns (x, y, lambda). The Jacobian of this
//! system is the KKT matrix, so every Newton step is an SQP step with the exact Hessian of L.
use crate::numerical::NR::{NR, SolverError};
use crate::numerical::surface::EvaluationDomain;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_engine_derivatives::Gradient;
use crate::symbolic::symbolic_lambdify::Lambda;
use itertools::iproduct;
use log::{debug, info, warn};
use nalgebra::DVector;
use serde::Serialize;
use strum_macros::Display;

/// name of the multiplier unknown
pub const MULTIPLIER: &str = "lambda";
const CURVATURE_EPS: f64 = 1e-10;
/// lattice used by multi-start, per axis
const MULTI_START_SEEDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConstrainedKind {
    Minimum,
    Maximum,
    Degenerate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstrainedOptimum {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    pub lambda: f64,
    pub classification: ConstrainedKind,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstrainedSettings {
    pub tolerance: f64,
    pub max_iterations: usize,
    /// also start from a 3×3 lattice and keep the best constrained minimum
    pub multi_start: bool,
}

impl Default for ConstrainedSettings {
    fn default() -> Self {
        ConstrainedSettings {
            tolerance: 1e-10,
            max_iterations: 100,
            multi_start: false,
        }
    }
}

/// [f_x - λ g_x, f_y - λ g_y, g]
pub fn lagrange_system(function: &Expr, constraint: &Expr) -> Vec<Expr> {
    let grad_f = Gradient::of(function);
    let grad_g = Gradient::of(constraint);
    let lambda = Expr::variable(MULTIPLIER);
    vec![
        (grad_f.partial_x - lambda.clone() * grad_g.partial_x).simplify(),
        (grad_f.partial_y - lambda * grad_g.partial_y).simplify(),
        constraint.clone(),
    ]
}

struct CompiledGradients {
    f: Lambda,
    fx: Lambda,
    fy: Lambda,
    gx: Lambda,
    gy: Lambda,
}

impl CompiledGradients {
    fn new(function: &Expr, constraint: &Expr) -> Result<Self, SolverError> {
        let vars = ["x", "y"];
        let grad_f = Gradient::of(function);
        let grad_g = Gradient::of(constraint);
        Ok(CompiledGradients {
            f: function.compile(&vars)?,
            fx: grad_f.partial_x.compile(&vars)?,
            fy: grad_f.partial_y.compile(&vars)?,
            gx: grad_g.partial_x.compile(&vars)?,
            gy: grad_g.partial_y.compile(&vars)?,
        })
    }

    /// least-squares multiplier estimate: argmin |∇f - λ∇g|
    fn multiplier_estimate(&self, x: f64, y: f64) -> f64 {
        let p = [x, y];
        let (fx, fy) = (self.fx.eval(&p), self.fy.eval(&p));
        let (gx, gy) = (self.gx.eval(&p), self.gy.eval(&p));
        let norm2 = gx * gx + gy * gy;
        let estimate = (fx * gx + fy * gy) / norm2;
        if estimate.is_finite() { estimate } else { 0.0 }
    }
}

/// Sign of the Lagrangian Hessian along the constraint tangent t = (-g_y, g_x).
fn classify(solver: &NR, point: &DVector<f64>) -> ConstrainedKind {
    // the leading 2×2 block of the KKT matrix is the Hessian of L in (x, y)
    let kkt = solver.jacobian.evaluate_jacobian_DMatrix(point);
    let (gx, gy) = (kkt[(2, 0)], kkt[(2, 1)]);
    let t = [-gy, gx];
    if t[0].hypot(t[1]) <= CURVATURE_EPS {
        return ConstrainedKind::Degenerate;
    }
    let mut curvature = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            curvature += t[i] * kkt[(i, j)] * t[j];
        }
    }
    if !curvature.is_finite() || curvature.abs() <= CURVATURE_EPS {
        ConstrainedKind::Degenerate
    } else if curvature > 0.0 {
        ConstrainedKind::Minimum
    } else {
        ConstrainedKind::Maximum
    }
}

fn solve_from(
    solver: &mut NR,
    compiled: &CompiledGradients,
    seed: [f64; 3],
) -> Result<ConstrainedOptimum, SolverError> {
    let solution = solver.solve(&seed)?;
    let (x, y, lambda) = (solution[0], solution[1], solution[2]);
    let value = compiled.f.eval(&[x, y]);
    if !value.is_finite() {
        return Err(SolverError::NonFinite {
            iteration: solver.i,
        });
    }
    Ok(ConstrainedOptimum {
        x,
        y,
        value,
        lambda,
        classification: classify(solver, &solution),
        iterations: solver.i,
    })
}

/// Lowest f among constrained minima, then the lowest f among degenerate points.
/// Constrained maxima are never returned.
fn best_candidate(candidates: &[ConstrainedOptimum]) -> Option<ConstrainedOptimum> {
    let by_value =
        |a: &&ConstrainedOptimum, b: &&ConstrainedOptimum| a.value.total_cmp(&b.value);
    let of_kind = |kind: ConstrainedKind| {
        candidates
            .iter()
            .filter(move |c| c.classification == kind)
            .min_by(by_value)
    };
    of_kind(ConstrainedKind::Minimum)
        .or_else(|| of_kind(ConstrainedKind::Degenerate))
        .cloned()
}

fn not_a_minimum(optimum: &ConstrainedOptimum) -> SolverError {
    SolverError::NotAMinimum {
        x: optimum.x,
        y: optimum.y,
    }
}

/// Finds a local minimum of f subject to g = 0 from the stationary points of f - λg,
/// starting at the domain centroid with λ = 0.
///
/// A stationary point classified as a constrained maximum is a failure. With `multi_start`
/// the nodes of a 3×3 lattice over the domain are tried as well, each seeded with the
/// least-squares multiplier estimate. A single start finds only a local solution.
pub fn optimize_with_constraint(
    function: &Expr,
    constraint: &Expr,
    domain: &EvaluationDomain,
    settings: &ConstrainedSettings,
) -> Result<ConstrainedOptimum, SolverError> {
    let mut solver = NR::new();
    solver.set_equation_system(
        lagrange_system(function, constraint),
        vec!["x".to_string(), "y".to_string(), MULTIPLIER.to_string()],
        settings.tolerance,
        settings.max_iterations,
    )?;
    solver.eq_generate()?;
    let compiled = CompiledGradients::new(function, constraint)?;

    let (cx, cy) = domain.centroid();
    let first = solve_from(&mut solver, &compiled, [cx, cy, 0.0]);
    if !settings.multi_start {
        let checked = first.and_then(|optimum| match optimum.classification {
            ConstrainedKind::Maximum => Err(not_a_minimum(&optimum)),
            _ => Ok(optimum),
        });
        return match checked {
            Ok(optimum) => {
                info!(
                    "constrained optimum at ({}, {}), f = {}, lambda = {}",
                    optimum.x, optimum.y, optimum.value, optimum.lambda
                );
                Ok(optimum)
            }
            Err(e) => {
                warn!("constrained solve from the centroid failed: {}", e);
                Err(e)
            }
        };
    }

    let mut candidates = Vec::new();
    let mut first_error = None;
    match first {
        Ok(optimum) => candidates.push(optimum),
        Err(e) => first_error = Some(e),
    }
    let xs = domain.x_axis(MULTI_START_SEEDS);
    let ys = domain.y_axis(MULTI_START_SEEDS);
    for (&x0, &y0) in iproduct!(xs.iter(), ys.iter()) {
        let seed = [x0, y0, compiled.multiplier_estimate(x0, y0)];
        match solve_from(&mut solver, &compiled, seed) {
            Ok(optimum) => candidates.push(optimum),
            Err(e) => {
                debug!("seed {:?} failed: {}", seed, e);
                first_error.get_or_insert(e);
            }
        }
    }
    debug!("{} converged constrained candidates", candidates.len());
    match best_candidate(&candidates) {
        Some(optimum) => {
            info!(
                "constrained optimum at ({}, {}), f = {}, lambda = {} ({})",
                optimum.x, optimum.y, optimum.value, optimum.lambda, optimum.classification
            );
            Ok(optimum)
        }
        None => {
            let e = match candidates.first() {
                Some(maximum) => not_a_minimum(maximum),
                None => first_error.unwrap_or(SolverError::MaxIterations {
                    max_iterations: settings.max_iterations,
                    last_error: f64::NAN,
                }),
            };
            warn!("no constrained minimum found: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parse_expr::parse_expression;
    use approx::assert_relative_eq;

    fn optimize(f: &str, g: &str, multi_start: bool) -> Result<ConstrainedOptimum, SolverError> {
        let settings = ConstrainedSettings {
            multi_start,
            ..ConstrainedSettings::default()
        };
        optimize_with_constraint(
            &parse_expression(f).unwrap(),
            &parse_expression(g).unwrap(),
            &EvaluationDomain::visualization_default(),
            &settings,
        )
    }

    #[test]
    fn test_paraboloid_on_a_line() {
        let optimum = optimize("x**2 + y**2", "x + y - 2", false).unwrap();
        assert_relative_eq!(optimum.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(optimum.y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(optimum.value, 2.0, epsilon = 1e-9);
        assert_relative_eq!(optimum.lambda, 2.0, epsilon = 1e-9);
        assert_eq!(optimum.classification, ConstrainedKind::Minimum);
        assert!(optimum.iterations >= 1);
    }

    #[test]
    fn test_lagrange_system_shape() {
        let system = lagrange_system(
            &parse_expression("x*y").unwrap(),
            &parse_expression("x + y - 1").unwrap(),
        );
        assert_eq!(system.len(), 3);
        assert!(system[0].contains_variable(MULTIPLIER));
        assert!(!system[2].contains_variable(MULTIPLIER));
    }

    #[test]
    fn test_multi_start_recovers_from_singular_centroid() {
        // at the centroid with lambda = 0 the KKT matrix of a linear f is singular
        assert!(optimize("x", "x^2 + y^2 - 1", false).is_err());
        let optimum = optimize("x", "x^2 + y^2 - 1", true).unwrap();
        assert_relative_eq!(optimum.x, -1.0, epsilon = 1e-8);
        assert_relative_eq!(optimum.y, 0.0, epsilon = 1e-8);
        assert_relative_eq!(optimum.value, -1.0, epsilon = 1e-8);
        assert_relative_eq!(optimum.lambda, -0.5, epsilon = 1e-8);
        assert_eq!(optimum.classification, ConstrainedKind::Minimum);
    }

    #[test]
    fn test_constrained_maximum_is_not_an_optimum() {
        // the only KKT point of -(x^2 + y^2) on x + y = 2 is a maximum; f is unbounded below
        for multi_start in [false, true] {
            match optimize("-(x^2 + y^2)", "x + y - 2", multi_start) {
                Err(SolverError::NotAMinimum { x, y }) => {
                    assert_relative_eq!(x, 1.0, epsilon = 1e-9);
                    assert_relative_eq!(y, 1.0, epsilon = 1e-9);
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
    }

    #[test]
    fn test_best_candidate_skips_maxima() {
        let candidate = |value: f64, classification: ConstrainedKind| ConstrainedOptimum {
            x: value,
            y: 0.0,
            value,
            lambda: 0.0,
            classification,
            iterations: 1,
        };
        let best = best_candidate(&[
            candidate(-5.0, ConstrainedKind::Maximum),
            candidate(3.0, ConstrainedKind::Minimum),
            candidate(1.0, ConstrainedKind::Minimum),
            candidate(0.0, ConstrainedKind::Degenerate),
        ])
        .unwrap();
        assert_eq!(best.value, 1.0);
        let best = best_candidate(&[
            candidate(-5.0, ConstrainedKind::Maximum),
            candidate(2.0, ConstrainedKind::Degenerate),
        ])
        .unwrap();
        assert_eq!(best.classification, ConstrainedKind::Degenerate);
        assert!(best_candidate(&[candidate(-5.0, ConstrainedKind::Maximum)]).is_none());
    }

    #[test]
    fn test_inconsistent_constraint_fails() {
        assert!(optimize("x^2 + y^2", "3", false).is_err());
        assert!(optimize("x^2 + y^2", "x^2 + y^2 + 1", true).is_err());
    }
}
