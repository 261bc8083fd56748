//! Critical points of f(x, y): solutions of ∂f/∂x = ∂f/∂y = 0 inside a domain.
//!
//! Newton-Raphson is started from every node of a seed lattice over the domain. Converged
//! iterates are collected as plain `(x, y)` pairs, deduplicated, verified against the
//! gradient, filtered to the domain and classified with the Hessian.

use crate::numerical::NR::{NR, SolverError};
use crate::numerical::surface::EvaluationDomain;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_engine_derivatives::Gradient;
use itertools::iproduct;
use log::{debug, info};
use nalgebra::DVector;
use serde::Serialize;
use strum_macros::Display;

/// accepted |∇f| at a reported critical point
pub const GRADIENT_TOLERANCE: f64 = 1e-6;
/// solutions closer than this are the same point
const DEDUP_DISTANCE: f64 = 1e-6;
/// |det H| below this leaves the second-derivative test inconclusive
const HESSIAN_EPS: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CriticalPointKind {
    Minimum,
    Maximum,
    Saddle,
    Degenerate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalPoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    pub kind: CriticalPointKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedCandidate {
    pub x: f64,
    pub y: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CriticalPointSet {
    /// sorted by (x, y)
    pub points: Vec<CriticalPoint>,
    pub rejected: Vec<RejectedCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalPointSettings {
    pub seeds_per_axis: usize,
    /// Newton step tolerance
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for CriticalPointSettings {
    fn default() -> Self {
        CriticalPointSettings {
            seeds_per_axis: 7,
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

/// Second-derivative test from the Hessian entries.
pub fn classify(fxx: f64, fxy: f64, fyy: f64) -> CriticalPointKind {
    let det = fxx * fyy - fxy * fxy;
    if !det.is_finite() || det.abs() <= HESSIAN_EPS {
        CriticalPointKind::Degenerate
    } else if det < 0.0 {
        CriticalPointKind::Saddle
    } else if fxx > 0.0 {
        CriticalPointKind::Minimum
    } else {
        CriticalPointKind::Maximum
    }
}

/// Runs Newton on ∇f = 0 from every seed and returns the converged iterates.
fn solve_from_seeds(
    solver: &mut NR,
    domain: &EvaluationDomain,
    seeds_per_axis: usize,
) -> Vec<(f64, f64)> {
    let n = seeds_per_axis.max(1);
    let xs = domain.x_axis(n);
    let ys = domain.y_axis(n);
    let mut solutions = Vec::new();
    for (&x0, &y0) in iproduct!(xs.iter(), ys.iter()) {
        match solver.solve(&[x0, y0]) {
            Ok(solution) => solutions.push((solution[0], solution[1])),
            Err(e) => debug!("seed ({}, {}) failed: {}", x0, y0, e),
        }
    }
    solutions
}

fn dedup(solutions: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut unique: Vec<(f64, f64)> = Vec::new();
    for (x, y) in solutions {
        let seen = unique
            .iter()
            .any(|&(ux, uy)| (ux - x).hypot(uy - y) < DEDUP_DISTANCE);
        if !seen {
            unique.push((x, y));
        }
    }
    unique
}

/// Finds and classifies the critical points of `function` in `domain`.
///
/// Only setting up the solver can fail; a seed that does not converge, or a candidate that
/// fails verification, is skipped and recorded without aborting the search.
pub fn find_critical_points(
    function: &Expr,
    domain: &EvaluationDomain,
    settings: &CriticalPointSettings,
) -> Result<CriticalPointSet, SolverError> {
    let gradient = Gradient::of(function);
    let mut solver = NR::new();
    solver.set_equation_system(
        vec![gradient.partial_x.clone(), gradient.partial_y.clone()],
        vec!["x".to_string(), "y".to_string()],
        settings.tolerance,
        settings.max_iterations,
    )?;
    solver.eq_generate()?;

    let f = function.compile(&["x", "y"])?;
    let solutions = dedup(solve_from_seeds(&mut solver, domain, settings.seeds_per_axis));

    let mut set = CriticalPointSet::default();
    for (x, y) in solutions {
        let reject = |reason: String| RejectedCandidate { x, y, reason };
        if !x.is_finite() || !y.is_finite() {
            set.rejected.push(reject("non-finite solution".to_string()));
            continue;
        }
        if !domain.contains(x, y) {
            set.rejected.push(reject("outside the domain".to_string()));
            continue;
        }
        let point = DVector::from_vec(vec![x, y]);
        let residual = solver.jacobian.evaluate_funvector_DVector(&point).norm();
        if !(residual <= GRADIENT_TOLERANCE) {
            set.rejected
                .push(reject(format!("|grad f| = {:e} above tolerance", residual)));
            continue;
        }
        let value = f.eval(&[x, y]);
        if !value.is_finite() {
            set.rejected.push(reject(format!("f is {} at the point", value)));
            continue;
        }
        // the jacobian of the gradient is the Hessian
        let hessian = solver.jacobian.evaluate_jacobian_DMatrix(&point);
        let kind = classify(hessian[(0, 0)], hessian[(0, 1)], hessian[(1, 1)]);
        set.points.push(CriticalPoint { x, y, value, kind });
    }
    set.points
        .sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    info!(
        "critical points of {}: {} found, {} rejected",
        function,
        set.points.len(),
        set.rejected.len()
    );
    Ok(set)
}
