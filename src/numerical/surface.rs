//! Surface sampling of f(x, y) over a rectangular domain.
//!
//! The expression is compiled once and the grid rows are evaluated in parallel. Cells that
//! come out NaN or infinite are clamped so the grid can always be serialized, and the number of
//! clamped cells is reported in the `GridStatus`.

use crate::outcome::Outcome;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_lambdify::{EvalError, Lambda};
use enum_dispatch::enum_dispatch;
use log::{debug, warn};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// points per axis of the visualization grid
pub const GRID_RESOLUTION: usize = 100;
/// +inf is reported as this value, -inf as its negative
pub const CLAMP_MAGNITUDE: f64 = 1e10;

/// Rectangle [x_min, x_max] × [y_min, y_max] with min < max on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDomain {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl EvaluationDomain {
    pub const fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        EvaluationDomain {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// (-5, 5) × (-5, 5), used for plots and critical points
    pub const fn visualization_default() -> Self {
        Self::new(-5.0, 5.0, -5.0, 5.0)
    }

    /// (0, 1) × (0, 1)
    pub const fn integration_default() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Builds a domain from optional user bounds. Each axis independently falls back to
    /// `default` when a bound is missing or non-finite, or when min >= max.
    pub fn sanitized(
        x: (Option<f64>, Option<f64>),
        y: (Option<f64>, Option<f64>),
        default: &EvaluationDomain,
    ) -> Self {
        let (x_min, x_max) = sanitize_axis(x, (default.x_min, default.x_max));
        let (y_min, y_max) = sanitize_axis(y, (default.y_min, default.y_max));
        Self::new(x_min, x_max, y_min, y_max)
    }

    /// inclusive on all four edges
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            0.5 * (self.x_min + self.x_max),
            0.5 * (self.y_min + self.y_max),
        )
    }

    pub fn x_bounds(&self) -> (f64, f64) {
        (self.x_min, self.x_max)
    }

    pub fn y_bounds(&self) -> (f64, f64) {
        (self.y_min, self.y_max)
    }

    pub fn x_axis(&self, n: usize) -> Array1<f64> {
        Array1::linspace(self.x_min, self.x_max, n)
    }

    pub fn y_axis(&self, n: usize) -> Array1<f64> {
        Array1::linspace(self.y_min, self.y_max, n)
    }
}

fn sanitize_axis(bounds: (Option<f64>, Option<f64>), default: (f64, f64)) -> (f64, f64) {
    let lower = bounds.0.filter(|v| v.is_finite()).unwrap_or(default.0);
    let upper = bounds.1.filter(|v| v.is_finite()).unwrap_or(default.1);
    if lower < upper { (lower, upper) } else { default }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridStatus {
    Computed,
    /// this many cells were non-finite and replaced
    Clamped { cells: usize },
    /// the expression could not be compiled; the grid shows x² + y² instead
    Fallback { reason: String },
}

/// Evenly spaced lattice; `z[[j, i]] = f(xs[i], ys[j])`, so rows follow y.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    pub xs: Array1<f64>,
    pub ys: Array1<f64>,
    pub z: Array2<f64>,
    pub status: GridStatus,
}

impl SampleGrid {
    /// (min, max) of the clamped values
    pub fn z_range(&self) -> (f64, f64) {
        self.z
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn range_string(&self) -> String {
        let (lo, hi) = self.z_range();
        format!("[{:.4}, {:.4}]", lo, hi)
    }

    /// z as nested rows, the layout plot figures expect
    pub fn z_rows(&self) -> Vec<Vec<f64>> {
        self.z.outer_iter().map(|row| row.to_vec()).collect()
    }
}

/// NaN -> 0, +inf -> 1e10, -inf -> -1e10
pub fn clamp_value(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value.is_infinite() {
        CLAMP_MAGNITUDE.copysign(value)
    } else {
        value
    }
}

#[enum_dispatch(SurfaceStrategy)]
pub trait SurfaceEvaluator {
    fn value_at(&self, x: f64, y: f64) -> f64;
    fn name(&self) -> &'static str;
}

/// f compiled to a `Lambda` over (x, y)
#[derive(Debug, Clone)]
pub struct CompiledSurface {
    lambda: Lambda,
}

impl CompiledSurface {
    pub fn new(expr: &Expr) -> Result<Self, EvalError> {
        Ok(CompiledSurface {
            lambda: expr.compile(&["x", "y"])?,
        })
    }
}

impl SurfaceEvaluator for CompiledSurface {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        self.lambda.eval(&[x, y])
    }
    fn name(&self) -> &'static str {
        "compiled"
    }
}

/// x² + y², shown when the expression cannot be evaluated numerically
#[derive(Debug, Clone, Copy, Default)]
pub struct ParaboloidFallback;

impl SurfaceEvaluator for ParaboloidFallback {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        x * x + y * y
    }
    fn name(&self) -> &'static str {
        "paraboloid fallback"
    }
}

#[enum_dispatch]
#[derive(Debug, Clone)]
pub enum SurfaceStrategy {
    CompiledSurface,
    ParaboloidFallback,
}

/// Surface of one expression: the chosen strategy plus the reason a fallback was taken.
#[derive(Debug, Clone)]
pub struct Surface {
    strategy: SurfaceStrategy,
    fallback_reason: Option<String>,
}

impl Surface {
    /// Tries the strategies in order: compiled evaluation, then the paraboloid.
    pub fn for_expression(expr: &Expr) -> Self {
        match CompiledSurface::new(expr) {
            Ok(compiled) => Surface {
                strategy: compiled.into(),
                fallback_reason: None,
            },
            Err(e) => {
                warn!("surface of '{}' falls back to x^2 + y^2: {}", expr, e);
                Surface {
                    strategy: ParaboloidFallback.into(),
                    fallback_reason: Some(e.to_string()),
                }
            }
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn sample(&self, domain: &EvaluationDomain) -> SampleGrid {
        self.sample_with_resolution(domain, GRID_RESOLUTION)
    }

    pub fn sample_with_resolution(&self, domain: &EvaluationDomain, resolution: usize) -> SampleGrid {
        let xs = domain.x_axis(resolution);
        let ys = domain.y_axis(resolution);
        let rows: Vec<Vec<f64>> = ys
            .as_slice()
            .unwrap_or(&[])
            .par_iter()
            .map(|&y| xs.iter().map(|&x| self.strategy.value_at(x, y)).collect())
            .collect();
        let mut clamped = 0usize;
        let values: Vec<f64> = rows
            .into_iter()
            .flatten()
            .map(|v| {
                if !v.is_finite() {
                    clamped += 1;
                }
                clamp_value(v)
            })
            .collect();
        let z = Array2::from_shape_vec((ys.len(), xs.len()), values)
            .unwrap_or_else(|_| Array2::zeros((ys.len(), xs.len())));
        let status = match (&self.fallback_reason, clamped) {
            (Some(reason), _) => GridStatus::Fallback {
                reason: reason.clone(),
            },
            (None, 0) => GridStatus::Computed,
            (None, cells) => {
                debug!("{} of {} grid cells clamped", cells, z.len());
                GridStatus::Clamped { cells }
            }
        };
        SampleGrid { xs, ys, z, status }
    }

    /// Value at one point; a non-finite value is reported as 0.0.
    pub fn value_at(&self, x: f64, y: f64) -> Outcome<f64> {
        Outcome::from_scalar(self.strategy.value_at(x, y), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parse_expr::parse_expression;
    use approx::assert_relative_eq;

    fn surface(text: &str) -> Surface {
        Surface::for_expression(&parse_expression(text).unwrap())
    }

    #[test]
    fn test_sanitized_domain() {
        let default = EvaluationDomain::visualization_default();
        let domain = EvaluationDomain::sanitized((Some(-1.0), Some(2.0)), (None, None), &default);
        assert_eq!(domain, EvaluationDomain::new(-1.0, 2.0, -5.0, 5.0));
        // inverted and non-finite bounds take the default for that axis only
        let domain = EvaluationDomain::sanitized(
            (Some(3.0), Some(1.0)),
            (Some(f64::NAN), Some(4.0)),
            &default,
        );
        assert_eq!(domain, EvaluationDomain::new(-5.0, 5.0, -5.0, 4.0));
        let domain = EvaluationDomain::sanitized((Some(6.0), None), (None, None), &default);
        assert_eq!(domain, default);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let domain = EvaluationDomain::visualization_default();
        assert!(domain.contains(5.0, -5.0));
        assert!(!domain.contains(5.0001, 0.0));
        assert_eq!(domain.centroid(), (0.0, 0.0));
    }

    #[test]
    fn test_grid_layout() {
        let grid = surface("x + 10*y").sample(&EvaluationDomain::visualization_default());
        assert_eq!(grid.z.dim(), (GRID_RESOLUTION, GRID_RESOLUTION));
        assert_eq!(grid.xs[0], -5.0);
        assert_relative_eq!(grid.xs[GRID_RESOLUTION - 1], 5.0, epsilon = 1e-12);
        assert_eq!(grid.status, GridStatus::Computed);
        // rows follow y
        assert_relative_eq!(grid.z[[0, 99]], 5.0 - 50.0, epsilon = 1e-12);
        assert_relative_eq!(grid.z[[99, 0]], -5.0 + 50.0, epsilon = 1e-12);
        assert_eq!(grid.range_string(), "[-55.0000, 55.0000]");
    }

    #[test]
    fn test_non_finite_cells_are_clamped() {
        let grid = surface("log(x)").sample(&EvaluationDomain::visualization_default());
        assert!(grid.z.iter().all(|v| v.is_finite()));
        assert_eq!(grid.status, GridStatus::Clamped { cells: 50 * GRID_RESOLUTION });

        let domain = EvaluationDomain::new(0.0, 2.0, 0.0, 1.0);
        let grid = surface("1/(x - 1)").sample_with_resolution(&domain, 3);
        assert_eq!(grid.z[[0, 1]], CLAMP_MAGNITUDE);
        let grid = surface("-1/(x - 1)").sample_with_resolution(&domain, 3);
        assert_eq!(grid.z[[0, 1]], -CLAMP_MAGNITUDE);
    }

    #[test]
    fn test_value_at_point() {
        let s = surface("x**2 + y**2");
        assert_eq!(s.value_at(1.0, 1.0), Outcome::Computed { value: 2.0 });
        let s = surface("1/x");
        let value = s.value_at(0.0, 1.0);
        assert!(value.is_degenerate());
        assert_eq!(value.value_or(f64::NAN), 0.0);
    }

    #[test]
    fn test_paraboloid_fallback() {
        let s = Surface::for_expression(&Expr::variable("z"));
        assert_eq!(s.strategy_name(), "paraboloid fallback");
        let grid = s.sample_with_resolution(&EvaluationDomain::visualization_default(), 3);
        assert!(matches!(grid.status, GridStatus::Fallback { .. }));
        assert_eq!(grid.z[[0, 0]], 50.0);
        assert_eq!(grid.z[[1, 1]], 0.0);
    }
}
