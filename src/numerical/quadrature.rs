//! Adaptive tensor-product Gauss-Legendre cubature on a rectangle.
//!
//! Each cell is integrated with a low and a high degree rule; their difference is the local
//! error estimate. A cell whose estimate exceeds its share of the tolerance is split into four
//! quadrants until `max_depth` is reached.

use crate::numerical::surface::EvaluationDomain;
use gauss_quad::GaussLegendre;
use log::{debug, warn};
use std::cell::Cell;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuadratureError {
    #[error("cannot build a Gauss-Legendre rule of degree {degree}: {reason}")]
    Rule { degree: usize, reason: String },
    #[error("integrand is not finite at ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
    #[error("invalid quadrature parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureSettings {
    pub low_degree: usize,
    pub high_degree: usize,
    /// absolute tolerance on the whole rectangle
    pub tolerance: f64,
    pub max_depth: usize,
}

impl Default for QuadratureSettings {
    fn default() -> Self {
        QuadratureSettings {
            low_degree: 7,
            high_degree: 15,
            tolerance: 1e-10,
            max_depth: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureResult {
    pub value: f64,
    /// sum of |high - low| over the accepted cells
    pub error_estimate: f64,
    pub cells: usize,
    /// some cell was accepted at max depth without meeting its tolerance
    pub reached_max_depth: bool,
}

#[derive(Debug, Clone, Copy)]
struct Cell2D {
    x: (f64, f64),
    y: (f64, f64),
}

impl Cell2D {
    fn quadrants(&self) -> [Cell2D; 4] {
        let xm = 0.5 * (self.x.0 + self.x.1);
        let ym = 0.5 * (self.y.0 + self.y.1);
        [
            Cell2D { x: (self.x.0, xm), y: (self.y.0, ym) },
            Cell2D { x: (xm, self.x.1), y: (self.y.0, ym) },
            Cell2D { x: (self.x.0, xm), y: (ym, self.y.1) },
            Cell2D { x: (xm, self.x.1), y: (ym, self.y.1) },
        ]
    }
}

pub struct AdaptiveCubature {
    low: GaussLegendre,
    high: GaussLegendre,
    settings: QuadratureSettings,
}

impl AdaptiveCubature {
    pub fn new(settings: QuadratureSettings) -> Result<Self, QuadratureError> {
        if settings.low_degree >= settings.high_degree {
            return Err(QuadratureError::InvalidParameter(format!(
                "low degree {} must be below high degree {}",
                settings.low_degree, settings.high_degree
            )));
        }
        if !(settings.tolerance > 0.0) {
            return Err(QuadratureError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                settings.tolerance
            )));
        }
        let rule = |degree: usize| {
            GaussLegendre::new(degree).map_err(|e| QuadratureError::Rule {
                degree,
                reason: format!("{:?}", e),
            })
        };
        Ok(AdaptiveCubature {
            low: rule(settings.low_degree)?,
            high: rule(settings.high_degree)?,
            settings,
        })
    }

    pub fn settings(&self) -> &QuadratureSettings {
        &self.settings
    }

    /// tensor rule on one cell, y outer and x inner
    fn tensor<F>(rule: &GaussLegendre, f: &F, cell: &Cell2D) -> Result<f64, QuadratureError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let bad_sample: Cell<Option<(f64, f64)>> = Cell::new(None);
        let value = rule.integrate(cell.y.0, cell.y.1, |y| {
            rule.integrate(cell.x.0, cell.x.1, |x| {
                let v = f(x, y);
                if v.is_finite() {
                    v
                } else {
                    bad_sample.set(Some((x, y)));
                    0.0
                }
            })
        });
        match bad_sample.get() {
            Some((x, y)) => Err(QuadratureError::NonFinite { x, y }),
            None => Ok(value),
        }
    }

    fn integrate_cell<F>(
        &self,
        f: &F,
        cell: Cell2D,
        tolerance: f64,
        depth: usize,
        result: &mut QuadratureResult,
    ) -> Result<(), QuadratureError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let coarse = Self::tensor(&self.low, f, &cell)?;
        let fine = Self::tensor(&self.high, f, &cell)?;
        let error = (fine - coarse).abs();
        if error <= tolerance || depth >= self.settings.max_depth {
            if error > tolerance {
                result.reached_max_depth = true;
            }
            result.value += fine;
            result.error_estimate += error;
            result.cells += 1;
            return Ok(());
        }
        for quadrant in cell.quadrants() {
            self.integrate_cell(f, quadrant, tolerance / 4.0, depth + 1, result)?;
        }
        Ok(())
    }

    /// ∫∫ f(x, y) dx dy over `domain`.
    pub fn integrate<F>(
        &self,
        f: F,
        domain: &EvaluationDomain,
    ) -> Result<QuadratureResult, QuadratureError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut result = QuadratureResult {
            value: 0.0,
            error_estimate: 0.0,
            cells: 0,
            reached_max_depth: false,
        };
        let root = Cell2D {
            x: domain.x_bounds(),
            y: domain.y_bounds(),
        };
        self.integrate_cell(&f, root, self.settings.tolerance, 0, &mut result)?;
        if result.reached_max_depth {
            warn!(
                "cubature reached depth {} with error estimate {:e}",
                self.settings.max_depth, result.error_estimate
            );
        }
        debug!(
            "cubature: {} over {} cells, error estimate {:e}",
            result.value, result.cells, result.error_estimate
        );
        Ok(result)
    }
}
