//! Request-level pipeline: expression string in, formatted results out.
//!
//! Each request type runs independently on its own parsed expression. Computation produces a
//! report that keeps every soft failure as an `Outcome`; the report is then folded into the
//! wire response, where degenerate values take their defaults and, when enabled, are listed
//! under `diagnostics`.
use crate::config::CalculatorConfig;
use crate::numerical::NR::SolverError;
use crate::numerical::constrained::{ConstrainedOptimum, optimize_with_constraint};
use crate::numerical::critical_points::{CriticalPointSet, find_critical_points};
use crate::numerical::double_integral::{
    DoubleIntegral, IntegralResult, IntegrationError, IntegrationMethod,
};
use crate::numerical::surface::{EvaluationDomain, GridStatus, SampleGrid, Surface};
use crate::outcome::Outcome;
use crate::plot::{PointMarker, surface_figure_json};
use crate::symbolic::parse_expr::{ParseError, parse_expression};
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_engine_derivatives::{Gradient, GradientAt};
use log::info;
use serde::Serialize;
use thiserror::Error;

pub const DOMAIN_DESCRIPTION: &str = "ℝ² (todos los puntos (x,y) donde la función está definida)";
/// appended to integral values obtained by quadrature
pub const NUMERIC_SUFFIX: &str = " (numérico)";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("constraint: {0}")]
    Constraint(ParseError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// `value` with `decimals` digits; a value that rounds to zero never carries a minus sign
pub fn fixed(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    match text.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => text,
    }
}

/// Optional user bounds of a rectangle; each axis falls back to the default independently.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DomainInput {
    pub x_min: Option<f64>,
    pub x_max: Option<f64>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
}

impl DomainInput {
    pub fn resolve(&self, default: &EvaluationDomain) -> EvaluationDomain {
        EvaluationDomain::sanitized((self.x_min, self.x_max), (self.y_min, self.y_max), default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub field: String,
    /// "degenerate" or "failed"
    pub status: &'static str,
    pub reason: String,
}

impl Diagnostic {
    pub fn degenerate(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Diagnostic {
            field: field.into(),
            status: "degenerate",
            reason: reason.into(),
        }
    }

    pub fn failed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Diagnostic {
            field: field.into(),
            status: "failed",
            reason: reason.into(),
        }
    }

    /// `None` for computed values
    pub fn from_outcome<T>(field: &str, outcome: &Outcome<T>) -> Option<Self> {
        match outcome {
            Outcome::Computed { .. } => None,
            Outcome::Degenerate { reason, .. } => Some(Self::degenerate(field, reason.clone())),
            Outcome::Failed { reason } => Some(Self::failed(field, reason.clone())),
        }
    }
}

fn gated(enabled: bool, diagnostics: Vec<Diagnostic>) -> Option<Vec<Diagnostic>> {
    enabled.then_some(diagnostics)
}

////////////////////////////////////////////////////////////////////////////////////////////////
//                RESPONSES
////////////////////////////////////////////////////////////////////////////////////////////////
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculateResponse {
    pub plot_data: String,
    pub domain: String,
    pub range: String,
    pub value_at_point: String,
    pub partial_x: String,
    pub partial_y: String,
    pub gradient: [String; 2],
    pub gradient_magnitude: String,
    pub application: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<Diagnostic>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagrangeResponse {
    pub point: [String; 2],
    pub value: String,
    pub lambda: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeResponse {
    pub critical_points: Vec<[String; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lagrange: Option<LagrangeResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<Diagnostic>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrateResponse {
    pub integral_value: String,
    pub method: IntegrationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<Diagnostic>>,
}

////////////////////////////////////////////////////////////////////////////////////////////////
//                REPORTS
////////////////////////////////////////////////////////////////////////////////////////////////
/// Everything computed for /calculate except the application text.
#[derive(Debug, Clone)]
pub struct CalculateReport {
    pub function: String,
    pub domain: EvaluationDomain,
    pub point: (f64, f64),
    pub grid: SampleGrid,
    pub plot_data: String,
    pub value_at_point: Outcome<f64>,
    pub partial_x: Expr,
    pub partial_y: Expr,
    pub gradient: GradientAt,
}

impl CalculateReport {
    pub fn into_response(self, application: Outcome<String>, diagnostics: bool) -> CalculateResponse {
        let mut notes = Vec::new();
        match &self.grid.status {
            GridStatus::Computed => {}
            GridStatus::Clamped { cells } => notes.push(Diagnostic::degenerate(
                "plot_data",
                format!("{} non-finite cells clamped", cells),
            )),
            GridStatus::Fallback { reason } => {
                notes.push(Diagnostic::degenerate("plot_data", reason.clone()))
            }
        }
        notes.extend(Diagnostic::from_outcome("value_at_point", &self.value_at_point));
        notes.extend(Diagnostic::from_outcome("gradient[0]", &self.gradient.x));
        notes.extend(Diagnostic::from_outcome("gradient[1]", &self.gradient.y));
        notes.extend(Diagnostic::from_outcome("application", &application));
        CalculateResponse {
            range: self.grid.range_string(),
            plot_data: self.plot_data,
            domain: DOMAIN_DESCRIPTION.to_string(),
            value_at_point: fixed(self.value_at_point.value_or(0.0), 6),
            partial_x: self.partial_x.to_string(),
            partial_y: self.partial_y.to_string(),
            gradient: [
                fixed(self.gradient.x.value_or(0.0), 6),
                fixed(self.gradient.y.value_or(0.0), 6),
            ],
            gradient_magnitude: fixed(self.gradient.magnitude, 6),
            application: application.value_or(String::new()),
            diagnostics: gated(diagnostics, notes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizeReport {
    pub domain: EvaluationDomain,
    pub critical_points: CriticalPointSet,
    /// `None` when no constraint was given
    pub lagrange: Option<Outcome<ConstrainedOptimum>>,
}

impl OptimizeReport {
    pub fn to_response(&self, diagnostics: bool) -> OptimizeResponse {
        let critical_points = self
            .critical_points
            .points
            .iter()
            .map(|p| [fixed(p.x, 6), fixed(p.y, 6), fixed(p.value, 6)])
            .collect();
        let mut notes: Vec<Diagnostic> = self
            .critical_points
            .rejected
            .iter()
            .map(|c| {
                Diagnostic::failed(
                    format!("critical_points ({}, {})", c.x, c.y),
                    c.reason.clone(),
                )
            })
            .collect();
        let lagrange = match &self.lagrange {
            Some(Outcome::Computed { value: optimum })
            | Some(Outcome::Degenerate { value: optimum, .. }) => Some(LagrangeResponse {
                point: [fixed(optimum.x, 6), fixed(optimum.y, 6)],
                value: fixed(optimum.value, 6),
                lambda: fixed(optimum.lambda, 6),
            }),
            Some(failed @ Outcome::Failed { .. }) => {
                notes.extend(Diagnostic::from_outcome("lagrange", failed));
                None
            }
            None => None,
        };
        OptimizeResponse {
            critical_points,
            lagrange,
            diagnostics: gated(diagnostics, notes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntegrateReport {
    pub domain: EvaluationDomain,
    pub result: IntegralResult,
}

impl IntegrateReport {
    pub fn to_response(&self, diagnostics: bool) -> IntegrateResponse {
        let value = fixed(self.result.value, 8);
        let integral_value = match self.result.method {
            IntegrationMethod::Symbolic => value,
            IntegrationMethod::Numeric => format!("{}{}", value, NUMERIC_SUFFIX),
        };
        let notes = self
            .result
            .failed_attempts
            .iter()
            .map(|attempt| Diagnostic::degenerate("integral_value", attempt.clone()))
            .collect();
        IntegrateResponse {
            integral_value,
            method: self.result.method,
            error_estimate: self.result.error_estimate.map(|e| format!("{:.2e}", e)),
            diagnostics: gated(diagnostics, notes),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////
//                PIPELINE
////////////////////////////////////////////////////////////////////////////////////////////////
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluationPipeline {
    config: CalculatorConfig,
}

impl ExpressionEvaluationPipeline {
    pub fn new(config: CalculatorConfig) -> Self {
        ExpressionEvaluationPipeline { config }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.config.output.diagnostics
    }

    /// Surface, value and gradient at a point, and the symbolic partials.
    pub fn calculate(
        &self,
        function: &str,
        domain: DomainInput,
        point: (Option<f64>, Option<f64>),
    ) -> Result<CalculateReport, PipelineError> {
        let expr = parse_expression(function)?;
        let visualization = &self.config.visualization;
        let domain = domain.resolve(&visualization.domain);
        let px = point.0.filter(|v| v.is_finite()).unwrap_or(visualization.point_x);
        let py = point.1.filter(|v| v.is_finite()).unwrap_or(visualization.point_y);

        let surface = Surface::for_expression(&expr);
        let grid = surface.sample(&domain);
        let value_at_point = surface.value_at(px, py);
        let marker = domain.contains(px, py).then(|| PointMarker {
            x: px,
            y: py,
            z: value_at_point.value_or(0.0),
        });
        let plot_data = surface_figure_json(&grid, function, marker.as_ref());

        let gradient = Gradient::of(&expr);
        let gradient_at = gradient.at(px, py);
        info!(
            "calculate {}: {} surface, range {}, grad ({}, {}) at ({}, {})",
            expr,
            surface.strategy_name(),
            grid.range_string(),
            gradient.partial_x,
            gradient.partial_y,
            px,
            py
        );
        Ok(CalculateReport {
            function: function.to_string(),
            domain,
            point: (px, py),
            grid,
            plot_data,
            value_at_point,
            partial_x: gradient.partial_x,
            partial_y: gradient.partial_y,
            gradient: gradient_at,
        })
    }

    /// Critical points in the domain and, with a non-empty constraint, the Lagrange optimum.
    pub fn optimize(
        &self,
        function: &str,
        constraint: Option<&str>,
        domain: DomainInput,
    ) -> Result<OptimizeReport, PipelineError> {
        let expr = parse_expression(function)?;
        let constraint = match constraint.map(str::trim).filter(|c| !c.is_empty()) {
            Some(text) => Some(parse_expression(text).map_err(PipelineError::Constraint)?),
            None => None,
        };
        let domain = domain.resolve(&self.config.visualization.domain);
        let critical_points =
            find_critical_points(&expr, &domain, &self.config.critical_point_settings())?;
        let lagrange = constraint.map(|g| {
            match optimize_with_constraint(&expr, &g, &domain, &self.config.constrained_settings()) {
                Ok(optimum) => Outcome::computed(optimum),
                Err(e) => Outcome::failed(e.to_string()),
            }
        });
        info!(
            "optimize {}: {} critical points, lagrange {}",
            expr,
            critical_points.points.len(),
            match &lagrange {
                Some(outcome) if outcome.is_computed() => "found",
                Some(_) => "failed",
                None => "not requested",
            }
        );
        Ok(OptimizeReport {
            domain,
            critical_points,
            lagrange,
        })
    }

    /// ∫∫ f over the domain, symbolic first when enabled.
    pub fn integrate(
        &self,
        function: &str,
        domain: DomainInput,
    ) -> Result<IntegrateReport, PipelineError> {
        let expr = parse_expression(function)?;
        let domain = domain.resolve(&self.config.integration.domain);
        let integrator = DoubleIntegral::new(
            self.config.integration.symbolic,
            self.config.quadrature_settings(),
        );
        let result = integrator.integrate(&expr, &domain)?;
        Ok(IntegrateReport { domain, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::critical_points::CriticalPointKind;

    fn pipeline() -> ExpressionEvaluationPipeline {
        ExpressionEvaluationPipeline::default()
    }

    #[test]
    fn test_fixed() {
        assert_eq!(fixed(1.0, 6), "1.000000");
        assert_eq!(fixed(-1e-9, 6), "0.000000");
        assert_eq!(fixed(-0.0, 4), "0.0000");
        assert_eq!(fixed(-2.5, 2), "-2.50");
        assert_eq!(fixed(1.0 / 3.0, 8), "0.33333333");
    }

    #[test]
    fn test_calculate_paraboloid() {
        let report = pipeline()
            .calculate("x**2 + y**2", DomainInput::default(), (None, None))
            .unwrap();
        assert_eq!(report.domain, EvaluationDomain::visualization_default());
        assert_eq!(report.point, (1.0, 1.0));
        let response = report.into_response(Outcome::computed("text".to_string()), false);
        assert_eq!(response.partial_x, "2*x");
        assert_eq!(response.partial_y, "2*y");
        assert_eq!(response.value_at_point, "2.000000");
        assert_eq!(response.gradient, ["2.000000".to_string(), "2.000000".to_string()]);
        assert_eq!(response.gradient_magnitude, "2.828427");
        assert_eq!(response.range, "[0.0051, 50.0000]");
        assert_eq!(response.domain, DOMAIN_DESCRIPTION);
        assert_eq!(response.application, "text");
        assert_eq!(response.diagnostics, None);
        let figure: serde_json::Value = serde_json::from_str(&response.plot_data).unwrap();
        // (1, 1) is inside the domain, so the marker trace is present
        assert_eq!(figure["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_gradient_uses_both_coordinates() {
        let response = pipeline()
            .calculate("x*y^2", DomainInput::default(), (Some(2.0), Some(3.0)))
            .unwrap()
            .into_response(Outcome::computed(String::new()), false);
        assert_eq!(response.gradient, ["9.000000".to_string(), "12.000000".to_string()]);
        assert_eq!(response.gradient_magnitude, "15.000000");
    }

    #[test]
    fn test_point_outside_domain_has_no_marker() {
        let response = pipeline()
            .calculate("x + y", DomainInput::default(), (Some(10.0), Some(0.0)))
            .unwrap()
            .into_response(Outcome::computed(String::new()), false);
        let figure: serde_json::Value = serde_json::from_str(&response.plot_data).unwrap();
        assert_eq!(figure["data"].as_array().unwrap().len(), 1);
        assert_eq!(response.value_at_point, "10.000000");
    }

    #[test]
    fn test_singular_point_is_degenerate() {
        let report = pipeline()
            .calculate("log(x)", DomainInput::default(), (Some(0.0), Some(0.0)))
            .unwrap();
        assert!(report.value_at_point.is_degenerate());
        let response = report.into_response(Outcome::computed(String::new()), true);
        assert_eq!(response.value_at_point, "0.000000");
        let diagnostics = response.diagnostics.unwrap();
        assert!(diagnostics.iter().any(|d| d.field == "plot_data"));
        assert!(diagnostics.iter().any(|d| d.field == "value_at_point"));
        assert!(diagnostics.iter().any(|d| d.field == "gradient[0]"));
    }

    #[test]
    fn test_inverted_bounds_take_defaults() {
        let domain = DomainInput {
            x_min: Some(3.0),
            x_max: Some(-3.0),
            y_min: Some(-1.0),
            y_max: Some(1.0),
        };
        let report = pipeline().calculate("x", domain, (None, None)).unwrap();
        assert_eq!(report.domain, EvaluationDomain::new(-5.0, 5.0, -1.0, 1.0));
    }

    #[test]
    fn test_parse_errors_propagate() {
        let p = pipeline();
        assert!(matches!(
            p.calculate("x +* y", DomainInput::default(), (None, None)),
            Err(PipelineError::Parse(_))
        ));
        assert!(matches!(p.integrate("", DomainInput::default()), Err(PipelineError::Parse(_))));
        assert!(matches!(
            p.optimize("x^2", Some("z + 1"), DomainInput::default()),
            Err(PipelineError::Constraint(_))
        ));
    }

    #[test]
    fn test_optimize_paraboloid_with_constraint() {
        let report = pipeline()
            .optimize("x**2 + y**2", Some("x + y - 2"), DomainInput::default())
            .unwrap();
        assert_eq!(report.critical_points.points[0].kind, CriticalPointKind::Minimum);
        let response = report.to_response(false);
        assert_eq!(
            response.critical_points,
            vec![["0.000000".to_string(), "0.000000".to_string(), "0.000000".to_string()]]
        );
        let lagrange = response.lagrange.unwrap();
        assert_eq!(lagrange.point, ["1.000000".to_string(), "1.000000".to_string()]);
        assert_eq!(lagrange.value, "2.000000");
        assert_eq!(lagrange.lambda, "2.000000");
    }

    #[test]
    fn test_optimize_without_constraint() {
        let response = pipeline()
            .optimize("x^2 - y^2", Some("  "), DomainInput::default())
            .unwrap()
            .to_response(false);
        assert_eq!(response.critical_points.len(), 1);
        assert!(response.lagrange.is_none());
    }

    #[test]
    fn test_failed_lagrange_is_omitted() {
        let report = pipeline()
            .optimize("x^2 + y^2", Some("3"), DomainInput::default())
            .unwrap();
        assert!(report.lagrange.as_ref().unwrap().is_failed());
        let response = report.to_response(true);
        assert!(response.lagrange.is_none());
        let diagnostics = response.diagnostics.unwrap();
        assert_eq!(diagnostics.last().unwrap().field, "lagrange");
    }

    #[test]
    fn test_constrained_maximum_is_omitted() {
        let response = pipeline()
            .optimize("-(x^2 + y^2)", Some("x + y - 2"), DomainInput::default())
            .unwrap()
            .to_response(false);
        assert_eq!(response.critical_points.len(), 1);
        assert!(response.lagrange.is_none());
    }

    #[test]
    fn test_integrate_symbolic_and_numeric() {
        let p = pipeline();
        let symbolic = p.integrate("1", DomainInput::default()).unwrap().to_response(false);
        assert_eq!(symbolic.integral_value, "1.00000000");
        assert_eq!(symbolic.method, IntegrationMethod::Symbolic);
        assert_eq!(symbolic.error_estimate, None);

        let numeric = p
            .integrate("exp(-(x**2 + y**2))", DomainInput::default())
            .unwrap()
            .to_response(true);
        assert_eq!(numeric.integral_value, "0.55774629 (numérico)");
        assert!(numeric.error_estimate.is_some());
        assert_eq!(numeric.diagnostics.unwrap().len(), 1);
    }

    #[test]
    fn test_symbolic_integration_can_be_disabled() {
        let mut config = CalculatorConfig::default();
        config.integration.symbolic = false;
        let response = ExpressionEvaluationPipeline::new(config)
            .integrate("1", DomainInput::default())
            .unwrap()
            .to_response(false);
        assert_eq!(response.integral_value, "1.00000000 (numérico)");
    }
}
