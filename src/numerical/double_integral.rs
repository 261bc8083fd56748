//! Double integral of f(x, y) over a rectangle with an ordered list of strategies.
//!
//! Strategies are tried in order and the first success wins. Each failure is kept in the
//! result so callers can report why the symbolic path was abandoned.
use crate::numerical::quadrature::{AdaptiveCubature, QuadratureError, QuadratureSettings};
use crate::numerical::surface::EvaluationDomain;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_integration::SymbolicIntegrationError;
use crate::symbolic::symbolic_lambdify::EvalError;
use enum_dispatch::enum_dispatch;
use log::{info, warn};
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("symbolic integration failed: {0}")]
    Symbolic(#[from] SymbolicIntegrationError),
    #[error("numerical integration failed: {0}")]
    Quadrature(#[from] QuadratureError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("every integration strategy failed: {}", attempts.join("; "))]
    Exhausted { attempts: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IntegrationMethod {
    Symbolic,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegralResult {
    pub value: f64,
    pub method: IntegrationMethod,
    /// only for the numeric path
    pub error_estimate: Option<f64>,
    /// "<strategy>: <error>" for every strategy tried before the successful one
    pub failed_attempts: Vec<String>,
}

#[enum_dispatch(Integrator)]
pub trait IntegrationStrategy {
    fn integrate(
        &self,
        function: &Expr,
        domain: &EvaluationDomain,
    ) -> Result<IntegralResult, IntegrationError>;
    fn name(&self) -> &'static str;
}

/// iterated antiderivatives, x first
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolicIntegrator;

impl IntegrationStrategy for SymbolicIntegrator {
    fn integrate(
        &self,
        function: &Expr,
        domain: &EvaluationDomain,
    ) -> Result<IntegralResult, IntegrationError> {
        let value = function.double_definite_integrate(domain.x_bounds(), domain.y_bounds())?;
        Ok(IntegralResult {
            value,
            method: IntegrationMethod::Symbolic,
            error_estimate: None,
            failed_attempts: Vec::new(),
        })
    }
    fn name(&self) -> &'static str {
        "symbolic"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveQuadrature {
    pub settings: QuadratureSettings,
}

impl IntegrationStrategy for AdaptiveQuadrature {
    fn integrate(
        &self,
        function: &Expr,
        domain: &EvaluationDomain,
    ) -> Result<IntegralResult, IntegrationError> {
        let f = function.lambdify_xy()?;
        let result = AdaptiveCubature::new(self.settings)?.integrate(f, domain)?;
        Ok(IntegralResult {
            value: result.value,
            method: IntegrationMethod::Numeric,
            error_estimate: Some(result.error_estimate),
            failed_attempts: Vec::new(),
        })
    }
    fn name(&self) -> &'static str {
        "adaptive quadrature"
    }
}

#[enum_dispatch]
#[derive(Debug, Clone, Copy)]
pub enum Integrator {
    SymbolicIntegrator,
    AdaptiveQuadrature,
}

/// Ordered strategies; the first success wins.
#[derive(Debug, Clone)]
pub struct DoubleIntegral {
    strategies: Vec<Integrator>,
}

impl DoubleIntegral {
    /// symbolic (when enabled) then adaptive quadrature
    pub fn new(symbolic: bool, quadrature: QuadratureSettings) -> Self {
        let mut strategies: Vec<Integrator> = Vec::with_capacity(2);
        if symbolic {
            strategies.push(SymbolicIntegrator.into());
        }
        strategies.push(AdaptiveQuadrature { settings: quadrature }.into());
        DoubleIntegral { strategies }
    }

    pub fn integrate(
        &self,
        function: &Expr,
        domain: &EvaluationDomain,
    ) -> Result<IntegralResult, IntegrationError> {
        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            match strategy.integrate(function, domain) {
                Ok(mut result) => {
                    info!(
                        "integral of {} over {:?} = {} ({})",
                        function, domain, result.value, strategy.name()
                    );
                    result.failed_attempts = attempts;
                    return Ok(result);
                }
                Err(e) => {
                    warn!("{} integration of {} failed: {}", strategy.name(), function, e);
                    attempts.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }
        Err(IntegrationError::Exhausted { attempts })
    }
}

impl Default for DoubleIntegral {
    fn default() -> Self {
        Self::new(true, QuadratureSettings::default())
    }
}
