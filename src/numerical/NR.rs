/// Newton-Raphson for square systems of nonlinear equations.
///
///  Example#1
/// ```
/// use multivar_calc::numerical::NR::NR;
/// use multivar_calc::symbolic::parse_expr::parse_expression;
/// use nalgebra::DVector;
/// let eq_system = vec![
///     parse_expression("x^2+y^2-10").unwrap(),
///     parse_expression("x-y-4").unwrap(),
/// ];
/// let mut NR_instanse = NR::new();
/// NR_instanse
///     .set_equation_system(eq_system, vec!["x".to_string(), "y".to_string()], 1e-6, 100)
///     .unwrap();
/// NR_instanse.eq_generate().unwrap();
/// let solution = NR_instanse.solve(&[1.0, 1.0]).unwrap();
/// assert!((solution - DVector::from(vec![3.0, -1.0])).norm() < 1e-6);
/// ```
/// The symbolic Jacobian is built once by `eq_generate`; `solve` can then be started from
/// as many initial guesses as needed.
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_functions::Jacobian;
use crate::symbolic::symbolic_lambdify::EvalError;
use log::{Level, debug, log_enabled, warn};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use tabled::{builder::Builder, settings::Style};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("{equations} equations for {unknowns} unknowns")]
    NotSquare { equations: usize, unknowns: usize },
    #[error("initial guess has {got} components, expected {expected}")]
    InitialGuess { expected: usize, got: usize },
    #[error("invalid solver parameter: {0}")]
    InvalidParameter(String),
    #[error("singular jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },
    #[error("iterate became non-finite at iteration {iteration}")]
    NonFinite { iteration: usize },
    #[error("no convergence after {max_iterations} iterations (last step {last_error:e})")]
    MaxIterations { max_iterations: usize, last_error: f64 },
    #[error("stationary point ({x}, {y}) is a constrained maximum")]
    NotAMinimum { x: f64, y: f64 },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

pub struct NR {
    pub jacobian: Jacobian,   // symbolic and compiled jacobian of the system
    pub eq_system: Vec<Expr>, // vector of equations
    pub values: Vec<String>,  // vector of variables
    pub tolerance: f64,       // tolerance on the step norm
    pub max_iterations: usize, // max number of iterations

    max_error: f64,               // last step norm
    pub i: usize,                 // iteration counter
    result: Option<DVector<f64>>, // result of the last run
    calc_statistics: HashMap<String, String>,
}

impl Default for NR {
    fn default() -> Self {
        Self::new()
    }
}

impl NR {
    pub fn new() -> NR {
        NR {
            jacobian: Jacobian::new(),
            eq_system: Vec::new(),
            values: Vec::new(),
            tolerance: 1e-6,
            max_iterations: 100,
            max_error: 0.0,
            i: 0,
            result: None,
            calc_statistics: HashMap::new(),
        }
    }
    ////////////////////////////SETTERS///////////////////////////////////////////////////////////////////
    /// Basic methods to set the equation system
    pub fn set_equation_system(
        &mut self,
        eq_system: Vec<Expr>,
        unknowns: Vec<String>,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<(), SolverError> {
        if eq_system.len() != unknowns.len() || eq_system.is_empty() {
            return Err(SolverError::NotSquare {
                equations: eq_system.len(),
                unknowns: unknowns.len(),
            });
        }
        if !(tolerance > 0.0) {
            return Err(SolverError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                tolerance
            )));
        }
        if max_iterations == 0 {
            return Err(SolverError::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        self.eq_system = eq_system;
        self.values = unknowns;
        self.tolerance = tolerance;
        self.max_iterations = max_iterations;
        Ok(())
    }

    /// Builds the symbolic jacobian of the system and compiles it together with the residuals.
    pub fn eq_generate(&mut self) -> Result<(), SolverError> {
        let args: Vec<&str> = self.values.iter().map(|x| x.as_str()).collect();
        let mut Jacobian_instance = Jacobian::from_functions(self.eq_system.clone(), &args);
        Jacobian_instance.calc_jacobian();
        Jacobian_instance.lambdify()?;
        debug!(
            "jacobian of {} equations: {:?}",
            self.eq_system.len(),
            Jacobian_instance.readable_jacobian()
        );
        self.jacobian = Jacobian_instance;
        Ok(())
    }
    /////////////////////////////////////////////////////////////////////////////////////////////
    //                ITERATIONS
    /////////////////////////////////////////////////////////////////////////////////////////////
    /// one Newton step: x - J(x)^-1 F(x)
    pub fn iteration(&self, x: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let new_j = self.jacobian.evaluate_jacobian_DMatrix(x);
        let new_f = self.jacobian.evaluate_funvector_DVector(x);
        if new_j.iter().chain(new_f.iter()).any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite { iteration: self.i });
        }
        let delta = Self::solve_linear_system(&new_j, &new_f)
            .ok_or(SolverError::SingularJacobian { iteration: self.i })?;
        Ok(x - delta)
    }

    /// Iterates from `initial_guess` until the step norm drops below the tolerance.
    pub fn main_loop(&mut self, initial_guess: &[f64]) -> Result<DVector<f64>, SolverError> {
        if initial_guess.len() != self.values.len() {
            return Err(SolverError::InitialGuess {
                expected: self.values.len(),
                got: initial_guess.len(),
            });
        }
        let mut x = DVector::from_column_slice(initial_guess);
        self.i = 0;
        self.result = None;
        while self.i < self.max_iterations {
            let new_x = self.iteration(&x)?;
            if new_x.iter().any(|v| !v.is_finite()) {
                return Err(SolverError::NonFinite { iteration: self.i });
            }
            let error = (&new_x - &x).norm();
            if error > self.max_error && self.i > 0 {
                debug!("step norm is increasing: {:e}", error);
            }
            self.max_error = error;
            if error < self.tolerance {
                debug!("converged after {} iterations, step {:e}", self.i + 1, error);
                self.i += 1;
                self.result = Some(new_x.clone());
                return Ok(new_x);
            }
            x = new_x;
            self.i += 1;
            debug!("iteration = {}, error = {:e}", self.i, error)
        }
        warn!(
            "Maximum number of iterations reached from {:?}. No solution found.",
            initial_guess
        );
        Err(SolverError::MaxIterations {
            max_iterations: self.max_iterations,
            last_error: self.max_error,
        })
    }

    /// `main_loop` followed by a statistics table at debug level
    pub fn solve(&mut self, initial_guess: &[f64]) -> Result<DVector<f64>, SolverError> {
        let res = self.main_loop(initial_guess);
        self.calc_statistics();
        res
    }

    fn calc_statistics(&mut self) {
        let stats = &mut self.calc_statistics;
        stats.insert("number of unknowns".to_string(), self.values.len().to_string());
        stats.insert("number of iterations".to_string(), self.i.to_string());
        stats.insert("last step norm".to_string(), format!("{:e}", self.max_error));
        stats.insert(
            "converged".to_string(),
            self.result.is_some().to_string(),
        );
        if log_enabled!(Level::Debug) {
            let mut table = Builder::from(stats.clone()).build();
            table.with(Style::modern_rounded());
            debug!("\n \n CALC STATISTICS \n \n {}", table);
        }
    }
    //////////////////////////////////////////////////////////////////////////////////////////////
    //                  LINEAR SYSTEM SOLVERS
    //////////////////////////////////////////////////////////////////////////////////////////////
    /// LU solve of A x = b; `None` when A is singular
    pub fn solve_linear_system(A: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
        A.clone().lu().solve(b)
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
//                                     TESTS
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parse_expr::parse_expression;
    use approx::assert_relative_eq;

    fn system(equations: &[&str]) -> NR {
        let eq_system = equations
            .iter()
            .map(|e| parse_expression(e).unwrap())
            .collect();
        let mut NR_instanse = NR::new();
        NR_instanse
            .set_equation_system(eq_system, vec!["x".to_string(), "y".to_string()], 1e-10, 100)
            .unwrap();
        NR_instanse.eq_generate().unwrap();
        NR_instanse
    }

    fn assert_on_circle_and_line(solution: &DVector<f64>) {
        assert_relative_eq!(solution[0] - solution[1], 4.0, epsilon = 1e-8);
        assert_relative_eq!(solution.norm_squared(), 10.0, epsilon = 1e-8);
    }

    #[test]
    fn test_NR_circle_and_line() {
        let mut NR_instanse = system(&["x^2+y^2-10", "x-y-4"]);
        let solution = NR_instanse.solve(&[1.0, 1.0]).unwrap();
        assert_relative_eq!(solution[0], 3.0, epsilon = 1e-8);
        assert_relative_eq!(solution[1], -1.0, epsilon = 1e-8);
        assert_eq!(NR_instanse.result, Some(solution));
    }

    #[test]
    fn test_NR_reusable_for_several_guesses() {
        let mut NR_instanse = system(&["x^2+y^2-10", "x-y-4"]);
        let first = NR_instanse.solve(&[1.0, 1.0]).unwrap();
        let second = NR_instanse.solve(&[0.0, -4.0]).unwrap();
        assert_on_circle_and_line(&first);
        assert_on_circle_and_line(&second);
        assert_relative_eq!(first[0], 3.0, epsilon = 1e-8);
        assert_relative_eq!(second[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(second[1], -3.0, epsilon = 1e-8);
    }

    #[test]
    fn test_NR_solve_records_statistics() {
        let mut NR_instanse = system(&["x^2 + 1", "y"]);
        NR_instanse.max_iterations = 5;
        assert!(NR_instanse.solve(&[0.5, 0.0]).is_err());
        assert_eq!(NR_instanse.calc_statistics["converged"], "false");
        let mut NR_instanse = system(&["x-1", "y+2"]);
        NR_instanse.solve(&[0.0, 0.0]).unwrap();
        assert_eq!(NR_instanse.calc_statistics["number of unknowns"], "2");
        assert_eq!(NR_instanse.calc_statistics["converged"], "true");
        assert_eq!(
            NR_instanse.calc_statistics["number of iterations"],
            NR_instanse.i.to_string()
        );
    }

    #[test]
    fn test_NR_singular_jacobian() {
        // d(x^3)/dx vanishes at the origin
        let mut NR_instanse = system(&["x^3", "y"]);
        assert_eq!(
            NR_instanse.main_loop(&[0.0, 0.0]),
            Err(SolverError::SingularJacobian { iteration: 0 })
        );
    }

    #[test]
    fn test_NR_rejects_non_square_system() {
        let mut NR_instanse = NR::new();
        let err = NR_instanse
            .set_equation_system(vec![parse_expression("x").unwrap()], vec![], 1e-6, 10)
            .unwrap_err();
        assert_eq!(err, SolverError::NotSquare { equations: 1, unknowns: 0 });
    }

    #[test]
    fn test_NR_no_real_root() {
        let mut NR_instanse = system(&["x^2 + 1", "y"]);
        NR_instanse.max_iterations = 20;
        assert!(matches!(
            NR_instanse.main_loop(&[0.5, 0.0]),
            Err(SolverError::MaxIterations { max_iterations: 20, .. })
                | Err(SolverError::SingularJacobian { .. })
                | Err(SolverError::NonFinite { .. })
        ));
    }
}
