#![allow(non_camel_case_types)]

use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_lambdify::{EvalError, Lambda};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Symbolic Jacobian of a vector of functions and its compiled form.
///
/// Example#
/// ```rust, ignore
/// let functions = vec![
///     Expr::parse_expression("2*x^3 + y").unwrap(),
///     Expr::parse_expression("x - y").unwrap(),
/// ];
/// let mut jacobian = Jacobian::from_functions(functions, &["x", "y"]);
/// // symbolic partial derivatives in parallel
/// jacobian.calc_jacobian();
/// // compile residual vector and jacobian
/// jacobian.lambdify()?;
/// let x = DVector::from_vec(vec![10.0, 2.0]);
/// let J = jacobian.evaluate_jacobian_DMatrix(&x);
/// let F = jacobian.evaluate_funvector_DVector(&x);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Jacobian {
    pub vector_of_functions: Vec<Expr>, // residual functions
    pub variable_string: Vec<String>,   // unknowns, in column order
    pub symbolic_jacobian: Vec<Vec<Expr>>, // symbolic_jacobian[i][j] = d f_i / d x_j
    lambdified_functions: Vec<Lambda>,
    function_jacobian: Vec<Vec<Lambda>>,
}

impl Jacobian {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_functions(vector_of_functions: Vec<Expr>, variables: &[&str]) -> Self {
        Jacobian {
            vector_of_functions,
            variable_string: variables.iter().map(|v| v.to_string()).collect(),
            ..Self::default()
        }
    }

    /// calculate the symbolic jacobian in parallel
    pub fn calc_jacobian(&mut self) {
        let variables = &self.variable_string;
        self.symbolic_jacobian = self
            .vector_of_functions
            .par_iter()
            .map(|func| {
                variables
                    .par_iter()
                    .map(|var| func.diff(var).simplify())
                    .collect()
            })
            .collect();
    }

    /// jacobian elements rendered as strings
    pub fn readable_jacobian(&self) -> Vec<Vec<String>> {
        self.symbolic_jacobian
            .iter()
            .map(|row| row.iter().map(|el| el.to_string()).collect())
            .collect()
    }

    /// Compiles the residual vector and the jacobian. `calc_jacobian` must run first.
    pub fn lambdify(&mut self) -> Result<(), EvalError> {
        let vars: Vec<&str> = self.variable_string.iter().map(|v| v.as_str()).collect();
        self.lambdified_functions = self
            .vector_of_functions
            .iter()
            .map(|func| func.compile(&vars))
            .collect::<Result<Vec<_>, _>>()?;
        self.function_jacobian = self
            .symbolic_jacobian
            .iter()
            .map(|row| {
                row.iter()
                    .map(|el| el.compile(&vars))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    pub fn evaluate_funvector_DVector(&self, x: &DVector<f64>) -> DVector<f64> {
        let args = x.as_slice();
        DVector::from_iterator(
            self.lambdified_functions.len(),
            self.lambdified_functions.iter().map(|f| f.eval(args)),
        )
    }

    // evaluate jacobian to nalgebra DMatrix
    pub fn evaluate_jacobian_DMatrix(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let args = x.as_slice();
        let rows = self.function_jacobian.len();
        let cols = self.variable_string.len();
        DMatrix::from_fn(rows, cols, |i, j| self.function_jacobian[i][j].eval(args))
    }
}
