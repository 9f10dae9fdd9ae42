//! Least-squares problem abstraction consumed by the solver.

use crate::types::NumericalError;

/// Residual vector and Jacobian at one parameter point.
///
/// `jacobian[i][j]` is `∂r_i/∂θ_j`.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Residuals `r_i(θ)`.
    pub residuals: Vec<f64>,
    /// Jacobian rows, one per residual.
    pub jacobian: Vec<Vec<f64>>,
}

impl Evaluation {
    /// Sum of squared residuals.
    #[inline]
    pub fn cost(&self) -> f64 {
        sum_of_squares(&self.residuals)
    }

    /// Whether every residual and Jacobian entry is finite.
    pub fn is_finite(&self) -> bool {
        self.residuals.iter().all(|r| r.is_finite())
            && self.jacobian.iter().flatten().all(|j| j.is_finite())
    }
}

/// A nonlinear least-squares problem `min_θ Σ r_i(θ)²`.
///
/// Implementors supply residuals and their Jacobian together so that
/// automatic differentiation can produce both in a single pass.
pub trait LeastSquaresProblem {
    /// Number of parameters in `θ`.
    fn num_params(&self) -> usize;

    /// Evaluate residuals and Jacobian at `params`.
    ///
    /// # Errors
    ///
    /// * `NumericalError` - Any residual or derivative is not finite
    fn evaluate(&self, params: &[f64]) -> Result<Evaluation, NumericalError>;

    /// Sum of squared residuals at `params`.
    ///
    /// The solver scores every trial point with this and only calls
    /// [`evaluate`](Self::evaluate) once a trial lowers the cost. Override it
    /// when residuals are cheaper than residuals plus Jacobian.
    fn cost(&self, params: &[f64]) -> Result<f64, NumericalError> {
        self.evaluate(params).map(|e| e.cost())
    }
}

/// Adapts a plain residual closure into a [`LeastSquaresProblem`].
///
/// The Jacobian is taken by central differences with step
/// `h = relative_step · max(|θ_j|, 1)`.
///
/// # Example
///
/// ```
/// use locator_core::math::solvers::{ClosureProblem, LeastSquaresProblem};
///
/// let problem = ClosureProblem::new(|p: &[f64]| vec![2.0 * p[0] + 3.0 * p[1]], 2);
/// let eval = problem.evaluate(&[1.0, 1.0]).unwrap();
/// assert!((eval.jacobian[0][0] - 2.0).abs() < 1e-6);
/// assert!((eval.jacobian[0][1] - 3.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct ClosureProblem<F> {
    residuals: F,
    num_params: usize,
    relative_step: f64,
}

impl<F> ClosureProblem<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    /// Wrap `residuals` as a problem over `num_params` parameters.
    pub fn new(residuals: F, num_params: usize) -> Self {
        Self {
            residuals,
            num_params,
            relative_step: 1e-6,
        }
    }

    /// Replace the relative finite-difference step.
    pub fn with_relative_step(mut self, relative_step: f64) -> Self {
        self.relative_step = relative_step;
        self
    }

    fn residuals_checked(&self, params: &[f64], expected: usize) -> Result<Vec<f64>, NumericalError> {
        let r = (self.residuals)(params);
        if r.len() != expected {
            return Err(NumericalError::InconsistentDimensions {
                expected,
                got: r.len(),
            });
        }
        if let Some(i) = r.iter().position(|v| !v.is_finite()) {
            return Err(NumericalError::non_finite(format!("residual {}", i)));
        }
        Ok(r)
    }
}

impl<F> LeastSquaresProblem for ClosureProblem<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    fn num_params(&self) -> usize {
        self.num_params
    }

    fn evaluate(&self, params: &[f64]) -> Result<Evaluation, NumericalError> {
        let r0 = (self.residuals)(params);
        let n_residuals = r0.len();
        if let Some(i) = r0.iter().position(|v| !v.is_finite()) {
            return Err(NumericalError::non_finite(format!("residual {}", i)));
        }

        let mut jacobian = vec![vec![0.0; params.len()]; n_residuals];
        let mut shifted = params.to_vec();

        for j in 0..params.len() {
            let h = self.relative_step * params[j].abs().max(1.0);

            shifted[j] = params[j] + h;
            let upper = shifted[j];
            let r_plus = self.residuals_checked(&shifted, n_residuals)?;

            shifted[j] = params[j] - h;
            let lower = shifted[j];
            let r_minus = self.residuals_checked(&shifted, n_residuals)?;

            shifted[j] = params[j];

            for i in 0..n_residuals {
                jacobian[i][j] = (r_plus[i] - r_minus[i]) / (upper - lower);
            }
        }

        Ok(Evaluation {
            residuals: r0,
            jacobian,
        })
    }

    fn cost(&self, params: &[f64]) -> Result<f64, NumericalError> {
        let r = (self.residuals)(params);
        let cost = sum_of_squares(&r);
        if cost.is_finite() {
            Ok(cost)
        } else {
            Err(NumericalError::non_finite("cost"))
        }
    }
}

/// Compute sum of squares of a vector.
#[inline]
pub(crate) fn sum_of_squares(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}
