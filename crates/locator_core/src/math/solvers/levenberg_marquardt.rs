//! Levenberg-Marquardt nonlinear least-squares solver.
//!
//! This module provides the [`LevenbergMarquardtSolver`] for minimising the
//! sum of squared residuals of any [`LeastSquaresProblem`].
//!
//! # Algorithm
//!
//! Each iteration solves the damped normal equations
//!
//! ```text
//! (J^T J + λI) δ = -J^T r
//! θ_{n+1} = θ_n + δ
//! ```
//!
//! where:
//! - `J` is the Jacobian matrix of residuals
//! - `r` is the residual vector
//! - `λ` is the damping factor (adjusted during iteration)
//! - `δ` is the parameter update step
//!
//! A step that lowers the cost is accepted and `λ` shrinks towards
//! Gauss-Newton; a step that does not is rejected and `λ` grows towards
//! gradient descent. Every pass through the loop counts as one iteration,
//! accepted or not.
//!
//! # Termination
//!
//! | Status | Condition |
//! |--------|-----------|
//! | `Converged` | `‖δ‖ / max(‖θ‖, 1) < step_tolerance` with no rejection since the last accepted point, or an accepted step lowers the cost by less than `function_tolerance` relative |
//! | `MaxIterationsReached` | Iteration budget exhausted |
//! | `TimeLimitReached` | `time_limit` elapsed |
//! | `Failed` | Non-finite start, or more than `max_consecutive_rejections` rejected steps in a row |
//!
//! # Example
//!
//! ```
//! use locator_core::math::solvers::{LevenbergMarquardtSolver, LMConfig};
//!
//! // Fit y = a * exp(-b * x) to data
//! let x_data = vec![0.0, 1.0, 2.0, 3.0, 4.0];
//! let y_data = vec![1.0, 0.37, 0.14, 0.05, 0.02];
//!
//! let solver = LevenbergMarquardtSolver::new(LMConfig::default());
//!
//! // Residual function: model(x) - y
//! let residuals = |params: &[f64]| -> Vec<f64> {
//!     let a = params[0];
//!     let b = params[1];
//!     x_data.iter().zip(&y_data).map(|(&x, &y)| {
//!         a * (-b * x).exp() - y
//!     }).collect()
//! };
//!
//! let result = solver.solve(residuals, vec![1.0, 1.0]).unwrap();
//! assert!(result.converged);
//! ```

use super::config::LMConfig;
use super::problem::{sum_of_squares, ClosureProblem, Evaluation, LeastSquaresProblem};
use crate::types::{ConfigurationError, NumericalError};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Phase of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverStatus {
    /// Created, nothing evaluated yet.
    Initialized,
    /// Inside the iteration loop.
    Iterating,
    /// A convergence tolerance was met.
    Converged,
    /// The iteration budget ran out first.
    MaxIterationsReached,
    /// The wall-clock budget ran out first.
    TimeLimitReached,
    /// The solve could not make progress.
    Failed,
}

impl SolverStatus {
    /// Whether the solve has stopped.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initialized | Self::Iterating)
    }

    /// Whether a convergence tolerance was met.
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Iterating => "iterating",
            Self::Converged => "converged",
            Self::MaxIterationsReached => "max-iterations-reached",
            Self::TimeLimitReached => "time-limit-reached",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One row of the iteration trace.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Cost at the start of the iteration.
    pub cost: f64,
    /// Cost at the trial point, `None` if no trial point was produced.
    pub candidate_cost: Option<f64>,
    /// Norm of the proposed step.
    pub step_norm: f64,
    /// Damping used to compute the step.
    pub lambda: f64,
    /// Whether the trial point replaced the current one.
    pub accepted: bool,
}

/// Mutable state carried through the iteration loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverState {
    /// Current parameter estimate.
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    /// Iterations consumed so far.
    pub iteration: usize,
    /// Current damping factor.
    pub lambda: f64,
    /// Current phase.
    pub status: SolverStatus,
}

impl SolverState {
    /// Fresh state at `params` before anything is evaluated.
    pub fn new(params: Vec<f64>, lambda: f64) -> Self {
        Self {
            params,
            cost: f64::INFINITY,
            iteration: 0,
            lambda,
            status: SolverStatus::Initialized,
        }
    }

    fn finish(mut self, status: SolverStatus, trace: Vec<IterationRecord>) -> LMResult {
        self.status = status;
        LMResult {
            converged: status.is_converged(),
            params: self.params,
            residual_ss: self.cost,
            iterations: self.iteration,
            final_lambda: self.lambda,
            status,
            trace,
        }
    }
}

/// Result of Levenberg-Marquardt optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct LMResult {
    /// Final optimized parameters.
    pub params: Vec<f64>,
    /// Final residual sum of squares.
    pub residual_ss: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether convergence was achieved.
    pub converged: bool,
    /// Final lambda value.
    pub final_lambda: f64,
    /// Terminal status.
    pub status: SolverStatus,
    /// Per-iteration diagnostics.
    pub trace: Vec<IterationRecord>,
}

impl LMResult {
    /// Get the root mean square error.
    pub fn rmse(&self, n_observations: usize) -> f64 {
        if n_observations == 0 {
            return 0.0;
        }
        (self.residual_ss / n_observations as f64).sqrt()
    }

    /// Number of accepted steps in the trace.
    pub fn accepted_steps(&self) -> usize {
        self.trace.iter().filter(|r| r.accepted).count()
    }
}

/// Levenberg-Marquardt nonlinear least-squares solver.
///
/// Solves optimization problems of the form:
/// ```text
/// min_θ ||r(θ)||^2
/// ```
///
/// where `r(θ)` is a vector-valued function (residuals) and `θ` is a parameter vector.
///
/// # Example
///
/// ```
/// use locator_core::math::solvers::{LevenbergMarquardtSolver, LMConfig, SolverStatus};
///
/// let solver = LevenbergMarquardtSolver::new(LMConfig::default());
///
/// // Simple quadratic: minimize (p[0] - 2)^2 + (p[1] - 3)^2
/// let residuals = |params: &[f64]| -> Vec<f64> {
///     vec![params[0] - 2.0, params[1] - 3.0]
/// };
///
/// let result = solver.solve(residuals, vec![0.0, 0.0]).unwrap();
/// assert_eq!(result.status, SolverStatus::Converged);
/// assert!((result.params[0] - 2.0).abs() < 1e-6);
/// assert!((result.params[1] - 3.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtSolver {
    config: LMConfig,
}

impl LevenbergMarquardtSolver {
    /// Create a new LM solver with the given configuration.
    pub fn new(config: LMConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: LMConfig::default(),
        }
    }

    /// Get the solver configuration.
    pub fn config(&self) -> &LMConfig {
        &self.config
    }

    /// Solve a residual closure, differentiating it by central differences.
    ///
    /// # Arguments
    ///
    /// * `residuals` - Function that computes residuals given parameters
    /// * `initial_params` - Initial parameter guess
    ///
    /// # Returns
    ///
    /// * `Ok(LMResult)` - Final estimate and terminal status
    /// * `Err(ConfigurationError)` - If the configuration or starting point is unusable
    pub fn solve<F>(&self, residuals: F, initial_params: Vec<f64>) -> Result<LMResult, ConfigurationError>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let problem = ClosureProblem::new(residuals, initial_params.len());
        self.minimise(&problem, initial_params)
    }

    /// Minimise the sum of squared residuals of `problem` from `initial_params`.
    ///
    /// Non-convergence is reported through [`LMResult::status`], never as an
    /// error.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError::InvalidParameter` - Invalid configuration or empty/mismatched parameter vector
    /// * `ConfigurationError::NonFiniteInput` - Non-finite initial parameters
    pub fn minimise<P>(&self, problem: &P, initial_params: Vec<f64>) -> Result<LMResult, ConfigurationError>
    where
        P: LeastSquaresProblem + ?Sized,
    {
        self.config.validate()?;

        let n_params = initial_params.len();
        if n_params == 0 {
            return Err(ConfigurationError::invalid_parameter("Empty parameter vector"));
        }
        if n_params != problem.num_params() {
            return Err(ConfigurationError::invalid_parameter(format!(
                "Initial guess has {} parameters, problem expects {}",
                n_params,
                problem.num_params()
            )));
        }
        if initial_params.iter().any(|p| !p.is_finite()) {
            return Err(ConfigurationError::non_finite("initial parameters"));
        }

        let started = Instant::now();
        let mut state = SolverState::new(initial_params, self.config.initial_lambda);
        let mut trace = Vec::new();

        let mut current = match problem.evaluate(&state.params) {
            Ok(eval) if eval.is_finite() => eval,
            Ok(_) => {
                warn!("non-finite evaluation at initial guess");
                return Ok(state.finish(SolverStatus::Failed, trace));
            }
            Err(err) => {
                warn!(error = %err, "evaluation failed at initial guess");
                return Ok(state.finish(SolverStatus::Failed, trace));
            }
        };
        if current.residuals.is_empty() {
            return Err(ConfigurationError::invalid_parameter("Empty residual vector"));
        }

        state.cost = current.cost();
        state.status = SolverStatus::Iterating;
        debug!(
            n_params,
            n_residuals = current.residuals.len(),
            cost = state.cost,
            "starting Levenberg-Marquardt"
        );

        let mut consecutive_rejections = 0usize;

        for iteration in 0..self.config.max_iterations {
            state.iteration = iteration;

            if let Some(limit) = self.config.time_limit {
                if started.elapsed() >= limit {
                    info!(iterations = iteration, cost = state.cost, "time limit reached");
                    return Ok(state.finish(SolverStatus::TimeLimitReached, trace));
                }
            }

            let lambda = state.lambda;
            let delta = match solve_normal_equations(&current, lambda, n_params) {
                Ok(d) => d,
                Err(err) => {
                    debug!(iteration, lambda, error = %err, "damped system not solvable");
                    trace.push(IterationRecord {
                        iteration,
                        cost: state.cost,
                        candidate_cost: None,
                        step_norm: f64::NAN,
                        lambda,
                        accepted: false,
                    });
                    state.lambda = self.increase_lambda(lambda);
                    consecutive_rejections += 1;
                    if consecutive_rejections > self.config.max_consecutive_rejections {
                        state.iteration = iteration + 1;
                        warn!(iterations = state.iteration, "too many consecutive rejections");
                        return Ok(state.finish(SolverStatus::Failed, trace));
                    }
                    continue;
                }
            };

            // Step-size convergence is tested only from a freshly accepted point
            let step_norm = sum_of_squares(&delta).sqrt();
            let param_norm = sum_of_squares(&state.params).sqrt().max(1.0);
            if consecutive_rejections == 0 && step_norm / param_norm < self.config.step_tolerance {
                info!(iterations = iteration, cost = state.cost, "converged on step size");
                return Ok(state.finish(SolverStatus::Converged, trace));
            }

            // Trial update: cost first, Jacobian only for a decrease
            let trial: Vec<f64> = state.params.iter().zip(&delta).map(|(p, d)| p + d).collect();
            let candidate_cost = problem.cost(&trial).ok().filter(|c| c.is_finite());
            let candidate = match candidate_cost {
                Some(c) if c < state.cost => problem.evaluate(&trial).ok().filter(Evaluation::is_finite),
                _ => None,
            };

            let accepted = candidate.is_some();
            debug!(
                iteration,
                cost = state.cost,
                candidate_cost = candidate_cost.unwrap_or(f64::INFINITY),
                step_norm,
                lambda,
                accepted,
                "lm iteration"
            );
            trace.push(IterationRecord {
                iteration,
                cost: state.cost,
                candidate_cost,
                step_norm,
                lambda,
                accepted,
            });

            match candidate {
                Some(eval) => {
                    let new_cost = eval.cost();
                    let relative_decrease = (state.cost - new_cost) / state.cost;

                    state.params = trial;
                    state.cost = new_cost;
                    state.lambda = (lambda * self.config.lambda_down).max(self.config.min_lambda);
                    current = eval;
                    consecutive_rejections = 0;

                    if relative_decrease < self.config.function_tolerance {
                        state.iteration = iteration + 1;
                        info!(iterations = state.iteration, cost = state.cost, "converged on cost decrease");
                        return Ok(state.finish(SolverStatus::Converged, trace));
                    }
                }
                None => {
                    state.lambda = self.increase_lambda(lambda);
                    consecutive_rejections += 1;
                    if consecutive_rejections > self.config.max_consecutive_rejections {
                        state.iteration = iteration + 1;
                        warn!(iterations = state.iteration, "too many consecutive rejections");
                        return Ok(state.finish(SolverStatus::Failed, trace));
                    }
                }
            }
        }

        state.iteration = self.config.max_iterations;
        info!(
            iterations = state.iteration,
            cost = state.cost,
            "iteration budget exhausted"
        );
        Ok(state.finish(SolverStatus::MaxIterationsReached, trace))
    }

    #[inline]
    fn increase_lambda(&self, lambda: f64) -> f64 {
        (lambda * self.config.lambda_up).min(self.config.max_lambda)
    }
}

/// Solve the normal equations (J^T J + λI) δ = -J^T r
fn solve_normal_equations(
    eval: &Evaluation,
    lambda: f64,
    n_params: usize,
) -> Result<Vec<f64>, NumericalError> {
    let jacobian = &eval.jacobian;
    let residuals = &eval.residuals;

    let mut jtj = vec![vec![0.0; n_params]; n_params];
    let mut jtr = vec![0.0; n_params];

    for (row, r) in jacobian.iter().zip(residuals) {
        if row.len() != n_params {
            return Err(NumericalError::InconsistentDimensions {
                expected: n_params,
                got: row.len(),
            });
        }
        for i in 0..n_params {
            // Negative for descent direction
            jtr[i] -= row[i] * r;
            for j in 0..=i {
                jtj[i][j] += row[i] * row[j];
            }
        }
    }

    for i in 0..n_params {
        for j in 0..i {
            jtj[j][i] = jtj[i][j];
        }
        jtj[i][i] += lambda;
    }

    solve_cholesky(&jtj, &jtr)
}

/// Solve Ax = b using Cholesky decomposition.
pub(crate) fn solve_cholesky(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>, NumericalError> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return Err(NumericalError::SingularSystem(format!(
            "expected a {}x{} matrix, got {} rows",
            n,
            n,
            a.len()
        )));
    }

    // Cholesky decomposition: A = L L^T
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(NumericalError::SingularSystem(format!(
                        "matrix not positive definite at pivot {}",
                        i
                    )));
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Solve L y = b (forward substitution)
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // Solve L^T x = y (backward substitution)
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(NumericalError::non_finite("Cholesky solution"));
    }
    Ok(x)
}
