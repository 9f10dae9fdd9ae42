//! Nonlinear least-squares solving.
//!
//! ## Available Solvers
//!
//! - [`LevenbergMarquardtSolver`]: damped Gauss-Newton over any [`LeastSquaresProblem`]
//!
//! ## Configuration
//!
//! The LM solver uses [`LMConfig`] for configuring:
//! - `max_iterations`: Iteration budget (default: 100)
//! - `function_tolerance` / `step_tolerance`: Convergence tolerances (default: 1e-9)
//! - damping schedule (`initial_lambda`, `lambda_up`, `lambda_down`, bounds)
//! - `max_consecutive_rejections` and an optional `time_limit`
//!
//! ## Examples
//!
//! ```
//! use locator_core::math::solvers::{LevenbergMarquardtSolver, LMConfig};
//!
//! // Minimize (p[0] - 2)² + (p[1] - 3)²
//! let residuals = |params: &[f64]| -> Vec<f64> {
//!     vec![params[0] - 2.0, params[1] - 3.0]
//! };
//!
//! let solver = LevenbergMarquardtSolver::with_defaults();
//! let result = solver.solve(residuals, vec![0.0, 0.0]).unwrap();
//!
//! assert!(result.converged);
//! assert!((result.params[0] - 2.0).abs() < 1e-6);
//! ```

mod config;
mod levenberg_marquardt;
mod problem;

// Re-export public types at module level
pub use config::LMConfig;
pub use levenberg_marquardt::{
    IterationRecord, LMResult, LevenbergMarquardtSolver, SolverState, SolverStatus,
};
pub use problem::{ClosureProblem, Evaluation, LeastSquaresProblem};
