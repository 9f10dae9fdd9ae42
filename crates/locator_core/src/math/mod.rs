//! Numerical building blocks for source localisation.
//!
//! - [`differentiation`]: residual gradients by forward-mode AD or central differences
//! - [`solvers`]: the Levenberg-Marquardt least-squares solver

pub mod differentiation;
pub mod solvers;
