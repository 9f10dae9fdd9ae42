//! Time-of-arrival source localisation.
//!
//! This module provides:
//! - `residual`: Per-receiver time-of-flight residual and propagation model
//! - `problem`: Stacked residual/Jacobian assembly over all receivers
//! - `locator`: [`SourceLocator`] facade with initial-guess policy and batch solving

mod locator;
mod problem;
mod residual;

pub use locator::{InitialGuess, SourceEstimate, SourceLocator};
pub use problem::LocalisationProblem;
pub use residual::{
    ArrivalTimeResidual, PropagationModel, ResidualModel, DEFAULT_DISTANCE_EPSILON,
    DEFAULT_SPEED_OF_SOUND,
};
