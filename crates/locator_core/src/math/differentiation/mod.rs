//! Derivatives of residual models with respect to the unknowns.
//!
//! Every engine implements [`Differentiator`], which returns the residual
//! value and its full gradient in one call:
//!
//! - [`ForwardDifferentiator`]: forward-mode AD with `Dual64`, exact to machine precision
//! - [`CentralDifference`]: central finite differences, `O(h²)` accurate
//! - [`DifferentiationMode`]: runtime choice between the two
//!
//! An engine never returns a partial gradient: either all four partial
//! derivatives are finite or the call fails with
//! [`NumericalError::NonFinite`].
//!
//! ## Example
//!
//! ```
//! use locator_core::locate::{ArrivalTimeResidual, PropagationModel};
//! use locator_core::math::differentiation::{CentralDifference, Differentiator, ForwardDifferentiator};
//! use locator_core::types::Receiver;
//!
//! let block = ArrivalTimeResidual::new(
//!     Receiver::new([10.0, 0.0, 0.0], 0.01),
//!     PropagationModel::default(),
//! );
//! let theta = [1.0, 2.0, 3.0, 0.0];
//!
//! let (r_ad, g_ad) = ForwardDifferentiator.value_and_gradient(&block, &theta).unwrap();
//! let (r_fd, g_fd) = CentralDifference::default().value_and_gradient(&block, &theta).unwrap();
//!
//! assert!((r_ad - r_fd).abs() < 1e-15);
//! for k in 0..4 {
//!     assert!((g_ad[k] - g_fd[k]).abs() < 1e-9);
//! }
//! ```

mod finite_difference;
mod forward;

pub use finite_difference::{CentralDifference, DEFAULT_RELATIVE_STEP};
pub use forward::ForwardDifferentiator;

use crate::locate::ResidualModel;
use crate::types::{NumericalError, NUM_UNKNOWNS};

/// Supplies a residual value together with its gradient.
pub trait Differentiator {
    /// Evaluate `r(θ)` and `∇r(θ)`.
    ///
    /// # Errors
    ///
    /// * `NumericalError::NonFinite` - Value or any gradient entry is NaN/infinite
    fn value_and_gradient<M: ResidualModel>(
        &self,
        model: &M,
        theta: &[f64; NUM_UNKNOWNS],
    ) -> Result<(f64, [f64; NUM_UNKNOWNS]), NumericalError>;

    /// Short engine name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Runtime-selectable differentiation engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DifferentiationMode {
    /// Forward-mode automatic differentiation.
    Forward,
    /// Central finite differences.
    CentralDifference(CentralDifference),
}

impl Default for DifferentiationMode {
    fn default() -> Self {
        Self::Forward
    }
}

impl Differentiator for DifferentiationMode {
    fn value_and_gradient<M: ResidualModel>(
        &self,
        model: &M,
        theta: &[f64; NUM_UNKNOWNS],
    ) -> Result<(f64, [f64; NUM_UNKNOWNS]), NumericalError> {
        match self {
            Self::Forward => ForwardDifferentiator.value_and_gradient(model, theta),
            Self::CentralDifference(fd) => fd.value_and_gradient(model, theta),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Forward => ForwardDifferentiator.name(),
            Self::CentralDifference(fd) => fd.name(),
        }
    }
}

/// Reject a non-finite value or gradient.
pub(crate) fn check_finite(
    value: f64,
    gradient: &[f64; NUM_UNKNOWNS],
    engine: &str,
) -> Result<(), NumericalError> {
    if !value.is_finite() {
        return Err(NumericalError::non_finite(format!("{} residual value", engine)));
    }
    if let Some(k) = gradient.iter().position(|g| !g.is_finite()) {
        return Err(NumericalError::non_finite(format!(
            "{} gradient component {}",
            engine, k
        )));
    }
    Ok(())
}
