//! Central finite-difference fallback.

use super::{check_finite, Differentiator};
use crate::locate::ResidualModel;
use crate::types::{ConfigurationError, NumericalError, NUM_UNKNOWNS};

/// Default relative step for central differences.
pub const DEFAULT_RELATIVE_STEP: f64 = 1e-6;

/// Gradients by central differences, accurate to `O(h²)`.
///
/// The step for unknown `j` is `h_j = relative_step · max(|θ_j|, 1)`, so it
/// scales with the parameter but never collapses near zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CentralDifference {
    relative_step: f64,
}

impl Default for CentralDifference {
    fn default() -> Self {
        Self {
            relative_step: DEFAULT_RELATIVE_STEP,
        }
    }
}

impl CentralDifference {
    /// Create an engine with a custom relative step.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError::InvalidParameter` - Step is not finite and positive
    pub fn new(relative_step: f64) -> Result<Self, ConfigurationError> {
        if !relative_step.is_finite() || relative_step <= 0.0 {
            return Err(ConfigurationError::invalid_parameter(format!(
                "finite-difference step must be finite and positive, got {}",
                relative_step
            )));
        }
        Ok(Self { relative_step })
    }

    /// The relative step.
    #[inline]
    pub fn relative_step(&self) -> f64 {
        self.relative_step
    }

    #[inline]
    fn step_for(&self, value: f64) -> f64 {
        self.relative_step * value.abs().max(1.0)
    }
}

impl Differentiator for CentralDifference {
    fn value_and_gradient<M: ResidualModel>(
        &self,
        model: &M,
        theta: &[f64; NUM_UNKNOWNS],
    ) -> Result<(f64, [f64; NUM_UNKNOWNS]), NumericalError> {
        let value: f64 = model.residual(theta);
        let mut gradient = [0.0; NUM_UNKNOWNS];

        for (j, slot) in gradient.iter_mut().enumerate() {
            let h = self.step_for(theta[j]);

            let mut plus = *theta;
            plus[j] += h;
            let mut minus = *theta;
            minus[j] -= h;

            let r_plus: f64 = model.residual(&plus);
            let r_minus: f64 = model.residual(&minus);
            *slot = (r_plus - r_minus) / (plus[j] - minus[j]);
        }

        check_finite(value, &gradient, self.name())?;
        Ok((value, gradient))
    }

    fn name(&self) -> &'static str {
        "central-difference"
    }
}
