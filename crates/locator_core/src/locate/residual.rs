//! Time-of-flight residual model.
//!
//! For a receiver at `p_i` that observed the wavefront at `τ_i`, the residual
//! at `θ = (x, y, z, t)` is
//!
//! ```text
//! r_i(θ) = τ_i − t − sqrt(‖p_i − (x, y, z)‖² + ε) / c
//! ```
//!
//! The `ε` term keeps the residual and its gradient finite when the source
//! estimate sits exactly on a receiver, where the Euclidean norm is not
//! differentiable.

use crate::types::{ConfigurationError, Receiver, NUM_UNKNOWNS};
use num_dual::DualNum;

/// Default propagation speed: speed of sound in sea water (m/s).
pub const DEFAULT_SPEED_OF_SOUND: f64 = 1482.0;

/// Default guard added under the square root of the squared distance (m²).
pub const DEFAULT_DISTANCE_EPSILON: f64 = 1e-12;

/// A scalar residual of the four unknowns.
///
/// Implementations are written once, generically over the evaluation type,
/// so the same formula runs on `f64` and on dual numbers.
pub trait ResidualModel {
    /// Evaluate the residual at `theta = [x, y, z, t]`.
    fn residual<D: DualNum<f64> + Copy>(&self, theta: &[D; NUM_UNKNOWNS]) -> D;
}

/// Wave propagation parameters shared by every receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropagationModel {
    /// Propagation speed (m/s).
    pub speed_of_sound: f64,
    /// Guard added to the squared distance before the square root (m²).
    pub distance_epsilon: f64,
}

impl Default for PropagationModel {
    fn default() -> Self {
        Self {
            speed_of_sound: DEFAULT_SPEED_OF_SOUND,
            distance_epsilon: DEFAULT_DISTANCE_EPSILON,
        }
    }
}

impl PropagationModel {
    /// Create a model with the given speed and the default distance guard.
    pub fn new(speed_of_sound: f64) -> Self {
        Self {
            speed_of_sound,
            ..Default::default()
        }
    }

    /// Replace the distance guard.
    pub fn with_distance_epsilon(mut self, distance_epsilon: f64) -> Self {
        self.distance_epsilon = distance_epsilon;
        self
    }

    /// Check that speed and guard are finite and positive.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.speed_of_sound.is_finite() || self.speed_of_sound <= 0.0 {
            return Err(ConfigurationError::invalid_parameter(format!(
                "speed_of_sound must be finite and positive, got {}",
                self.speed_of_sound
            )));
        }
        if !self.distance_epsilon.is_finite() || self.distance_epsilon <= 0.0 {
            return Err(ConfigurationError::invalid_parameter(format!(
                "distance_epsilon must be finite and positive, got {}",
                self.distance_epsilon
            )));
        }
        Ok(())
    }

    /// Guarded distance `sqrt(‖source − receiver‖² + ε)`.
    pub fn guarded_distance<D: DualNum<f64> + Copy>(&self, source: &[D], receiver: &[f64; 3]) -> D {
        let mut squared = D::zero() + self.distance_epsilon;
        for (s, r) in source.iter().zip(receiver) {
            let delta = *s - *r;
            squared += delta * delta;
        }
        squared.sqrt()
    }

    /// Exact travel time between two points (s), without the guard.
    pub fn time_of_flight(&self, source: [f64; 3], receiver: [f64; 3]) -> f64 {
        let squared: f64 = source
            .iter()
            .zip(&receiver)
            .map(|(s, r)| (s - r) * (s - r))
            .sum();
        squared.sqrt() / self.speed_of_sound
    }
}

/// Arrival-time residual for one receiver.
///
/// # Example
///
/// ```
/// use locator_core::locate::{ArrivalTimeResidual, PropagationModel, ResidualModel};
/// use locator_core::types::Receiver;
///
/// let model = PropagationModel::new(1500.0);
/// let block = ArrivalTimeResidual::new(Receiver::new([1500.0, 0.0, 0.0], 1.0), model);
///
/// // Source at the origin emitting at t = 0 reaches the receiver after 1 s
/// let r: f64 = block.residual(&[0.0, 0.0, 0.0, 0.0]);
/// assert!(r.abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrivalTimeResidual {
    receiver: Receiver,
    propagation: PropagationModel,
}

impl ArrivalTimeResidual {
    /// Create the residual block for one receiver.
    pub fn new(receiver: Receiver, propagation: PropagationModel) -> Self {
        Self {
            receiver,
            propagation,
        }
    }

    /// The receiver this block measures.
    #[inline]
    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    /// The propagation parameters.
    #[inline]
    pub fn propagation(&self) -> &PropagationModel {
        &self.propagation
    }

    /// Predicted arrival time at this receiver for a source `theta`.
    pub fn predicted_arrival<D: DualNum<f64> + Copy>(&self, theta: &[D; NUM_UNKNOWNS]) -> D {
        let distance = self
            .propagation
            .guarded_distance(&theta[..3], &self.receiver.position);
        theta[3] + distance / self.propagation.speed_of_sound
    }
}

impl ResidualModel for ArrivalTimeResidual {
    fn residual<D: DualNum<f64> + Copy>(&self, theta: &[D; NUM_UNKNOWNS]) -> D {
        -self.predicted_arrival(theta) + self.receiver.arrival_timestamp
    }
}
