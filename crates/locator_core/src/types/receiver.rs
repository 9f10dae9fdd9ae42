//! Receiver records, receiver arrays and the unknowns vector.

use super::error::ConfigurationError;

/// Number of unknowns in the fit: `(x, y, z, t)`.
pub const NUM_UNKNOWNS: usize = 4;

/// Minimum receiver count for a determined fit.
///
/// Exactly four receivers leave no redundancy for averaging noise; five or
/// more are preferable.
pub const MIN_RECEIVERS: usize = NUM_UNKNOWNS;

/// One hydrophone: fixed position and the arrival time it observed.
///
/// Arrival timestamps must share the clock of the emission time `t` and
/// belong to the same emission event. Receivers are never mutated while a
/// solve runs.
///
/// # Example
///
/// ```
/// use locator_core::types::Receiver;
///
/// let rx = Receiver::new([1.0, 0.0, 0.0], 0.0125);
/// assert!(rx.is_finite());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Receiver {
    /// Position in metres.
    pub position: [f64; 3],
    /// Observed arrival time in seconds.
    pub arrival_timestamp: f64,
}

impl Receiver {
    /// Create a receiver record.
    pub fn new(position: [f64; 3], arrival_timestamp: f64) -> Self {
        Self {
            position,
            arrival_timestamp,
        }
    }

    /// Returns true if position and timestamp are all finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.arrival_timestamp.is_finite() && self.position.iter().all(|c| c.is_finite())
    }
}

/// Validate a receiver set: enough receivers, all entries finite.
pub fn validate_receivers(receivers: &[Receiver]) -> Result<(), ConfigurationError> {
    if receivers.len() < MIN_RECEIVERS {
        return Err(ConfigurationError::InsufficientReceivers {
            got: receivers.len(),
            need: MIN_RECEIVERS,
        });
    }

    if let Some((index, rx)) = receivers.iter().enumerate().find(|(_, rx)| !rx.is_finite()) {
        return Err(ConfigurationError::non_finite(format!(
            "receiver {} has position {:?} and timestamp {}",
            index, rx.position, rx.arrival_timestamp
        )));
    }

    Ok(())
}

/// Receiver geometry supplied by the caller, without timestamps.
///
/// Positions are kept in receiver-ID order; timestamps passed to
/// [`ReceiverArray::with_arrivals`] must follow the same order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceiverArray {
    positions: Vec<[f64; 3]>,
}

impl ReceiverArray {
    /// Create an array from receiver positions in ID order.
    pub fn new(positions: Vec<[f64; 3]>) -> Self {
        Self { positions }
    }

    /// Receiver positions in ID order.
    #[inline]
    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    /// Number of receivers.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if the array has no receivers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Centroid of the receiver positions, or the origin for an empty array.
    pub fn centroid(&self) -> [f64; 3] {
        centroid(self.positions.iter())
    }

    /// Pair positions with arrival timestamps, positionally.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError::LengthMismatch` - Counts differ
    /// * `ConfigurationError::InsufficientReceivers` - Fewer than four receivers
    /// * `ConfigurationError::NonFiniteInput` - NaN or infinite entry
    pub fn with_arrivals(&self, timestamps: &[f64]) -> Result<Vec<Receiver>, ConfigurationError> {
        if timestamps.len() != self.positions.len() {
            return Err(ConfigurationError::LengthMismatch {
                positions: self.positions.len(),
                timestamps: timestamps.len(),
            });
        }

        let receivers: Vec<Receiver> = self
            .positions
            .iter()
            .zip(timestamps)
            .map(|(&position, &ts)| Receiver::new(position, ts))
            .collect();

        validate_receivers(&receivers)?;
        Ok(receivers)
    }
}

pub(crate) fn centroid<'a>(positions: impl Iterator<Item = &'a [f64; 3]>) -> [f64; 3] {
    let mut sum = [0.0; 3];
    let mut count = 0usize;
    for p in positions {
        for (s, c) in sum.iter_mut().zip(p) {
            *s += c;
        }
        count += 1;
    }
    if count == 0 {
        return sum;
    }
    sum.map(|s| s / count as f64)
}

/// The unknowns vector `θ = (x, y, z, t)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unknowns {
    /// Source x coordinate (m).
    pub x: f64,
    /// Source y coordinate (m).
    pub y: f64,
    /// Source z coordinate (m).
    pub z: f64,
    /// Emission time (s).
    pub t: f64,
}

impl Unknowns {
    /// Create an unknowns vector.
    pub fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Self { x, y, z, t }
    }

    /// Create from a position and an emission time.
    pub fn from_position(position: [f64; 3], t: f64) -> Self {
        Self::new(position[0], position[1], position[2], t)
    }

    /// Source position.
    #[inline]
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Flatten to `[x, y, z, t]`.
    #[inline]
    pub fn to_array(&self) -> [f64; NUM_UNKNOWNS] {
        [self.x, self.y, self.z, self.t]
    }

    /// Returns true if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl From<[f64; NUM_UNKNOWNS]> for Unknowns {
    fn from(theta: [f64; NUM_UNKNOWNS]) -> Self {
        Self::new(theta[0], theta[1], theta[2], theta[3])
    }
}

impl From<Unknowns> for [f64; NUM_UNKNOWNS] {
    fn from(theta: Unknowns) -> Self {
        theta.to_array()
    }
}
