//! High-level localisation entry point.
//!
//! [`SourceLocator`] validates receivers, picks an initial guess, shifts all
//! timestamps by the earliest arrival so the emission-time unknown stays of
//! the same order as the travel times, runs Levenberg-Marquardt and shifts
//! the result back onto the caller's clock.

use super::problem::LocalisationProblem;
use super::residual::PropagationModel;
use crate::math::differentiation::{DifferentiationMode, Differentiator};
use crate::math::solvers::{IterationRecord, LMConfig, LevenbergMarquardtSolver, SolverStatus};
use crate::types::receiver::centroid;
use crate::types::{
    validate_receivers, ConfigurationError, LocatorError, Receiver, Unknowns, NUM_UNKNOWNS,
};
use tracing::{debug, info, warn};

/// Starting point policy for a solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitialGuess {
    /// Receiver centroid, emitted at the earliest arrival time.
    #[default]
    Centroid,
    /// Caller-supplied starting point.
    Fixed(Unknowns),
}

impl InitialGuess {
    /// Concrete starting point for `receivers`.
    pub fn resolve(&self, receivers: &[Receiver]) -> Unknowns {
        match self {
            Self::Centroid => Unknowns::from_position(
                centroid(receivers.iter().map(|rx| &rx.position)),
                earliest_arrival(receivers),
            ),
            Self::Fixed(guess) => *guess,
        }
    }
}

/// Estimated source position and emission time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceEstimate {
    /// Source x coordinate (m).
    pub x: f64,
    /// Source y coordinate (m).
    pub y: f64,
    /// Source z coordinate (m).
    pub z: f64,
    /// Emission time (s), on the receivers' clock.
    pub t: f64,
    /// How the solve ended.
    pub status: SolverStatus,
    /// Iterations consumed.
    pub iterations: usize,
    /// Sum of squared residuals at the estimate (s²).
    pub final_cost: f64,
    /// Starting point used.
    pub initial_guess: Unknowns,
    /// Receivers that contributed a residual.
    pub num_receivers: usize,
    /// Per-iteration diagnostics.
    pub trace: Vec<IterationRecord>,
}

impl SourceEstimate {
    /// Whether the solver met a convergence tolerance.
    #[inline]
    pub fn converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Estimated `(x, y, z)`.
    #[inline]
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Estimate as an unknowns vector.
    #[inline]
    pub fn unknowns(&self) -> Unknowns {
        Unknowns::new(self.x, self.y, self.z, self.t)
    }

    /// Root-mean-square timing residual (s).
    pub fn rms_residual(&self) -> f64 {
        if self.num_receivers == 0 {
            return 0.0;
        }
        (self.final_cost / self.num_receivers as f64).sqrt()
    }
}

/// Locates impulsive sources from receiver arrival times.
///
/// # Example
///
/// ```
/// use locator_core::locate::{PropagationModel, SourceLocator};
/// use locator_core::math::solvers::LMConfig;
/// use locator_core::types::Receiver;
///
/// let propagation = PropagationModel::default();
/// let source = [12.0, 8.0, -6.0];
/// let receivers: Vec<Receiver> = [
///     [0.0, 0.0, 0.0],
///     [30.0, 0.0, -5.0],
///     [0.0, 30.0, -10.0],
///     [30.0, 30.0, -2.0],
///     [15.0, 15.0, -20.0],
/// ]
/// .iter()
/// .map(|&p| Receiver::new(p, 100.25 + propagation.time_of_flight(source, p)))
/// .collect();
///
/// let locator = SourceLocator::new(propagation, LMConfig::default());
/// let estimate = locator.locate(&receivers, None).unwrap();
///
/// assert!(estimate.converged());
/// assert!((estimate.t - 100.25).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLocator {
    propagation: PropagationModel,
    config: LMConfig,
    differentiation: DifferentiationMode,
}

impl Default for SourceLocator {
    fn default() -> Self {
        Self::new(PropagationModel::default(), LMConfig::default())
    }
}

impl SourceLocator {
    /// Create a locator using forward-mode AD.
    pub fn new(propagation: PropagationModel, config: LMConfig) -> Self {
        Self {
            propagation,
            config,
            differentiation: DifferentiationMode::Forward,
        }
    }

    /// Builder method: select the differentiation engine.
    #[inline]
    pub fn with_differentiator(mut self, differentiation: DifferentiationMode) -> Self {
        self.differentiation = differentiation;
        self
    }

    /// Propagation parameters.
    #[inline]
    pub fn propagation(&self) -> &PropagationModel {
        &self.propagation
    }

    /// Solver configuration.
    #[inline]
    pub fn config(&self) -> &LMConfig {
        &self.config
    }

    /// Differentiation engine in use.
    #[inline]
    pub fn differentiation(&self) -> &DifferentiationMode {
        &self.differentiation
    }

    /// Estimate the source from one set of arrivals.
    ///
    /// `initial` overrides the default centroid starting point.
    ///
    /// Non-convergence is not an error: the returned estimate carries the
    /// terminal [`SolverStatus`] and the last accepted point.
    ///
    /// # Errors
    ///
    /// * `LocatorError::Configuration` - Too few receivers, non-finite input,
    ///   or an invalid propagation model or solver configuration
    pub fn locate(
        &self,
        receivers: &[Receiver],
        initial: Option<Unknowns>,
    ) -> Result<SourceEstimate, LocatorError> {
        validate_receivers(receivers)?;

        let guess = initial
            .map(InitialGuess::Fixed)
            .unwrap_or_default()
            .resolve(receivers);
        if !guess.is_finite() {
            return Err(ConfigurationError::non_finite(format!("initial guess {:?}", guess)).into());
        }

        let reference = earliest_arrival(receivers);
        let shifted: Vec<Receiver> = receivers
            .iter()
            .map(|rx| Receiver::new(rx.position, rx.arrival_timestamp - reference))
            .collect();

        let problem = LocalisationProblem::new(&shifted, self.propagation, self.differentiation)?;
        let mut start = guess.to_array();
        start[3] -= reference;

        debug!(
            receivers = receivers.len(),
            engine = self.differentiation.name(),
            reference_time = reference,
            "locating source"
        );

        let result = LevenbergMarquardtSolver::new(self.config).minimise(&problem, start.to_vec())?;

        let mut theta = [0.0; NUM_UNKNOWNS];
        theta.copy_from_slice(&result.params);
        theta[3] += reference;

        match result.status {
            SolverStatus::Converged => info!(
                x = theta[0],
                y = theta[1],
                z = theta[2],
                t = theta[3],
                iterations = result.iterations,
                cost = result.residual_ss,
                "source located"
            ),
            status => warn!(
                %status,
                iterations = result.iterations,
                cost = result.residual_ss,
                "solver stopped without converging"
            ),
        }

        Ok(SourceEstimate {
            x: theta[0],
            y: theta[1],
            z: theta[2],
            t: theta[3],
            status: result.status,
            iterations: result.iterations,
            final_cost: result.residual_ss,
            initial_guess: guess,
            num_receivers: receivers.len(),
            trace: result.trace,
        })
    }

    /// Locate many independent events on the rayon pool.
    ///
    /// Results come back in input order; each event fails or succeeds on its own.
    #[cfg(feature = "parallel")]
    pub fn locate_batch(&self, events: &[Vec<Receiver>]) -> Vec<Result<SourceEstimate, LocatorError>> {
        use rayon::prelude::*;

        events
            .par_iter()
            .map(|receivers| self.locate(receivers, None))
            .collect()
    }

    /// Sequential fallback when parallel feature is disabled.
    #[cfg(not(feature = "parallel"))]
    pub fn locate_batch(&self, events: &[Vec<Receiver>]) -> Vec<Result<SourceEstimate, LocatorError>> {
        events
            .iter()
            .map(|receivers| self.locate(receivers, None))
            .collect()
    }
}

fn earliest_arrival(receivers: &[Receiver]) -> f64 {
    receivers
        .iter()
        .map(|rx| rx.arrival_timestamp)
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::differentiation::CentralDifference;
    use approx::assert_abs_diff_eq;

    const ARRAY: [[f64; 3]; 6] = [
        [0.0, 0.0, 0.0],
        [30.0, 0.0, -5.0],
        [0.0, 30.0, -10.0],
        [30.0, 30.0, -2.0],
        [15.0, 15.0, -20.0],
        [-10.0, 20.0, -8.0],
    ];

    fn arrivals(source: [f64; 3], t0: f64) -> Vec<Receiver> {
        let model = PropagationModel::default();
        ARRAY
            .iter()
            .map(|&p| Receiver::new(p, t0 + model.time_of_flight(source, p)))
            .collect()
    }

    // ========================================
    // InitialGuess Tests
    // ========================================

    #[test]
    fn test_centroid_guess() {
        let rx = vec![
            Receiver::new([0.0, 0.0, 0.0], 3.0),
            Receiver::new([2.0, 0.0, 0.0], 1.0),
            Receiver::new([0.0, 4.0, 0.0], 2.0),
            Receiver::new([2.0, 4.0, -8.0], 5.0),
        ];
        let guess = InitialGuess::Centroid.resolve(&rx);
        assert_eq!(guess, Unknowns::new(1.0, 2.0, -2.0, 1.0));
    }

    #[test]
    fn test_fixed_guess() {
        let fixed = Unknowns::new(10.0, 0.0, 0.0, 0.5);
        assert_eq!(InitialGuess::Fixed(fixed).resolve(&arrivals([1.0, 1.0, -1.0], 0.0)), fixed);
        assert_eq!(InitialGuess::default(), InitialGuess::Centroid);
    }

    // ========================================
    // SourceLocator Tests
    // ========================================

    #[test]
    fn test_locate_from_centroid() {
        let rx = arrivals([12.0, 8.0, -6.0], 0.25);
        let estimate = SourceLocator::default().locate(&rx, None).unwrap();

        assert!(estimate.converged());
        assert_abs_diff_eq!(estimate.x, 12.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.y, 8.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.z, -6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.t, 0.25, epsilon = 1e-9);
        assert!(estimate.final_cost < 1e-20);
        assert_eq!(estimate.num_receivers, 6);
        assert_eq!(estimate.trace.len(), estimate.iterations);
    }

    #[test]
    fn test_locate_absolute_clock() {
        // Timestamps on a clock far from zero
        let rx = arrivals([20.0, 5.0, -12.0], 86_400.0);
        let estimate = SourceLocator::default().locate(&rx, None).unwrap();

        assert!(estimate.converged());
        assert_abs_diff_eq!(estimate.x, 20.0, epsilon = 1e-5);
        assert_abs_diff_eq!(estimate.t, 86_400.0, epsilon = 1e-8);
    }

    #[test]
    fn test_locate_with_finite_differences() {
        let rx = arrivals([12.0, 8.0, -6.0], 0.25);
        let locator = SourceLocator::default()
            .with_differentiator(DifferentiationMode::CentralDifference(CentralDifference::default()));
        let estimate = locator.locate(&rx, None).unwrap();

        assert_eq!(locator.differentiation().name(), "central-difference");
        assert!(estimate.converged());
        assert_abs_diff_eq!(estimate.x, 12.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.t, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_locate_reports_initial_guess() {
        let rx = arrivals([12.0, 8.0, -6.0], 0.25);
        let start = Unknowns::new(10.0, 0.0, 0.0, rx[0].arrival_timestamp);
        let estimate = SourceLocator::default().locate(&rx, Some(start)).unwrap();
        assert_eq!(estimate.initial_guess, start);
    }

    #[test]
    fn test_locate_rejects_three_receivers() {
        let rx = arrivals([12.0, 8.0, -6.0], 0.25);
        let result = SourceLocator::default().locate(&rx[..3], None);
        assert!(matches!(
            result,
            Err(LocatorError::Configuration(ConfigurationError::InsufficientReceivers {
                got: 3,
                need: 4
            }))
        ));
    }

    #[test]
    fn test_locate_rejects_non_finite_guess() {
        let rx = arrivals([12.0, 8.0, -6.0], 0.25);
        let guess = Unknowns::new(f64::NAN, 0.0, 0.0, 0.0);
        let result = SourceLocator::default().locate(&rx, Some(guess));
        assert!(matches!(
            result,
            Err(LocatorError::Configuration(ConfigurationError::NonFiniteInput(_)))
        ));
    }

    #[test]
    fn test_locate_rejects_invalid_config() {
        let rx = arrivals([12.0, 8.0, -6.0], 0.25);
        let locator = SourceLocator::new(PropagationModel::default(), LMConfig::new(1e-9, 0));
        assert!(locator.locate(&rx, None).is_err());

        let locator = SourceLocator::new(PropagationModel::new(0.0), LMConfig::default());
        assert!(locator.locate(&rx, None).is_err());
    }

    #[test]
    fn test_rms_residual() {
        let estimate = SourceEstimate {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            t: 0.0,
            status: SolverStatus::Converged,
            iterations: 3,
            final_cost: 16.0,
            initial_guess: Unknowns::default(),
            num_receivers: 4,
            trace: Vec::new(),
        };
        assert_abs_diff_eq!(estimate.rms_residual(), 2.0, epsilon = 1e-15);
        assert_eq!(estimate.position(), [0.0, 0.0, 0.0]);
        assert_eq!(estimate.unknowns(), Unknowns::default());
    }

    #[test]
    fn test_locate_batch_preserves_order() {
        let events = vec![
            arrivals([12.0, 8.0, -6.0], 0.25),
            arrivals([3.0, 25.0, -15.0], 1.0),
            arrivals([12.0, 8.0, -6.0], 0.25)[..3].to_vec(),
        ];
        let results = SourceLocator::default().locate_batch(&events);

        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert_abs_diff_eq!(first.x, 12.0, epsilon = 1e-6);
        let second = results[1].as_ref().unwrap();
        assert_abs_diff_eq!(second.y, 25.0, epsilon = 1e-6);
        assert!(results[2].is_err());
    }

    #[test]
    fn test_earliest_arrival() {
        let rx = arrivals([29.0, 1.0, -4.0], 2.0);
        let earliest = earliest_arrival(&rx);
        assert!(rx.iter().all(|r| r.arrival_timestamp >= earliest));
        assert!(rx.iter().any(|r| r.arrival_timestamp == earliest));
    }
}
