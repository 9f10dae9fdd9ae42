//! Error types for structured error handling.
//!
//! This module provides:
//! - `ConfigurationError`: Invalid input rejected before a solve starts
//! - `NumericalError`: Non-finite values or singular systems met while evaluating
//! - `LocatorError`: Umbrella error returned by the localisation entry points
//!
//! Solver outcomes that are not errors (`MaxIterationsReached`, `Failed`,
//! `TimeLimitReached`) are reported through
//! [`SolverStatus`](crate::math::solvers::SolverStatus) alongside the last
//! known estimate, never as an `Err`.

use thiserror::Error;

/// Input rejected before any iteration runs.
///
/// # Variants
/// - `InsufficientReceivers`: Fewer receivers than unknowns
/// - `LengthMismatch`: Position and timestamp arrays have different lengths
/// - `NonFiniteInput`: NaN or infinite timestamp, position or guess
/// - `InvalidParameter`: Out-of-range model or solver setting
///
/// # Examples
/// ```
/// use locator_core::types::ConfigurationError;
///
/// let err = ConfigurationError::InsufficientReceivers { got: 3, need: 4 };
/// assert_eq!(
///     format!("{}", err),
///     "Insufficient receivers: got 3, need at least 4"
/// );
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfigurationError {
    /// Fewer receivers than the four unknowns of the fit.
    #[error("Insufficient receivers: got {got}, need at least {need}")]
    InsufficientReceivers {
        /// Number of receivers supplied
        got: usize,
        /// Minimum number of receivers required
        need: usize,
    },

    /// Receiver positions and arrival timestamps do not pair up.
    #[error("Length mismatch: {positions} receiver positions but {timestamps} timestamps")]
    LengthMismatch {
        /// Number of configured receiver positions
        positions: usize,
        /// Number of supplied arrival timestamps
        timestamps: usize,
    },

    /// A timestamp, position or initial guess is NaN or infinite.
    #[error("Non-finite input: {0}")]
    NonFiniteInput(String),

    /// A model or solver parameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ConfigurationError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a non-finite input error.
    pub fn non_finite(msg: impl Into<String>) -> Self {
        Self::NonFiniteInput(msg.into())
    }
}

/// Failure while evaluating residuals or solving the damped system.
///
/// The solver treats these as rejected steps and retries with more damping
/// before giving up with [`SolverStatus::Failed`](crate::math::solvers::SolverStatus).
///
/// # Examples
/// ```
/// use locator_core::types::NumericalError;
///
/// let err = NumericalError::non_finite("residual 2");
/// assert!(format!("{}", err).contains("residual 2"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericalError {
    /// A residual or derivative evaluated to NaN or infinity.
    #[error("Non-finite value in {context}")]
    NonFinite {
        /// What was being evaluated
        context: String,
    },

    /// The damped normal equations could not be factorised.
    #[error("Singular system: {0}")]
    SingularSystem(String),

    /// A vector did not have the length the problem expects.
    #[error("Inconsistent dimensions: expected {expected} entries, got {got}")]
    InconsistentDimensions {
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },
}

impl NumericalError {
    /// Create a non-finite value error.
    pub fn non_finite(context: impl Into<String>) -> Self {
        Self::NonFinite {
            context: context.into(),
        }
    }
}

/// Error returned by the localisation entry points.
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LocatorError {
    /// Input rejected before solving.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Numerical failure from evaluating a problem directly.
    ///
    /// `SourceLocator::locate` never returns this: the solver absorbs
    /// evaluation failures into its damping retries and reports
    /// `SolverStatus::Failed`. Code that drives `LocalisationProblem` itself
    /// can lift its `NumericalError` into this variant with `?`.
    #[error("Numerical error: {0}")]
    Numerical(#[from] NumericalError),
}
