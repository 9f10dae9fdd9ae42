//! Configuration for the Levenberg-Marquardt solver.

use crate::types::ConfigurationError;
use std::time::Duration;

/// Configuration for Levenberg-Marquardt solver.
///
/// # Fields
///
/// * `max_iterations` - Iteration budget (accepted and rejected steps both count)
/// * `function_tolerance` - Converge when an accepted step lowers the cost by less than this fraction
/// * `step_tolerance` - Converge when `‖δ‖ / max(‖θ‖, 1)` falls below this
/// * `initial_lambda` - Initial damping factor
/// * `lambda_up` - Factor to increase lambda when step is rejected
/// * `lambda_down` - Factor to decrease lambda when step is accepted
/// * `min_lambda` - Minimum value for lambda
/// * `max_lambda` - Maximum value for lambda
/// * `max_consecutive_rejections` - Rejected steps in a row tolerated before failing
/// * `time_limit` - Optional wall-clock budget
///
/// # Example
///
/// ```
/// use locator_core::math::solvers::LMConfig;
///
/// let config = LMConfig {
///     max_iterations: 50,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LMConfig {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Tolerance for relative cost decrease.
    pub function_tolerance: f64,
    /// Tolerance for relative step norm.
    pub step_tolerance: f64,
    /// Initial damping factor.
    pub initial_lambda: f64,
    /// Factor to increase lambda on rejected step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on accepted step.
    pub lambda_down: f64,
    /// Minimum damping factor.
    pub min_lambda: f64,
    /// Maximum damping factor.
    pub max_lambda: f64,
    /// Consecutive rejected steps allowed before the solve fails.
    pub max_consecutive_rejections: usize,
    /// Optional wall-clock deadline for the whole solve.
    pub time_limit: Option<Duration>,
}

impl Default for LMConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            function_tolerance: 1e-9,
            step_tolerance: 1e-9,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
            max_consecutive_rejections: 10,
            time_limit: None,
        }
    }
}

impl LMConfig {
    /// Create a new LM configuration.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            function_tolerance: tolerance,
            step_tolerance: tolerance,
            max_iterations,
            ..Default::default()
        }
    }

    /// Create a fast configuration with relaxed tolerances.
    pub fn fast() -> Self {
        Self {
            function_tolerance: 1e-6,
            step_tolerance: 1e-6,
            max_iterations: 50,
            ..Default::default()
        }
    }

    /// Create a high precision configuration.
    pub fn high_precision() -> Self {
        Self {
            function_tolerance: 1e-14,
            step_tolerance: 1e-14,
            max_iterations: 500,
            ..Default::default()
        }
    }

    /// Builder method: set the wall-clock budget.
    #[inline]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Check that every setting is usable.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError::InvalidParameter` - Naming the first bad setting
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_iterations == 0 {
            return Err(ConfigurationError::invalid_parameter(
                "max_iterations must be > 0",
            ));
        }

        let positive = [
            ("function_tolerance", self.function_tolerance),
            ("step_tolerance", self.step_tolerance),
            ("initial_lambda", self.initial_lambda),
            ("min_lambda", self.min_lambda),
            ("max_lambda", self.max_lambda),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::invalid_parameter(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }

        if !(self.lambda_up.is_finite() && self.lambda_up > 1.0) {
            return Err(ConfigurationError::invalid_parameter(format!(
                "lambda_up must be > 1, got {}",
                self.lambda_up
            )));
        }
        if !(self.lambda_down > 0.0 && self.lambda_down < 1.0) {
            return Err(ConfigurationError::invalid_parameter(format!(
                "lambda_down must be in (0, 1), got {}",
                self.lambda_down
            )));
        }
        if self.min_lambda > self.max_lambda {
            return Err(ConfigurationError::invalid_parameter(format!(
                "min_lambda {} exceeds max_lambda {}",
                self.min_lambda, self.max_lambda
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LMConfig::default();
        assert_eq!(config.max_iterations, 100);
        assert!((config.function_tolerance - 1e-9).abs() < 1e-20);
        assert!((config.step_tolerance - 1e-9).abs() < 1e-20);
        assert_eq!(config.lambda_up, 10.0);
        assert_eq!(config.lambda_down, 0.1);
        assert!(config.time_limit.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_config() {
        let config = LMConfig::new(1e-12, 200);
        assert_eq!(config.function_tolerance, 1e-12);
        assert_eq!(config.step_tolerance, 1e-12);
        assert_eq!(config.max_iterations, 200);
    }

    #[test]
    fn test_fast_config() {
        let config = LMConfig::fast();
        assert!(config.function_tolerance > 1e-8);
        assert!(config.max_iterations <= 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_high_precision_config() {
        let config = LMConfig::high_precision();
        assert!(config.function_tolerance < 1e-12);
        assert!(config.max_iterations >= 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_time_limit() {
        let config = LMConfig::default().with_time_limit(Duration::from_millis(250));
        assert_eq!(config.time_limit, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_validate_zero_iterations() {
        let config = LMConfig::new(1e-9, 0);
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("max_iterations"));
    }

    #[test]
    fn test_validate_non_positive_tolerance() {
        let config = LMConfig {
            step_tolerance: 0.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("step_tolerance"));

        let config = LMConfig {
            function_tolerance: -1e-9,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_lambda_factors() {
        let config = LMConfig {
            lambda_up: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LMConfig {
            lambda_down: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_inverted_lambda_bounds() {
        let config = LMConfig {
            min_lambda: 1.0,
            max_lambda: 1e-3,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("exceeds max_lambda"));
    }

    #[test]
    fn test_config_copy() {
        let config1 = LMConfig::default();
        let config2 = config1;
        assert_eq!(config1, config2);
    }
}
