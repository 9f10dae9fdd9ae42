//! Hydrophone array configuration.
//!
//! Handles loading the receiver array and solver settings from a TOML file
//! with environment variable override support.
//!
//! ```toml
//! speed_of_sound = 1482.0
//! log_level = "info"
//!
//! [solver]
//! max_iterations = 100
//!
//! [[hydrophones]]
//! id = "h1"
//! position = [1.0, 0.0, 0.0]
//! ```

use locator_core::locate::{PropagationModel, DEFAULT_DISTANCE_EPSILON, DEFAULT_SPEED_OF_SOUND};
use locator_core::math::solvers::LMConfig;
use locator_core::types::{ReceiverArray, MIN_RECEIVERS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `speed_of_sound`.
pub const ENV_SPEED_OF_SOUND: &str = "HYDROLOCATE_SPEED_OF_SOUND";
/// Environment variable overriding `log_level`.
pub const ENV_LOG_LEVEL: &str = "HYDROLOCATE_LOG_LEVEL";
/// Environment variable overriding `solver.max_iterations`.
pub const ENV_MAX_ITERATIONS: &str = "HYDROLOCATE_MAX_ITERATIONS";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration error type
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error in config file
    #[error("Parse error: {0}")]
    Parse(String),

    /// Environment variable could not be parsed
    #[error("Environment variable {name}: cannot parse '{value}'")]
    Env {
        /// Variable name
        name: String,
        /// Offending value
        value: String,
    },

    /// One or more settings are invalid
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// One hydrophone of the array.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Hydrophone {
    /// Identifier, unique within the array
    pub id: String,
    /// Position in metres
    pub position: [f64; 3],
}

/// Solver section of the configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Iteration budget
    pub max_iterations: usize,
    /// Relative cost-decrease tolerance
    pub function_tolerance: f64,
    /// Relative step-norm tolerance
    pub step_tolerance: f64,
    /// Optional wall-clock budget in milliseconds
    pub time_limit_ms: Option<u64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let lm = LMConfig::default();
        Self {
            max_iterations: lm.max_iterations,
            function_tolerance: lm.function_tolerance,
            step_tolerance: lm.step_tolerance,
            time_limit_ms: None,
        }
    }
}

/// Hydrophone array configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HydrophoneConfig {
    /// Propagation speed (m/s)
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f64,

    /// Guard added to squared distances (m²)
    #[serde(default = "default_distance_epsilon")]
    pub distance_epsilon: f64,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Solver settings
    #[serde(default)]
    pub solver: SolverSettings,

    /// Receivers in timestamp order
    #[serde(default)]
    pub hydrophones: Vec<Hydrophone>,
}

fn default_speed_of_sound() -> f64 {
    DEFAULT_SPEED_OF_SOUND
}

fn default_distance_epsilon() -> f64 {
    DEFAULT_DISTANCE_EPSILON
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HydrophoneConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SPEED_OF_SOUND) {
            self.speed_of_sound = parse_env(ENV_SPEED_OF_SOUND, &value)?;
        }

        if let Some(value) = lookup(ENV_MAX_ITERATIONS) {
            self.solver.max_iterations = parse_env(ENV_MAX_ITERATIONS, &value)?;
        }

        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = value;
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = self.propagation().validate() {
            errors.push(e.to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log_level '{}'. Valid values: {:?}",
                self.log_level, VALID_LOG_LEVELS
            ));
        }

        if let Err(e) = self.lm_config().validate() {
            errors.push(format!("solver: {}", e));
        }

        if self.hydrophones.len() < MIN_RECEIVERS {
            errors.push(format!(
                "At least {} hydrophones are required, found {}",
                MIN_RECEIVERS,
                self.hydrophones.len()
            ));
        }

        let mut seen = HashSet::new();
        for hydrophone in &self.hydrophones {
            if hydrophone.id.trim().is_empty() {
                errors.push("Hydrophone id cannot be empty".to_string());
            } else if !seen.insert(hydrophone.id.as_str()) {
                errors.push(format!("Duplicate hydrophone id '{}'", hydrophone.id));
            }
            if hydrophone.position.iter().any(|c| !c.is_finite()) {
                errors.push(format!(
                    "Hydrophone '{}' has a non-finite position {:?}",
                    hydrophone.id, hydrophone.position
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Propagation model for the configured medium
    pub fn propagation(&self) -> PropagationModel {
        PropagationModel::new(self.speed_of_sound).with_distance_epsilon(self.distance_epsilon)
    }

    /// Solver configuration
    pub fn lm_config(&self) -> LMConfig {
        let config = LMConfig {
            max_iterations: self.solver.max_iterations,
            function_tolerance: self.solver.function_tolerance,
            step_tolerance: self.solver.step_tolerance,
            ..Default::default()
        };
        match self.solver.time_limit_ms {
            Some(ms) => config.with_time_limit(Duration::from_millis(ms)),
            None => config,
        }
    }

    /// Receiver geometry in configuration order
    pub fn receiver_array(&self) -> ReceiverArray {
        ReceiverArray::new(self.hydrophones.iter().map(|h| h.position).collect())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}
