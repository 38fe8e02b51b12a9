//! Configuration system for TourForge.
//!
//! Load solver configuration from TOML or YAML files to control solve
//! limits and subset enumeration without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use tourforge_config::SolverConfig;
//! use std::time::Duration;
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     memory_limit_mb = 2048
//!     integrality_tolerance = 1e-6
//!
//!     [termination]
//!     seconds_spent_limit = 30
//!
//!     [enumeration]
//!     parallel = true
//! "#).unwrap();
//!
//! assert_eq!(config.time_limit(), Duration::from_secs(30));
//! assert_eq!(config.memory_limit_mb, 2048);
//! assert!(config.enumeration.parallel);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use tourforge_config::SolverConfig;
//!
//! let config = SolverConfig::load("solver.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tourforge_core::SolveLimits;

/// Default time limit: three minutes.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 180;

/// Default memory budget for the search tree.
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 5000;

/// Default cap on subtour-elimination constraints.
pub const DEFAULT_MAX_SUBSETS: u64 = 50_000_000;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main solver configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SolverConfig {
    /// Termination configuration.
    #[serde(default)]
    pub termination: TerminationConfig,

    /// Approximate memory budget for the solver, in megabytes.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    /// Distance from an integer below which a value counts as integral.
    #[serde(default)]
    pub integrality_tolerance: f64,

    /// Subset enumeration configuration.
    #[serde(default)]
    pub enumeration: EnumerationConfig,
}

fn default_memory_limit_mb() -> u64 {
    DEFAULT_MEMORY_LIMIT_MB
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            termination: TerminationConfig::default(),
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            integrality_tolerance: 0.0,
            enumeration: EnumerationConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist, contains invalid TOML or fails
    /// [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the termination time limit.
    pub fn with_termination_seconds(mut self, seconds: u64) -> Self {
        self.termination = TerminationConfig {
            seconds_spent_limit: Some(seconds),
            minutes_spent_limit: None,
        };
        self
    }

    /// Sets the memory budget.
    pub fn with_memory_limit_mb(mut self, megabytes: u64) -> Self {
        self.memory_limit_mb = megabytes;
        self
    }

    /// Sets the integrality tolerance.
    pub fn with_integrality_tolerance(mut self, tolerance: f64) -> Self {
        self.integrality_tolerance = tolerance;
        self
    }

    /// Enables or disables parallel subset enumeration.
    pub fn with_parallel_enumeration(mut self, parallel: bool) -> Self {
        self.enumeration.parallel = parallel;
        self
    }

    /// Sets the cap on subtour-elimination constraints.
    pub fn with_max_subsets(mut self, limit: Option<u64>) -> Self {
        self.enumeration.max_subsets = limit;
        self
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.integrality_tolerance.is_finite() || self.integrality_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "integrality_tolerance must be finite and non-negative, got {}",
                self.integrality_tolerance
            )));
        }
        if self.integrality_tolerance >= 0.5 {
            return Err(ConfigError::Invalid(format!(
                "integrality_tolerance must be below 0.5, got {}",
                self.integrality_tolerance
            )));
        }
        if self.memory_limit_mb == 0 {
            return Err(ConfigError::Invalid(
                "memory_limit_mb must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the solve time limit.
    ///
    /// Convenience method that delegates to `termination.time_limit()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tourforge_config::SolverConfig;
    /// use std::time::Duration;
    ///
    /// let config = SolverConfig::from_toml_str(r#"
    ///     [termination]
    ///     minutes_spent_limit = 2
    /// "#).unwrap();
    ///
    /// assert_eq!(config.time_limit(), Duration::from_secs(120));
    /// ```
    pub fn time_limit(&self) -> Duration {
        self.termination.time_limit()
    }

    /// Limits passed to every gateway solve.
    pub fn solve_limits(&self) -> SolveLimits {
        SolveLimits {
            time_limit: self.time_limit(),
            memory_limit_mb: self.memory_limit_mb,
            integrality_tolerance: self.integrality_tolerance,
        }
    }
}

/// Termination configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TerminationConfig {
    /// Maximum seconds to spend solving.
    pub seconds_spent_limit: Option<u64>,

    /// Maximum minutes to spend solving.
    pub minutes_spent_limit: Option<u64>,
}

impl TerminationConfig {
    /// Returns the configured time limit, or three minutes when unset.
    /// Oversized values saturate at `u64::MAX` seconds.
    pub fn time_limit(&self) -> Duration {
        let seconds = self
            .seconds_spent_limit
            .unwrap_or(0)
            .saturating_add(self.minutes_spent_limit.unwrap_or(0).saturating_mul(60));
        if seconds > 0 {
            Duration::from_secs(seconds)
        } else {
            Duration::from_secs(DEFAULT_TIME_LIMIT_SECS)
        }
    }
}

/// Subset enumeration configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EnumerationConfig {
    /// Enumerate subset sizes on the rayon pool.
    #[serde(default)]
    pub parallel: bool,

    /// Largest number of subtour-elimination constraints a build may create.
    #[serde(default = "default_max_subsets")]
    pub max_subsets: Option<u64>,
}

fn default_max_subsets() -> Option<u64> {
    Some(DEFAULT_MAX_SUBSETS)
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_subsets: default_max_subsets(),
        }
    }
}
