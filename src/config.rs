//! Analysis configuration loaded from TOML
//!
//! ```toml
//! [estimator]
//! confidence = 99.0
//!
//! [simulation]
//! sample_size = 5000
//! seed = 42
//! ```

use crate::estimator::EstimatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Monte Carlo settings for path simulations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Samples drawn per simulated path
    pub sample_size: usize,
    /// RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            seed: None,
        }
    }
}

/// Complete configuration of an analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub estimator: EstimatorConfig,
    pub simulation: SimulationConfig,
}

impl AnalysisConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.estimator.validate().map_err(ConfigError::Invalid)?;
        if self.simulation.sample_size == 0 {
            return Err(ConfigError::Invalid(
                "simulation.sample_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
