//! Market configuration
//!
//! Missing keys fall back to their defaults; the result is validated before use.

use crate::constants::{
    DEFAULT_FEE_BPS, DEFAULT_OBSERVATION_CAPACITY, MAX_FEE_BPS, MAX_OBSERVATION_CAPACITY,
};
use crate::errors::{SpotError, SpotResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Market parameters loaded from TOML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Swap fee taken from the input (basis points)
    pub fee_bps: u16,

    /// Slots in the short-horizon observation buffer
    pub observation_capacity: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            observation_capacity: DEFAULT_OBSERVATION_CAPACITY,
        }
    }
}

impl MarketConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> SpotResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SpotError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SpotResult<Self> {
        let config: MarketConfig = toml::from_str(content)
            .map_err(|e| SpotError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> SpotResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| SpotError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| {
            SpotError::ConfigError(format!("Failed to write config file {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    pub fn validate(&self) -> SpotResult<()> {
        if self.fee_bps > MAX_FEE_BPS {
            return Err(SpotError::InvalidFee(self.fee_bps));
        }

        if self.observation_capacity == 0 || self.observation_capacity > MAX_OBSERVATION_CAPACITY {
            return Err(SpotError::InvalidParameter("observation_capacity"));
        }

        Ok(())
    }
}
