use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::path::Path;

use crate::blockchain::chain::MINING_REWARD;
use crate::blockchain::pow::MINING_DIFFICULTY;
use crate::blockchain::transaction::Amount;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables of a single ledger
///
/// Every field is optional in the TOML form:
///
/// ```toml
/// difficulty = 3
/// mining_reward = 1.0
/// max_nonce = 1000000
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex digits a block hash must carry
    pub difficulty: usize,

    /// Amount minted to the operator for every mined block
    pub mining_reward: Amount,

    /// Optional cap on proof-of-work attempts; unbounded when absent
    pub max_nonce: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: MINING_DIFFICULTY,
            mining_reward: MINING_REWARD,
            max_nonce: None,
        }
    }
}

impl ChainConfig {
    /// Parses and validates a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks that the values describe a usable chain
    pub fn validate(&self) -> Result<(), ConfigError> {
        // a SHA-256 digest has 64 hex digits
        if self.difficulty == 0 || self.difficulty > 64 {
            return Err(ConfigError::Invalid(format!(
                "difficulty must be between 1 and 64, got {}",
                self.difficulty
            )));
        }

        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mining reward must be a finite non-negative amount, got {}",
                self.mining_reward
            )));
        }

        Ok(())
    }
}
