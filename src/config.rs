//! Process-wide configuration.
//!
//! Loaded once at startup and turned into the immutable pieces every
//! instance shares: the tier table, the history threshold and the
//! notification retry policy.

use crate::notify::RetryPolicy;
use crate::tier::{TierSpec, TierTable};
use crate::validation::{validate_config, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// History size at which an instance continues as a fresh run.
pub const DEFAULT_HISTORY_THRESHOLD: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Loyalty program configuration. Every field is optional in JSON.
///
/// # Example
///
/// ```rust
/// use loyalty::config::LoyaltyConfig;
///
/// let config = LoyaltyConfig::from_json_str(r#"{
///     "tiers": [
///         { "name": "Basic", "minimum_points": 0, "guests_allowed": 0 },
///         { "name": "Elite", "minimum_points": 100, "guests_allowed": 2 }
///     ],
///     "history_threshold": 500
/// }"#).unwrap();
///
/// assert_eq!(config.tier_table().unwrap().highest().name, "Elite");
/// assert_eq!(config.notification_retry.max_attempts, 10);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyConfig {
    pub tiers: Vec<TierSpec>,
    pub history_threshold: u64,
    pub notification_retry: RetryPolicy,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            tiers: TierSpec::standard(),
            history_threshold: DEFAULT_HISTORY_THRESHOLD,
            notification_retry: RetryPolicy::default(),
        }
    }
}

impl LoyaltyConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Report every violation across all sections.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        ValidationErrors::check(validate_config(self))
    }

    pub fn tier_table(&self) -> Result<TierTable, ValidationErrors> {
        TierTable::new(self.tiers.clone())
    }
}
