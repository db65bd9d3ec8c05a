//! Service Configuration
//!
//! Deserializable configuration for a rotation service instance.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::types::policy::{duration_secs, RotationPolicy};

/// Default interval between janitor sweeps (5 minutes).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Rotation service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Policy applied when the caller does not pass one explicitly.
    #[serde(default)]
    pub policy: RotationPolicy,
    /// Interval between scheduled janitor sweeps.
    #[serde(
        rename = "cleanup_interval_secs",
        with = "duration_secs",
        default = "default_cleanup_interval"
    )]
    pub cleanup_interval: Duration,
}

fn default_cleanup_interval() -> Duration {
    DEFAULT_CLEANUP_INTERVAL
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            policy: RotationPolicy::default(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl ServiceConfig {
    /// Parse and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidPolicy {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.cleanup_interval.is_zero() {
            return Err(ConfigurationError::InvalidPolicy {
                message: "cleanup_interval must be positive".to_string(),
            });
        }
        self.policy.validate()
    }
}
