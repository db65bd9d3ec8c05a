//! Policy Builder
//!
//! Fluent builder for rotation policies.

use std::time::Duration;

use crate::error::{ConfigurationError, RotationError};
use crate::types::{PolicyPreset, RotationPolicy};

/// Rotation policy builder, seeded from a preset.
#[derive(Debug, Clone)]
pub struct RotationPolicyBuilder {
    policy: RotationPolicy,
    expires_in_secs: Option<f64>,
    reuse_window_secs: Option<f64>,
}

impl RotationPolicyBuilder {
    /// Create new builder starting from the strict preset.
    pub fn new() -> Self {
        Self::from_preset(PolicyPreset::Strict)
    }

    /// Create builder starting from a preset.
    pub fn from_preset(preset: PolicyPreset) -> Self {
        Self {
            policy: RotationPolicy::from_preset(preset),
            expires_in_secs: None,
            reuse_window_secs: None,
        }
    }

    /// Enable or disable rotation on use.
    pub fn rotate_on_use(mut self, enable: bool) -> Self {
        self.policy.rotate_on_use = enable;
        self
    }

    /// Enable or disable token families.
    pub fn family(mut self, enable: bool) -> Self {
        self.policy.family = enable;
        self
    }

    /// Set uses allowed beyond the first.
    pub fn max_reuse(mut self, max_reuse: u32) -> Self {
        self.policy.max_reuse = max_reuse;
        self
    }

    /// Set reuse window.
    pub fn reuse_window(mut self, window: Duration) -> Self {
        self.policy.reuse_window = window;
        self.reuse_window_secs = None;
        self
    }

    /// Set reuse window in (fractional) seconds.
    pub fn reuse_window_secs(mut self, secs: f64) -> Self {
        self.reuse_window_secs = Some(secs);
        self
    }

    /// Set token lifetime.
    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.policy.expires_in = expires_in;
        self.expires_in_secs = None;
        self
    }

    /// Set token lifetime in (fractional) seconds.
    pub fn expires_in_secs(mut self, secs: f64) -> Self {
        self.expires_in_secs = Some(secs);
        self
    }

    /// Build the policy.
    pub fn build(self) -> Result<RotationPolicy, RotationError> {
        let mut policy = self.policy;

        if let Some(secs) = self.expires_in_secs {
            policy.expires_in = seconds("expires_in", secs)?;
        }
        if let Some(secs) = self.reuse_window_secs {
            policy.reuse_window = seconds("reuse_window", secs)?;
        }

        policy.validate()?;
        Ok(policy)
    }
}

impl Default for RotationPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn seconds(field: &str, secs: f64) -> Result<Duration, ConfigurationError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigurationError::InvalidPolicy {
        message: format!("{} must be a finite, non-negative number of seconds", field),
    })
}

/// Create a new rotation policy builder.
pub fn rotation_policy() -> RotationPolicyBuilder {
    RotationPolicyBuilder::new()
}
