//! Rotation Policy
//!
//! Policy knobs that decide how a refresh token behaves on use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigurationError;

/// Default refresh token lifetime (30 days).
pub const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Longest lifetime a policy may request (10 years).
pub const MAX_EXPIRES_IN: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Named policy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    /// Rotate on every use, no reuse.
    Strict,
    /// Rotate on every use, with a short reuse allowance.
    Moderate,
    /// No rotation; up to six uses inside five minutes.
    Lenient,
}

impl PolicyPreset {
    /// Get preset name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyPreset::Strict => "strict",
            PolicyPreset::Moderate => "moderate",
            PolicyPreset::Lenient => "lenient",
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyPreset {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(PolicyPreset::Strict),
            "moderate" => Ok(PolicyPreset::Moderate),
            "lenient" => Ok(PolicyPreset::Lenient),
            _ => Err(ConfigurationError::UnknownPreset {
                name: s.to_string(),
            }),
        }
    }
}

/// Refresh token rotation policy.
///
/// `reuse_window` and `max_reuse` only apply when `rotate_on_use` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Issue a successor and retire the presented token on every use.
    pub rotate_on_use: bool,
    /// How long after issue further uses are accepted.
    #[serde(rename = "reuse_window_secs", with = "duration_secs")]
    pub reuse_window: Duration,
    /// Uses allowed beyond the first.
    pub max_reuse: u32,
    /// Group rotated tokens into a family for cascading revocation.
    pub family: bool,
    /// Token lifetime; fractional seconds are honoured.
    #[serde(rename = "expires_in_secs", with = "duration_secs")]
    pub expires_in: Duration,
}

impl RotationPolicy {
    /// Strict preset.
    pub fn strict() -> Self {
        Self {
            rotate_on_use: true,
            reuse_window: Duration::ZERO,
            max_reuse: 0,
            family: true,
            expires_in: DEFAULT_EXPIRES_IN,
        }
    }

    /// Moderate preset.
    pub fn moderate() -> Self {
        Self {
            rotate_on_use: true,
            reuse_window: Duration::from_secs(60),
            max_reuse: 1,
            family: true,
            expires_in: DEFAULT_EXPIRES_IN,
        }
    }

    /// Lenient preset.
    pub fn lenient() -> Self {
        Self {
            rotate_on_use: false,
            reuse_window: Duration::from_secs(300),
            max_reuse: 5,
            family: false,
            expires_in: DEFAULT_EXPIRES_IN,
        }
    }

    /// Policy for a named preset.
    pub fn from_preset(preset: PolicyPreset) -> Self {
        match preset {
            PolicyPreset::Strict => Self::strict(),
            PolicyPreset::Moderate => Self::moderate(),
            PolicyPreset::Lenient => Self::lenient(),
        }
    }

    /// Total uses allowed when rotation is disabled.
    pub fn max_uses(&self) -> u32 {
        self.max_reuse.saturating_add(1)
    }

    /// Token lifetime as a chrono duration.
    pub fn expires_in_delta(&self) -> chrono::Duration {
        to_delta(self.expires_in)
    }

    /// Reuse window as a chrono duration.
    pub fn reuse_window_delta(&self) -> chrono::Duration {
        to_delta(self.reuse_window)
    }

    /// Validate policy bounds.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.expires_in.is_zero() {
            return Err(ConfigurationError::InvalidPolicy {
                message: "expires_in must be positive".to_string(),
            });
        }
        if self.expires_in > MAX_EXPIRES_IN {
            return Err(ConfigurationError::InvalidPolicy {
                message: format!(
                    "expires_in must not exceed {} seconds",
                    MAX_EXPIRES_IN.as_secs()
                ),
            });
        }
        if self.reuse_window > MAX_EXPIRES_IN {
            return Err(ConfigurationError::InvalidPolicy {
                message: format!(
                    "reuse_window must not exceed {} seconds",
                    MAX_EXPIRES_IN.as_secs()
                ),
            });
        }
        Ok(())
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration)
        .unwrap_or_else(|_| chrono::Duration::seconds(MAX_EXPIRES_IN.as_secs() as i64))
}

/// Serde adapter encoding a `Duration` as fractional seconds.
pub(crate) mod duration_secs {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
