//! Rotation Error Types
//!
//! Closed error taxonomy for refresh token use and policy configuration.
//!
//! Display strings never include the token, its family or the revocation
//! reason. Callers that need those details
//! pattern-match on the structured fields instead.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Root error type for refresh token rotation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl RotationError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Token(e) => e.error_code(),
            Self::Configuration(_) => "ROTATION_CONFIG",
        }
    }

    /// OAuth2 error code to report on the wire.
    ///
    /// Every token failure maps to `invalid_grant` so that a caller cannot
    /// tell an unknown token from a revoked one.
    pub fn oauth_error(&self) -> &'static str {
        match self {
            Self::Token(_) => "invalid_grant",
            Self::Configuration(_) => "server_error",
        }
    }

    /// Check if error requires re-authentication.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Self::Token(_))
    }

    /// Borrow the token error, if this is one.
    pub fn as_token_error(&self) -> Option<&TokenError> {
        match self {
            Self::Token(e) => Some(e),
            Self::Configuration(_) => None,
        }
    }
}

/// Refresh token use failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Refresh token not found")]
    NotFound { token_id: String },

    #[error("Refresh token expired")]
    Expired {
        token_id: String,
        expired_at: DateTime<Utc>,
    },

    /// Covers explicit revocation and breach-triggered revocation alike.
    #[error("Refresh token has been revoked")]
    Revoked {
        token_id: String,
        family: Option<String>,
        reason: String,
        breach_detected: bool,
    },

    #[error("Refresh token reuse limit exceeded")]
    ReuseLimitExceeded {
        token_id: String,
        uses: u32,
        max_uses: u32,
    },
}

impl TokenError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ROTATION_NOT_FOUND",
            Self::Expired { .. } => "ROTATION_EXPIRED",
            Self::Revoked { .. } => "ROTATION_REVOKED",
            Self::ReuseLimitExceeded { .. } => "ROTATION_REUSE_LIMIT",
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Expired { .. } => "expired",
            Self::Revoked { .. } => "revoked",
            Self::ReuseLimitExceeded { .. } => "reuse_limit_exceeded",
        }
    }

    /// The token the failure refers to.
    pub fn token_id(&self) -> &str {
        match self {
            Self::NotFound { token_id }
            | Self::Expired { token_id, .. }
            | Self::Revoked { token_id, .. }
            | Self::ReuseLimitExceeded { token_id, .. } => token_id,
        }
    }
}

/// Policy configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid rotation policy: {message}")]
    InvalidPolicy { message: String },

    #[error("Unknown policy preset: {name}")]
    UnknownPreset { name: String },
}

/// Result type for rotation operations.
pub type RotationResult<T> = Result<T, RotationError>;

/// Get user-friendly error message.
///
/// Unknown, revoked and exhausted tokens share one message.
pub fn get_user_message(error: &RotationError) -> String {
    match error {
        RotationError::Token(TokenError::Expired { .. }) => {
            "Your session has expired. Please sign in again.".to_string()
        }
        RotationError::Token(_) => {
            "Your session is no longer valid. Please sign in again.".to_string()
        }
        RotationError::Configuration(_) => {
            "The authentication service is misconfigured. Please try again later.".to_string()
        }
    }
}
