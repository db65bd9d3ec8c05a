//! Token Types
//!
//! Refresh token record and use outcome definitions.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// Revocation reason recorded when a non-active token is presented.
pub const BREACH_REASON: &str = "reuse of rotated/revoked token";

/// Lifecycle state of a refresh token.
///
/// Transitions are monotonic: `Active` may become `Rotated` or `Revoked`,
/// `Rotated` may only become `Revoked`, and `Revoked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Usable.
    Active,
    /// Exchanged for a successor; any further use is a breach.
    Rotated,
    /// Terminal.
    Revoked,
}

impl TokenState {
    /// Get state as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Active => "active",
            TokenState::Rotated => "rotated",
            TokenState::Revoked => "revoked",
        }
    }

    /// Check whether a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: TokenState) -> bool {
        matches!(
            (self, next),
            (TokenState::Active, TokenState::Rotated)
                | (TokenState::Active, TokenState::Revoked)
                | (TokenState::Rotated, TokenState::Revoked)
        )
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored refresh token with lineage metadata.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Opaque random identifier; this is the credential itself.
    pub token_id: String,
    /// Owning user.
    pub user_id: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    /// Lineage shared by every token rotated from the same grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Expiration time (never changes after issue).
    pub expires_at: DateTime<Utc>,
    /// Lifecycle state.
    pub state: TokenState,
    /// Token this one was rotated from (audit only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Token this one was rotated into (audit only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<String>,
    /// Successful uses while rotation is disabled.
    #[serde(default)]
    pub reuse_count: u32,
    /// Last successful use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Revocation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Revocation reason (audit only, never surfaced to callers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_reason: Option<String>,
}

impl TokenRecord {
    /// Check if state is active.
    pub fn is_active(&self) -> bool {
        self.state == TokenState::Active
    }

    /// Check if token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check whether the token was revoked as part of breach handling.
    pub fn revoked_by_breach(&self) -> bool {
        self.revoked_reason.as_deref() == Some(BREACH_REASON)
    }

    /// Short, non-reversible identifier safe for logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.token_id)
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token", &self.fingerprint())
            .field("user_id", &self.user_id)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("family", &self.family.as_deref().map(fingerprint))
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("state", &self.state)
            .field("reuse_count", &self.reuse_count)
            .field("revoked_reason", &self.revoked_reason)
            .finish_non_exhaustive()
    }
}

/// Result of a successful refresh token use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UseOutcome {
    /// Owning user.
    pub user_id: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// Scopes carried by the token.
    pub scopes: BTreeSet<String>,
    /// Successor token when rotation is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_token_id: Option<String>,
}

impl UseOutcome {
    /// Check if the use produced a successor token.
    pub fn rotated(&self) -> bool {
        self.new_token_id.is_some()
    }
}

/// Log-safe fingerprint: base64url of the first 9 bytes of SHA-256.
pub fn fingerprint(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&hash[..9])
}
