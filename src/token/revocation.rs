//! Token Revocation
//!
//! Single-token and family-wide revocation. Both operations are idempotent:
//! revoking a missing or already revoked token is a no-op.

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::Clock;
use crate::telemetry::RotationMetrics;
use crate::token::TokenStore;
use crate::types::{fingerprint, BREACH_REASON};

/// Revocation manager.
pub struct RevocationManager<S: TokenStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn RotationMetrics>,
}

impl<S: TokenStore> RevocationManager<S> {
    /// Create new revocation manager.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, metrics: Arc<dyn RotationMetrics>) -> Self {
        Self {
            store,
            clock,
            metrics,
        }
    }

    /// Revoke a single token. Returns whether it changed state.
    pub fn revoke_token(&self, token: &str, reason: &str) -> bool {
        let revoked = self.store.mark_revoked(token, reason, self.clock.now());
        if revoked {
            info!(token = %fingerprint(token), reason, "revoked refresh token");
            self.metrics.record_revocation("token", 1);
        }
        revoked
    }

    /// Revoke every member of a family. Returns how many changed state.
    ///
    /// Once this returns, `is_revoked` is true for every member.
    pub fn revoke_family(&self, family: &str, reason: &str) -> usize {
        let revoked = self.store.revoke_family(family, reason, self.clock.now());
        if revoked > 0 {
            info!(family = %fingerprint(family), revoked, reason, "revoked token family");
            self.metrics.record_revocation("family", revoked);
        }
        revoked
    }

    /// Revoke the lineage of a token presented after it stopped being active.
    ///
    /// Without a family only the presented token itself is revoked.
    pub fn revoke_after_breach(&self, token: &str, family: Option<&str>) -> usize {
        let now = self.clock.now();
        let revoked = match family {
            Some(family) => self.store.revoke_family(family, BREACH_REASON, now),
            None => usize::from(self.store.mark_revoked(token, BREACH_REASON, now)),
        };
        let family_print = family.map(fingerprint).unwrap_or_else(|| "none".to_string());
        warn!(
            token = %fingerprint(token),
            family = %family_print,
            revoked,
            "refresh token reuse detected, revoked lineage"
        );
        self.metrics.record_breach(revoked);
        revoked
    }

    /// Check whether a token is unusable because it is absent or revoked.
    pub fn is_revoked(&self, token: &str) -> bool {
        self.store.is_revoked(token)
    }
}
