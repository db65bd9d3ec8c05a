//! Rotation Engine
//!
//! Validates a presented refresh token, detects reuse of retired tokens, and
//! either rotates the token or counts a use against its reuse allowance.
//!
//! Steps for every presentation:
//!
//! 1. Unknown token: `NotFound`.
//! 2. Token not active: breach. The whole family is revoked, then `Revoked`.
//! 3. Token expired: `Expired`. Expiry never escalates.
//! 4. Rotation enabled: a child is minted and the token becomes `Rotated`.
//! 5. Rotation disabled: the use is counted against the reuse allowance.
//!
//! Steps 4 and 5 are compare-and-set operations on the store that re-check
//! state and expiry under the store lock, so of several concurrent
//! presentations of one active token exactly one succeeds; the others observe
//! a retired token and go through step 2.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::core::Clock;
use crate::error::{RotationResult, TokenError};
use crate::telemetry::RotationMetrics;
use crate::token::{ReuseAllowance, RevocationManager, StoreConflict, TokenFactory, TokenStore};
use crate::types::{fingerprint, RotationPolicy, TokenRecord, TokenState, UseOutcome, BREACH_REASON};

/// Refresh token rotation engine.
pub struct RotationEngine<S: TokenStore> {
    store: Arc<S>,
    factory: Arc<TokenFactory<S>>,
    revocation: Arc<RevocationManager<S>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn RotationMetrics>,
}

impl<S: TokenStore> RotationEngine<S> {
    /// Create new rotation engine.
    pub fn new(
        store: Arc<S>,
        factory: Arc<TokenFactory<S>>,
        revocation: Arc<RevocationManager<S>>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn RotationMetrics>,
    ) -> Self {
        Self {
            store,
            factory,
            revocation,
            clock,
            metrics,
        }
    }

    /// Present a refresh token under `policy`.
    pub fn use_refresh_token(
        &self,
        token: &str,
        policy: &RotationPolicy,
    ) -> RotationResult<UseOutcome> {
        self.try_use(token, policy).map_err(|error| {
            self.metrics.record_failure(error.kind());
            error.into()
        })
    }

    fn try_use(&self, token: &str, policy: &RotationPolicy) -> Result<UseOutcome, TokenError> {
        let record = self.store.get(token).ok_or_else(|| {
            debug!(token = %fingerprint(token), "refresh token not found");
            TokenError::NotFound {
                token_id: token.to_string(),
            }
        })?;

        if !record.is_active() {
            return Err(self.breach(&record));
        }

        let now = self.clock.now();
        if record.is_expired_at(now) {
            return Err(expired(&record.token_id, record.expires_at));
        }

        if policy.rotate_on_use {
            self.rotate(&record, policy, now)
        } else {
            self.reuse(&record, policy, now)
        }
    }

    fn rotate(
        &self,
        record: &TokenRecord,
        policy: &RotationPolicy,
        now: DateTime<Utc>,
    ) -> Result<UseOutcome, TokenError> {
        let child = self.factory.mint_child(record, policy);
        let new_token_id = child.token_id.clone();

        self.store
            .mark_rotated(&record.token_id, child, now)
            .map_err(|conflict| self.resolve_conflict(record, conflict, policy))?;

        debug!(
            token = %record.fingerprint(),
            successor = %fingerprint(&new_token_id),
            user_id = %record.user_id,
            client_id = %record.client_id,
            "rotated refresh token"
        );
        self.metrics.record_rotation(&record.client_id);

        Ok(UseOutcome {
            user_id: record.user_id.clone(),
            client_id: record.client_id.clone(),
            scopes: record.scopes.clone(),
            new_token_id: Some(new_token_id),
        })
    }

    fn reuse(
        &self,
        record: &TokenRecord,
        policy: &RotationPolicy,
        now: DateTime<Utc>,
    ) -> Result<UseOutcome, TokenError> {
        let allowance = ReuseAllowance {
            max_uses: policy.max_uses(),
            window_ends_at: record
                .created_at
                .checked_add_signed(policy.reuse_window_delta())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let uses = self
            .store
            .record_use(&record.token_id, allowance, now)
            .map_err(|conflict| self.resolve_conflict(record, conflict, policy))?;

        debug!(
            token = %record.fingerprint(),
            uses,
            max_uses = allowance.max_uses,
            "reused refresh token"
        );
        self.metrics.record_reuse(&record.client_id, uses);

        Ok(UseOutcome {
            user_id: record.user_id.clone(),
            client_id: record.client_id.clone(),
            scopes: record.scopes.clone(),
            new_token_id: None,
        })
    }

    /// Map a lost compare-and-set to the failure the caller should see.
    fn resolve_conflict(
        &self,
        record: &TokenRecord,
        conflict: StoreConflict,
        policy: &RotationPolicy,
    ) -> TokenError {
        match conflict {
            // Evicted between lookup and update.
            StoreConflict::Missing => TokenError::NotFound {
                token_id: record.token_id.clone(),
            },
            // Another presentation won the race.
            StoreConflict::NotActive(state) => self.breach(&TokenRecord {
                state,
                ..record.clone()
            }),
            // Expired between lookup and update.
            StoreConflict::Expired { expires_at } => expired(&record.token_id, expires_at),
            StoreConflict::ReuseLimit { uses } => {
                debug!(token = %record.fingerprint(), uses, "refresh token reuse limit exceeded");
                TokenError::ReuseLimitExceeded {
                    token_id: record.token_id.clone(),
                    uses,
                    max_uses: policy.max_uses(),
                }
            }
        }
    }

    /// Revoke the lineage of a non-active token and build the failure.
    fn breach(&self, record: &TokenRecord) -> TokenError {
        self.revocation
            .revoke_after_breach(&record.token_id, record.family.as_deref());

        let reason = self
            .store
            .get(&record.token_id)
            .and_then(|current| current.revoked_reason)
            .unwrap_or_else(|| BREACH_REASON.to_string());

        TokenError::Revoked {
            token_id: record.token_id.clone(),
            family: record.family.clone(),
            reason,
            breach_detected: record.state == TokenState::Rotated,
        }
    }
}

fn expired(token_id: &str, expires_at: DateTime<Utc>) -> TokenError {
    debug!(token = %fingerprint(token_id), expires_at = %expires_at, "refresh token expired");
    TokenError::Expired {
        token_id: token_id.to_string(),
        expired_at: expires_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MockClock, MockTokenGenerator};
    use crate::error::RotationError;
    use crate::telemetry::InMemoryMetrics;
    use crate::token::InMemoryTokenStore;
    use std::time::Duration;

    struct Fixture {
        engine: RotationEngine<InMemoryTokenStore>,
        factory: Arc<TokenFactory<InMemoryTokenStore>>,
        revocation: Arc<RevocationManager<InMemoryTokenStore>>,
        store: Arc<InMemoryTokenStore>,
        clock: Arc<MockClock>,
        metrics: Arc<InMemoryMetrics>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTokenStore::new());
        let clock = Arc::new(MockClock::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let factory = Arc::new(TokenFactory::new(
            store.clone(),
            Arc::new(MockTokenGenerator::new()),
            clock.clone(),
            metrics.clone(),
        ));
        let revocation = Arc::new(RevocationManager::new(
            store.clone(),
            clock.clone(),
            metrics.clone(),
        ));
        let engine = RotationEngine::new(
            store.clone(),
            factory.clone(),
            revocation.clone(),
            clock.clone(),
            metrics.clone(),
        );
        Fixture {
            engine,
            factory,
            revocation,
            store,
            clock,
            metrics,
        }
    }

    fn token_error(result: RotationResult<UseOutcome>) -> TokenError {
        match result {
            Err(RotationError::Token(error)) => error,
            other => panic!("expected token error, got {:?}", other),
        }
    }

    #[test]
    fn test_rotation_links_parent_and_child() {
        let f = fixture();
        let policy = RotationPolicy::strict();
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &["read"]);

        let outcome = f.engine.use_refresh_token(&a, &policy).unwrap();
        let b = outcome.new_token_id.clone().unwrap();

        assert_eq!(outcome.user_id, "user-1");
        assert_eq!(outcome.client_id, "web");
        assert!(outcome.scopes.contains("read"));

        let parent = f.store.get(&a).unwrap();
        let child = f.store.get(&b).unwrap();
        assert_eq!(parent.state, TokenState::Rotated);
        assert_eq!(parent.child.as_deref(), Some(b.as_str()));
        assert_eq!(child.parent.as_deref(), Some(a.as_str()));
        assert_eq!(child.family, parent.family);
        assert!(child.is_active());
    }

    #[test]
    fn test_unknown_token() {
        let f = fixture();
        let error = token_error(f.engine.use_refresh_token("nope", &RotationPolicy::strict()));
        assert!(matches!(error, TokenError::NotFound { .. }));
        assert_eq!(f.metrics.get_entries_by_name("refresh_token_failures_total").len(), 1);
    }

    #[test]
    fn test_replay_revokes_family() {
        let f = fixture();
        let policy = RotationPolicy::strict();
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);
        let outcome = f.engine.use_refresh_token(&a, &policy).unwrap();
        let b = outcome.new_token_id.unwrap();

        let error = token_error(f.engine.use_refresh_token(&a, &policy));
        match error {
            TokenError::Revoked {
                family,
                reason,
                breach_detected,
                ..
            } => {
                assert_eq!(family.as_deref(), Some(a.as_str()));
                assert_eq!(reason, BREACH_REASON);
                assert!(breach_detected);
            }
            other => panic!("expected revoked, got {:?}", other),
        }

        assert!(f.revocation.is_revoked(&a));
        assert!(f.revocation.is_revoked(&b));
    }

    #[test]
    fn test_explicitly_revoked_token_keeps_reason() {
        let f = fixture();
        let policy = RotationPolicy::strict();
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);
        f.revocation.revoke_token(&a, "logout");

        let error = token_error(f.engine.use_refresh_token(&a, &policy));
        assert_eq!(
            error,
            TokenError::Revoked {
                token_id: a.clone(),
                family: Some(a.clone()),
                reason: "logout".to_string(),
                breach_detected: false,
            }
        );
    }

    #[test]
    fn test_expired_does_not_escalate() {
        let f = fixture();
        let mut policy = RotationPolicy::strict();
        policy.expires_in = Duration::from_secs(10);
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);

        f.clock.advance(Duration::from_secs(11));
        let error = token_error(f.engine.use_refresh_token(&a, &policy));

        assert!(matches!(error, TokenError::Expired { .. }));
        assert!(!f.revocation.is_revoked(&a));
        assert!(f.store.get(&a).unwrap().is_active());
    }

    #[test]
    fn test_reuse_within_limits() {
        let f = fixture();
        let mut policy = RotationPolicy::lenient();
        policy.max_reuse = 2;
        policy.reuse_window = Duration::from_secs(60);
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);

        for _ in 0..3 {
            let outcome = f.engine.use_refresh_token(&a, &policy).unwrap();
            assert!(outcome.new_token_id.is_none());
        }

        let error = token_error(f.engine.use_refresh_token(&a, &policy));
        assert_eq!(
            error,
            TokenError::ReuseLimitExceeded {
                token_id: a.clone(),
                uses: 3,
                max_uses: 3,
            }
        );

        // Exceeding the limit leaves the record active and unchanged.
        let record = f.store.get(&a).unwrap();
        assert!(record.is_active());
        assert_eq!(record.reuse_count, 3);
    }

    #[test]
    fn test_reuse_window_closes() {
        let f = fixture();
        let mut policy = RotationPolicy::lenient();
        policy.reuse_window = Duration::from_secs(60);
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);

        f.engine.use_refresh_token(&a, &policy).unwrap();
        f.clock.advance(Duration::from_secs(61));

        let error = token_error(f.engine.use_refresh_token(&a, &policy));
        assert!(matches!(error, TokenError::ReuseLimitExceeded { uses: 1, .. }));
    }

    #[test]
    fn test_revoked_beats_remaining_allowance() {
        let f = fixture();
        let policy = RotationPolicy::lenient();
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);
        f.engine.use_refresh_token(&a, &policy).unwrap();
        f.revocation.revoke_token(&a, "logout");

        let error = token_error(f.engine.use_refresh_token(&a, &policy));
        assert!(matches!(error, TokenError::Revoked { family: None, .. }));
    }

    #[test]
    fn test_evicted_between_lookup_and_update() {
        let f = fixture();
        let policy = RotationPolicy::strict();
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);
        let record = f.store.get(&a).unwrap();
        f.store.destroy_all();

        let error = f.engine.resolve_conflict(&record, StoreConflict::Missing, &policy);
        assert!(matches!(error, TokenError::NotFound { .. }));
    }

    #[test]
    fn test_first_use_after_window_fails() {
        let f = fixture();
        let mut policy = RotationPolicy::lenient();
        policy.reuse_window = Duration::from_secs(60);
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);

        f.clock.advance(Duration::from_secs(3600));
        let error = token_error(f.engine.use_refresh_token(&a, &policy));

        assert!(matches!(error, TokenError::ReuseLimitExceeded { uses: 0, .. }));
        let record = f.store.get(&a).unwrap();
        assert!(record.is_active());
        assert_eq!(record.reuse_count, 0);
    }

    #[test]
    fn test_use_at_window_end_succeeds() {
        let f = fixture();
        let mut policy = RotationPolicy::lenient();
        policy.reuse_window = Duration::from_secs(60);
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);

        f.clock.advance(Duration::from_secs(60));
        assert!(f.engine.use_refresh_token(&a, &policy).is_ok());
    }

    #[test]
    fn test_expired_between_lookup_and_update() {
        let f = fixture();
        let policy = RotationPolicy::strict();
        let a = f.factory.create_refresh_token("user-1", "web", &policy, &[]);
        let record = f.store.get(&a).unwrap();
        let later = record.expires_at + chrono::Duration::seconds(1);

        let error = f
            .engine
            .rotate(&record, &policy, later)
            .expect_err("expired token must not rotate");

        assert!(matches!(error, TokenError::Expired { .. }));
        assert!(f.store.get(&a).unwrap().is_active());
        assert_eq!(f.store.len(), 1);
        assert!(!f.revocation.is_revoked(&a));
    }
}
