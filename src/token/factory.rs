//! Token Factory
//!
//! Mints refresh token identifiers and their initial records.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::core::{Clock, TokenGenerator};
use crate::telemetry::RotationMetrics;
use crate::token::TokenStore;
use crate::types::{RotationPolicy, TokenRecord, TokenState};

/// Refresh token factory.
pub struct TokenFactory<S: TokenStore> {
    store: Arc<S>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn RotationMetrics>,
}

impl<S: TokenStore> TokenFactory<S> {
    /// Create new token factory.
    pub fn new(
        store: Arc<S>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn RotationMetrics>,
    ) -> Self {
        Self {
            store,
            generator,
            clock,
            metrics,
        }
    }

    /// Issue a new active refresh token and return its identifier.
    ///
    /// Starts a new family (named after the token) when `policy.family` is set.
    /// `user_id` and `client_id` must be non-empty.
    pub fn create_refresh_token(
        &self,
        user_id: &str,
        client_id: &str,
        policy: &RotationPolicy,
        scopes: &[&str],
    ) -> String {
        debug_assert!(!user_id.is_empty(), "user_id must not be empty");
        debug_assert!(!client_id.is_empty(), "client_id must not be empty");

        let scopes = scopes.iter().map(|s| s.to_string()).collect();
        let mut record = self.mint(user_id, client_id, scopes, policy);
        if policy.family {
            record.family = Some(record.token_id.clone());
        }

        let token_id = record.token_id.clone();
        debug!(
            token = %record.fingerprint(),
            user_id,
            client_id,
            family = policy.family,
            expires_at = %record.expires_at,
            "issued refresh token"
        );
        self.store.insert(record);
        self.metrics.record_issued(client_id);
        token_id
    }

    /// Build the successor of `parent`; the caller inserts it.
    pub(crate) fn mint_child(&self, parent: &TokenRecord, policy: &RotationPolicy) -> TokenRecord {
        let mut child = self.mint(
            &parent.user_id,
            &parent.client_id,
            parent.scopes.clone(),
            policy,
        );
        child.family = parent.family.clone();
        child.parent = Some(parent.token_id.clone());
        child
    }

    fn mint(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: BTreeSet<String>,
        policy: &RotationPolicy,
    ) -> TokenRecord {
        let created_at = self.clock.now();
        let expires_at = created_at
            .checked_add_signed(policy.expires_in_delta())
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);

        TokenRecord {
            token_id: self.generator.generate(),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            scopes,
            family: None,
            created_at,
            expires_at,
            state: TokenState::Active,
            parent: None,
            child: None,
            reuse_count: 0,
            last_used_at: None,
            revoked_at: None,
            revoked_reason: None,
        }
    }
}
