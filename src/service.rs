//! Refresh Token Service
//!
//! High-level entry point that composes the store, factory, revocation
//! manager, janitor and rotation engine behind the operations exposed to the
//! OAuth callback handler and authentication middleware.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{Clock, SecureTokenGenerator, SystemClock, TokenGenerator};
use crate::error::RotationResult;
use crate::telemetry::{NoOpMetrics, RotationMetrics};
use crate::token::{
    InMemoryTokenStore, Janitor, JanitorHandle, RevocationManager, RotationEngine, TokenFactory,
    TokenStore,
};
use crate::types::{RotationPolicy, ServiceConfig, TokenRecord, UseOutcome};

/// Refresh token service.
///
/// Every instance owns its own store; there is no shared registry.
pub struct RefreshTokenService<S: TokenStore = InMemoryTokenStore> {
    config: ServiceConfig,
    store: Arc<S>,
    factory: Arc<TokenFactory<S>>,
    revocation: Arc<RevocationManager<S>>,
    janitor: Arc<Janitor<S>>,
    engine: RotationEngine<S>,
}

impl RefreshTokenService<InMemoryTokenStore> {
    /// Create a service with an in-memory store and default components.
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    /// Create an in-memory service with the given configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self::with_components(
            config,
            InMemoryTokenStore::new(),
            Arc::new(SystemClock),
            Arc::new(SecureTokenGenerator::new()),
            Arc::new(NoOpMetrics),
        )
    }
}

impl Default for RefreshTokenService<InMemoryTokenStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TokenStore> RefreshTokenService<S> {
    /// Create a service with custom implementations.
    pub fn with_components(
        config: ServiceConfig,
        store: S,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn TokenGenerator>,
        metrics: Arc<dyn RotationMetrics>,
    ) -> Self {
        let store = Arc::new(store);
        let factory = Arc::new(TokenFactory::new(
            store.clone(),
            generator,
            clock.clone(),
            metrics.clone(),
        ));
        let revocation = Arc::new(RevocationManager::new(
            store.clone(),
            clock.clone(),
            metrics.clone(),
        ));
        let janitor = Arc::new(Janitor::new(store.clone(), clock.clone(), metrics.clone()));
        let engine = RotationEngine::new(
            store.clone(),
            factory.clone(),
            revocation.clone(),
            clock,
            metrics,
        );

        Self {
            config,
            store,
            factory,
            revocation,
            janitor,
            engine,
        }
    }

    /// Get the service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get the default policy.
    pub fn policy(&self) -> &RotationPolicy {
        &self.config.policy
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========== Issue and use ==========

    /// Issue a new refresh token.
    pub fn create_refresh_token(
        &self,
        user_id: &str,
        client_id: &str,
        policy: &RotationPolicy,
        scopes: &[&str],
    ) -> String {
        self.factory
            .create_refresh_token(user_id, client_id, policy, scopes)
    }

    /// Issue a new refresh token under the configured policy.
    pub fn issue(&self, user_id: &str, client_id: &str, scopes: &[&str]) -> String {
        self.create_refresh_token(user_id, client_id, &self.config.policy, scopes)
    }

    /// Present a refresh token.
    pub fn use_refresh_token(
        &self,
        token: &str,
        policy: &RotationPolicy,
    ) -> RotationResult<UseOutcome> {
        self.engine.use_refresh_token(token, policy)
    }

    /// Present a refresh token under the configured policy.
    pub fn exchange(&self, token: &str) -> RotationResult<UseOutcome> {
        self.use_refresh_token(token, &self.config.policy)
    }

    // ========== Revocation ==========

    /// Revoke a single token. No-op if it is missing or already revoked.
    pub fn revoke_refresh_token(&self, token: &str, reason: &str) {
        self.revocation.revoke_token(token, reason);
    }

    /// Revoke every token in a family. No-op for unknown families.
    pub fn revoke_family(&self, family: &str, reason: &str) {
        self.revocation.revoke_family(family, reason);
    }

    /// True if the token is absent or revoked.
    pub fn is_revoked(&self, token: &str) -> bool {
        self.revocation.is_revoked(token)
    }

    /// Audit copy of a stored record.
    pub fn inspect(&self, token: &str) -> Option<TokenRecord> {
        self.store.get(token)
    }

    // ========== Cleanup ==========

    /// Evict every expired record.
    pub fn cleanup_refresh_tokens(&self) {
        self.janitor.cleanup_refresh_tokens();
    }

    /// Drop every record. Administrative and test use only.
    pub fn destroy_all_refresh_tokens(&self) {
        self.janitor.destroy_all_refresh_tokens();
    }
}

impl<S: TokenStore + 'static> RefreshTokenService<S> {
    /// Start scheduled cleanup on the current Tokio runtime.
    pub fn spawn_janitor(&self, interval: Duration) -> JanitorHandle {
        self.janitor.spawn(interval)
    }

    /// Start scheduled cleanup at the configured interval.
    pub fn spawn_default_janitor(&self) -> JanitorHandle {
        self.spawn_janitor(self.config.cleanup_interval)
    }
}

/// Create a refresh token service with default in-memory components.
pub fn refresh_token_service() -> RefreshTokenService {
    RefreshTokenService::new()
}
