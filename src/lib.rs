//! Refresh Token Rotation
//!
//! Issue, rotation, revocation and eviction of long-lived refresh tokens, with
//! breach detection across token families.
//!
//! # Features
//!
//! - Single-use refresh tokens with rotation on every use
//! - Reuse detection: presenting a rotated or revoked token revokes its family
//! - Bounded reuse for non-rotating tokens (count and time window)
//! - Idempotent single-token and family revocation
//! - Expired token eviction, on demand or on a Tokio interval
//! - Named policy presets (`strict`, `moderate`, `lenient`)
//!
//! # Example
//!
//! ```rust
//! use refresh_token_rotation::{RefreshTokenService, RotationPolicy};
//!
//! let service = RefreshTokenService::new();
//! let policy = RotationPolicy::strict();
//!
//! let token = service.create_refresh_token("user-1", "web-app", &policy, &["read"]);
//! let outcome = service.use_refresh_token(&token, &policy).unwrap();
//! let next = outcome.new_token_id.unwrap();
//!
//! // Replaying the old token revokes the whole family.
//! assert!(service.use_refresh_token(&token, &policy).is_err());
//! assert!(service.is_revoked(&next));
//! ```
//!
//! # Architecture
//!
//! - `types`: token records, policies and service configuration
//! - `error`: closed error taxonomy
//! - `core`: injected clock and random token source
//! - `token`: store, factory, revocation, janitor and rotation engine
//! - `builders`: fluent policy builder
//! - `telemetry`: metrics
//! - `service`: facade combining all components

pub mod builders;
pub mod core;
pub mod error;
pub mod service;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main service
pub use service::{refresh_token_service, RefreshTokenService};

// Re-export builders
pub use builders::{rotation_policy, RotationPolicyBuilder};

// Re-export errors
pub use error::{
    get_user_message, ConfigurationError, RotationError, RotationResult, TokenError,
};

// Re-export types
pub use types::{
    fingerprint, PolicyPreset, RotationPolicy, ServiceConfig, TokenRecord, TokenState,
    UseOutcome, BREACH_REASON, DEFAULT_EXPIRES_IN,
};

// Re-export core components
pub use core::{
    Clock, MockClock, MockTokenGenerator, SecureTokenGenerator, SystemClock, TokenGenerator,
};

// Re-export token management
pub use token::{
    InMemoryTokenStore, Janitor, JanitorHandle, RevocationManager, RotationEngine,
    StoreConflict, TokenFactory, TokenStore,
};

// Re-export telemetry
pub use telemetry::{InMemoryMetrics, NoOpMetrics, RotationMetrics};
