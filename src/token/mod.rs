//! Token Management
//!
//! Refresh token lifecycle: issue, rotation, revocation and eviction.
//!
//! This module provides:
//!
//! - **Token Storage**: keyed records plus a family index
//! - **Token Factory**: random identifiers and initial records
//! - **Revocation**: single-token and family-wide revocation
//! - **Janitor**: expired record eviction
//! - **Rotation Engine**: validation, breach detection and rotation

pub mod factory;
pub mod janitor;
pub mod revocation;
pub mod rotation;
pub mod storage;

// Token Storage
pub use storage::{
    create_in_memory_token_store, InMemoryTokenStore, ReuseAllowance, StoreConflict, TokenStore,
};

// Token Factory
pub use factory::TokenFactory;

// Revocation
pub use revocation::RevocationManager;

// Janitor
pub use janitor::{Janitor, JanitorHandle};

// Rotation Engine
pub use rotation::RotationEngine;
