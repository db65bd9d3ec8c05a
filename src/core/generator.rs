//! Token Generator
//!
//! Cryptographically random refresh token identifiers.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Token generator interface (for dependency injection).
pub trait TokenGenerator: Send + Sync {
    /// Generate a new opaque token identifier.
    fn generate(&self) -> String;
}

/// OS-backed token generator.
#[derive(Debug, Clone)]
pub struct SecureTokenGenerator {
    byte_length: usize,
}

impl SecureTokenGenerator {
    /// Create generator with 32 random bytes (43 characters, 256 bits).
    pub fn new() -> Self {
        Self::with_length(32)
    }

    /// Create generator with a custom number of random bytes.
    ///
    /// # Panics
    /// Panics if length is not between 32 and 64.
    pub fn with_length(byte_length: usize) -> Self {
        assert!(
            (32..=64).contains(&byte_length),
            "token byte length must be between 32 and 64"
        );
        Self { byte_length }
    }
}

impl Default for SecureTokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator for SecureTokenGenerator {
    fn generate(&self) -> String {
        let mut bytes = vec![0u8; self.byte_length];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes)
    }
}

/// Mock token generator for testing.
///
/// Returns queued identifiers first, then `mock-token-<n>` padded past 40
/// characters.
#[derive(Debug, Default)]
pub struct MockTokenGenerator {
    queued: Mutex<VecDeque<String>>,
    counter: AtomicU64,
    history: Mutex<Vec<String>>,
}

impl MockTokenGenerator {
    /// Create new mock generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next identifier to generate.
    pub fn push_next(&self, token: impl Into<String>) -> &Self {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(token.into());
        self
    }

    /// Get generate history.
    pub fn get_generate_history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenGenerator for MockTokenGenerator {
    fn generate(&self) -> String {
        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let token = queued.unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            format!("mock-token-{:0>32}", n)
        });

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(token.clone());
        token
    }
}

/// Create production token generator.
pub fn create_token_generator() -> impl TokenGenerator {
    SecureTokenGenerator::new()
}

/// Create mock token generator for testing.
pub fn create_mock_token_generator() -> MockTokenGenerator {
    MockTokenGenerator::new()
}
