//! Metrics
//!
//! Refresh token rotation metrics collection interfaces and implementations.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

/// Rotation metrics interface.
pub trait RotationMetrics: Send + Sync {
    /// Record a newly issued token family head.
    fn record_issued(&self, client_id: &str);

    /// Record a successful rotation.
    fn record_rotation(&self, client_id: &str);

    /// Record a successful use of a non-rotating token.
    fn record_reuse(&self, client_id: &str, uses: u32);

    /// Record a failed use.
    fn record_failure(&self, kind: &str);

    /// Record breach detection.
    fn record_breach(&self, revoked: usize);

    /// Record explicit revocation.
    fn record_revocation(&self, scope: &str, revoked: usize);

    /// Record a janitor sweep.
    fn record_eviction(&self, evicted: usize);
}

/// No-op metrics implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl RotationMetrics for NoOpMetrics {
    fn record_issued(&self, _client_id: &str) {}
    fn record_rotation(&self, _client_id: &str) {}
    fn record_reuse(&self, _client_id: &str, _uses: u32) {}
    fn record_failure(&self, _kind: &str) {}
    fn record_breach(&self, _revoked: usize) {}
    fn record_revocation(&self, _scope: &str, _revoked: usize) {}
    fn record_eviction(&self, _evicted: usize) {}
}

/// No-op metrics singleton.
pub fn no_op_metrics() -> NoOpMetrics {
    NoOpMetrics
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
    pub timestamp: u64,
}

/// In-memory metrics for testing.
#[derive(Default)]
pub struct InMemoryMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemoryMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Sum of values recorded under a name.
    pub fn total(&self, name: &str) -> f64 {
        self.get_entries_by_name(name).iter().map(|e| e.value).sum()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, name: &str, value: f64, labels: MetricLabels) {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MetricEntry {
                name: name.to_string(),
                value,
                labels,
                timestamp: now,
            });
    }
}

fn label(key: &str, value: impl ToString) -> MetricLabels {
    let mut labels = MetricLabels::new();
    labels.insert(key.to_string(), value.to_string());
    labels
}

impl RotationMetrics for InMemoryMetrics {
    fn record_issued(&self, client_id: &str) {
        self.record("refresh_tokens_issued_total", 1.0, label("client_id", client_id));
    }

    fn record_rotation(&self, client_id: &str) {
        self.record("refresh_token_rotations_total", 1.0, label("client_id", client_id));
    }

    fn record_reuse(&self, client_id: &str, uses: u32) {
        let mut labels = label("client_id", client_id);
        labels.insert("uses".to_string(), uses.to_string());
        self.record("refresh_token_reuses_total", 1.0, labels);
    }

    fn record_failure(&self, kind: &str) {
        self.record("refresh_token_failures_total", 1.0, label("kind", kind));
    }

    fn record_breach(&self, revoked: usize) {
        self.record("refresh_token_breaches_total", 1.0, MetricLabels::new());
        self.record(
            "refresh_tokens_revoked_total",
            revoked as f64,
            label("cause", "breach"),
        );
    }

    fn record_revocation(&self, scope: &str, revoked: usize) {
        self.record(
            "refresh_tokens_revoked_total",
            revoked as f64,
            label("cause", scope),
        );
    }

    fn record_eviction(&self, evicted: usize) {
        self.record("refresh_tokens_evicted_total", evicted as f64, MetricLabels::new());
    }
}

/// Create in-memory metrics for testing.
pub fn create_in_memory_metrics() -> InMemoryMetrics {
    InMemoryMetrics::new()
}
