//! Telemetry
//!
//! Metrics for refresh token rotation. Structured logging goes through
//! `tracing` directly from each component.

pub mod metrics;

pub use metrics::{
    create_in_memory_metrics, no_op_metrics, InMemoryMetrics, MetricEntry, MetricLabels,
    NoOpMetrics, RotationMetrics,
};
