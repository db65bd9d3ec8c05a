//! Janitor
//!
//! Evicts expired refresh token records, on demand or on a schedule.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::core::Clock;
use crate::telemetry::RotationMetrics;
use crate::token::TokenStore;

/// Expired token sweeper.
pub struct Janitor<S: TokenStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn RotationMetrics>,
}

impl<S: TokenStore> Janitor<S> {
    /// Create new janitor.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, metrics: Arc<dyn RotationMetrics>) -> Self {
        Self {
            store,
            clock,
            metrics,
        }
    }

    /// Remove every record whose `expires_at` has passed, whatever its state.
    ///
    /// Returns the number of records evicted.
    pub fn cleanup_refresh_tokens(&self) -> usize {
        let evicted = self.store.evict_expired(self.clock.now());
        if evicted > 0 {
            info!(evicted, remaining = self.store.len(), "evicted expired refresh tokens");
        } else {
            debug!("no expired refresh tokens to evict");
        }
        self.metrics.record_eviction(evicted);
        evicted
    }

    /// Drop every record. Administrative and test use only.
    pub fn destroy_all_refresh_tokens(&self) -> usize {
        let dropped = self.store.destroy_all();
        info!(dropped, "destroyed all refresh tokens");
        dropped
    }
}

impl<S: TokenStore + 'static> Janitor<S> {
    /// Run `cleanup_refresh_tokens` every `interval` on the current Tokio runtime.
    ///
    /// The first sweep happens one interval after spawning. The task stops
    /// when the returned handle is shut down or dropped.
    pub fn spawn(self: &Arc<Self>, interval: Duration) -> JanitorHandle {
        let janitor = Arc::clone(self);
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                janitor.cleanup_refresh_tokens();
            }
        });

        debug!(interval_ms = period.as_millis() as u64, "started refresh token janitor");
        JanitorHandle { task }
    }
}

/// Handle to a scheduled janitor task.
#[derive(Debug)]
pub struct JanitorHandle {
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop the scheduled sweeps.
    pub fn shutdown(self) {
        self.task.abort();
    }

    /// Check whether the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
