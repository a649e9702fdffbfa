//! Recovery of claims orphaned by crashed workers.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::store::OutboxStore;

/// Periodically releases claims that have been held longer than the
/// threshold. A healthy worker finishes a batch well inside it, so any
/// claim that old belongs to a worker that died mid-cycle.
pub struct Reclaimer<S> {
    store: Arc<S>,
    threshold: chrono::Duration,
    interval: Duration,
}

impl<S: OutboxStore + 'static> Reclaimer<S> {
    /// Creates a new reclaimer definition.
    pub fn new(store: Arc<S>, threshold: chrono::Duration, interval: Duration) -> Self {
        Self {
            store,
            threshold,
            interval,
        }
    }

    /// Runs a single reclaim sweep, returning the number of rows freed.
    pub async fn reclaim_once(&self) -> Result<u64> {
        let freed = self.store.reclaim_stuck(self.threshold).await?;
        if freed > 0 {
            tracing::warn!(freed, "released stuck outbox claims");
            metrics::counter!("outbox_claims_reclaimed_total").increment(freed);
        }
        Ok(freed)
    }

    /// Spawns the periodic sweep loop.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(error) = self.reclaim_once().await {
                    tracing::warn!(%error, "reclaim sweep failed");
                }
            }
        })
    }
}
