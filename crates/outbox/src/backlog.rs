//! Backlog gauge and periodic recount.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::store::OutboxStore;

/// Shared counter of undelivered outbox rows.
///
/// Producers add on insert and workers subtract on claim, so the value can
/// drift under races and crashes; it is clamped at zero and corrected by
/// [`BacklogResync`]. Treat it as an operational signal, not a source of
/// truth.
#[derive(Debug, Clone, Default)]
pub struct BacklogGauge {
    value: Arc<AtomicI64>,
}

impl BacklogGauge {
    /// Creates a new gauge starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `n` undelivered rows.
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n as i64, Ordering::Relaxed);
        self.record();
    }

    /// Subtracts `n` rows, clamping at zero.
    pub fn sub(&self, n: u64) {
        // fetch_update loop so a concurrent add is never clamped away
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some((current - n as i64).max(0))
            });
        self.record();
    }

    /// Overwrites the gauge with an authoritative count.
    pub fn set(&self, n: u64) {
        self.value.store(n as i64, Ordering::Relaxed);
        self.record();
    }

    /// Returns the current (approximate) backlog.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed).max(0) as u64
    }

    fn record(&self) {
        metrics::gauge!("outbox_backlog").set(self.get() as f64);
    }
}

/// Periodically resets the gauge from a real count of pending rows.
pub struct BacklogResync<S> {
    store: Arc<S>,
    gauge: BacklogGauge,
    interval: Duration,
}

impl<S: OutboxStore + 'static> BacklogResync<S> {
    /// Creates a new resync task definition.
    pub fn new(store: Arc<S>, gauge: BacklogGauge, interval: Duration) -> Self {
        Self {
            store,
            gauge,
            interval,
        }
    }

    /// Performs a single recount.
    pub async fn resync_once(&self) -> Result<u64> {
        let pending = self.store.count_pending().await?;
        self.gauge.set(pending);
        Ok(pending)
    }

    /// Spawns the periodic resync loop.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(error) = self.resync_once().await {
                    tracing::warn!(%error, "backlog resync failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NewOutboxEvent;
    use crate::memory::InMemoryOutboxStore;

    #[test]
    fn sub_clamps_at_zero() {
        let gauge = BacklogGauge::new();
        gauge.add(3);
        gauge.sub(10);
        assert_eq!(gauge.get(), 0);

        gauge.add(2);
        assert_eq!(gauge.get(), 2);
    }

    #[tokio::test]
    async fn resync_overwrites_drifted_gauge() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let gauge = BacklogGauge::new();
        gauge.add(100); // drifted

        store
            .insert(NewOutboxEvent::new("a", "agg", serde_json::json!({})))
            .await
            .unwrap();

        let resync = BacklogResync::new(store, gauge.clone(), Duration::from_secs(60));
        let pending = resync.resync_once().await.unwrap();
        assert_eq!(pending, 1);
        assert_eq!(gauge.get(), 1);
    }
}
