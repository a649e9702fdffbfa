//! Ephemeral per-account delta cache.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// The pending delta and watermark taken from the cache for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedDelta {
    /// Net signed balance change since the last merge, in minor units.
    pub delta: i64,
    /// Highest ledger entry id contributing to the delta.
    pub watermark: i64,
}

/// Port for the per-account delta counter.
///
/// The cache is ephemeral: losing it costs freshness, never correctness,
/// because the durable snapshot watermark makes replays idempotent. A
/// production deployment backs this with a TTL'd store (e.g. Redis) whose
/// add and get-and-reset are single atomic round trips.
#[async_trait]
pub trait BalanceCache: Send + Sync {
    /// Atomically adds a delta and raises the watermark for an account.
    ///
    /// The watermark only moves forward; a lower `ledger_entry_id` still
    /// contributes its delta but leaves the watermark untouched.
    async fn add_delta(&self, account_code: &str, delta: i64, ledger_entry_id: i64) -> Result<()>;

    /// Non-destructive read of the pending delta for an account.
    async fn peek(&self, account_code: &str) -> Result<Option<CachedDelta>>;

    /// Atomically takes and resets the pending delta in one round trip.
    ///
    /// Deltas arriving concurrently with the reset are never lost: they
    /// either land before the take (and are included) or after (and stay
    /// in the cache for the next merge).
    async fn get_and_reset(&self, account_code: &str) -> Result<Option<CachedDelta>>;

    /// Returns the accounts that currently hold a pending delta.
    async fn dirty_accounts(&self) -> Result<Vec<String>>;
}

/// In-memory balance cache.
///
/// A single lock guards the map, which makes every operation naturally
/// atomic; used by tests and as the default cache for single-process runs.
#[derive(Clone, Default)]
pub struct InMemoryBalanceCache {
    state: Arc<RwLock<HashMap<String, CachedDelta>>>,
}

impl InMemoryBalanceCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceCache for InMemoryBalanceCache {
    async fn add_delta(&self, account_code: &str, delta: i64, ledger_entry_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .entry(account_code.to_string())
            .or_insert(CachedDelta {
                delta: 0,
                watermark: 0,
            });
        entry.delta += delta;
        entry.watermark = entry.watermark.max(ledger_entry_id);
        metrics::counter!("balance_cache_deltas_total").increment(1);
        Ok(())
    }

    async fn peek(&self, account_code: &str) -> Result<Option<CachedDelta>> {
        Ok(self.state.read().await.get(account_code).copied())
    }

    async fn get_and_reset(&self, account_code: &str) -> Result<Option<CachedDelta>> {
        Ok(self.state.write().await.remove(account_code))
    }

    async fn dirty_accounts(&self) -> Result<Vec<String>> {
        Ok(self.state.read().await.keys().cloned().collect())
    }
}
