//! Retry bookkeeping ports.
//!
//! Retry counts, the delayed-redelivery scheduler and the PSP result cache
//! live outside the process (the counter survives restarts, the scheduler
//! redelivers after the computed backoff), so they are explicit keyed ports
//! rather than ambient state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use common::PaymentOrderId;

use crate::error::Result;

/// Port for the per-order retry counter.
#[async_trait]
pub trait RetryCounterStore: Send + Sync {
    /// Returns the current count for an order (0 if absent).
    async fn get(&self, order_id: PaymentOrderId) -> Result<u32>;

    /// Atomically adds to the count, returning the new value.
    async fn add(&self, order_id: PaymentOrderId, n: u32) -> Result<u32>;

    /// Clears the count for an order.
    async fn reset(&self, order_id: PaymentOrderId) -> Result<()>;
}

/// Port for handing orders to an external delayed-redelivery mechanism.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    /// Redelivers the order for another charge attempt after `delay`.
    async fn schedule_retry(&self, order_id: PaymentOrderId, delay: Duration) -> Result<()>;

    /// Redelivers the order for a PSP status check after `delay`.
    async fn schedule_status_check(&self, order_id: PaymentOrderId, delay: Duration) -> Result<()>;
}

/// Port for the cache of PSP results keyed by order id.
///
/// Only invalidation is needed here: a scheduled retry must not observe the
/// stale outcome that triggered it.
#[async_trait]
pub trait PspResultCache: Send + Sync {
    /// Drops any cached PSP result for the order.
    async fn invalidate(&self, order_id: PaymentOrderId) -> Result<()>;
}

/// In-memory retry counter for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetryCounterStore {
    counts: Arc<RwLock<HashMap<PaymentOrderId, u32>>>,
}

impl InMemoryRetryCounterStore {
    /// Creates a new empty counter store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetryCounterStore for InMemoryRetryCounterStore {
    async fn get(&self, order_id: PaymentOrderId) -> Result<u32> {
        Ok(self.counts.read().unwrap().get(&order_id).copied().unwrap_or(0))
    }

    async fn add(&self, order_id: PaymentOrderId, n: u32) -> Result<u32> {
        let mut counts = self.counts.write().unwrap();
        let count = counts.entry(order_id).or_insert(0);
        *count += n;
        Ok(*count)
    }

    async fn reset(&self, order_id: PaymentOrderId) -> Result<()> {
        self.counts.write().unwrap().remove(&order_id);
        Ok(())
    }
}

/// A redelivery recorded by the in-memory scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledRedelivery {
    Retry {
        order_id: PaymentOrderId,
        delay: Duration,
    },
    StatusCheck {
        order_id: PaymentOrderId,
        delay: Duration,
    },
}

/// In-memory scheduler for testing; records what would be redelivered.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetryScheduler {
    scheduled: Arc<RwLock<Vec<ScheduledRedelivery>>>,
}

impl InMemoryRetryScheduler {
    /// Creates a new empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything scheduled so far.
    pub fn scheduled(&self) -> Vec<ScheduledRedelivery> {
        self.scheduled.read().unwrap().clone()
    }

    /// Returns the scheduled retry delays, in order.
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.scheduled
            .read()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                ScheduledRedelivery::Retry { delay, .. } => Some(*delay),
                ScheduledRedelivery::StatusCheck { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl RetryScheduler for InMemoryRetryScheduler {
    async fn schedule_retry(&self, order_id: PaymentOrderId, delay: Duration) -> Result<()> {
        self.scheduled
            .write()
            .unwrap()
            .push(ScheduledRedelivery::Retry { order_id, delay });
        Ok(())
    }

    async fn schedule_status_check(
        &self,
        order_id: PaymentOrderId,
        delay: Duration,
    ) -> Result<()> {
        self.scheduled
            .write()
            .unwrap()
            .push(ScheduledRedelivery::StatusCheck { order_id, delay });
        Ok(())
    }
}

/// In-memory PSP result cache for testing; records invalidations.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPspResultCache {
    invalidated: Arc<RwLock<Vec<PaymentOrderId>>>,
}

impl InMemoryPspResultCache {
    /// Creates a new cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the orders whose cached results were invalidated.
    pub fn invalidated(&self) -> Vec<PaymentOrderId> {
        self.invalidated.read().unwrap().clone()
    }
}

#[async_trait]
impl PspResultCache for InMemoryPspResultCache {
    async fn invalidate(&self, order_id: PaymentOrderId) -> Result<()> {
        self.invalidated.write().unwrap().push(order_id);
        Ok(())
    }
}
