//! Outbox storage port.

use async_trait::async_trait;
use chrono::Duration;

use crate::error::Result;
use crate::event::{NewOutboxEvent, OutboxEvent};

/// Port for outbox row storage.
///
/// `claim_batch` is the contention point: implementations must guarantee
/// that two concurrent claimers never receive the same row, and that rows
/// are handed out in primary-key order so delivery stays roughly FIFO.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Inserts a single row with status NEW.
    async fn insert(&self, event: NewOutboxEvent) -> Result<OutboxEvent>;

    /// Inserts a batch of rows in one transaction: all or none become
    /// visible to claimers.
    async fn insert_batch(&self, events: Vec<NewOutboxEvent>) -> Result<Vec<OutboxEvent>>;

    /// Atomically claims up to `batch_size` unclaimed NEW rows for
    /// `worker_id`, oldest first.
    async fn claim_batch(&self, worker_id: &str, batch_size: u32) -> Result<Vec<OutboxEvent>>;

    /// Marks the given rows SENT. Terminal; a SENT row is never redelivered.
    async fn mark_sent(&self, ids: &[i64]) -> Result<()>;

    /// Releases the claim on the given rows so another worker can pick
    /// them up. Rows already SENT are left untouched.
    async fn unclaim(&self, ids: &[i64]) -> Result<()>;

    /// Releases claims older than `older_than`, returning how many rows
    /// were freed. Used to heal claims orphaned by a crashed worker.
    async fn reclaim_stuck(&self, older_than: Duration) -> Result<u64>;

    /// Counts NEW rows not currently claimed by any worker.
    async fn count_pending(&self) -> Result<u64>;

    /// Fetches a row by id.
    async fn get(&self, id: i64) -> Result<Option<OutboxEvent>>;
}
