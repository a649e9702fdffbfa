//! Ledger storage port.

use async_trait::async_trait;

use crate::error::Result;
use crate::journal::{JournalEntry, LedgerEntry};

/// Port for persisting journal entries.
///
/// Deduplication relies solely on the entry-id uniqueness constraint; no
/// distributed lock is taken.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists the given entries atomically and idempotently.
    ///
    /// For each entry, the journal row is inserted keyed by its
    /// deterministic id. A duplicate id skips all posting inserts for that
    /// entry and omits it from the result (replay is a no-op). An error
    /// during the journal insert aborts before any posting insert, so no
    /// partial entry is ever visible.
    ///
    /// Returns exactly the entries newly persisted, with generated ids,
    /// for building downstream events.
    async fn post_entries_atomic(&self, entries: Vec<JournalEntry>) -> Result<Vec<LedgerEntry>>;

    /// Looks up a posted entry by its deterministic id.
    async fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>>;

    /// Returns the total number of posting rows (reconciliation support).
    async fn posting_count(&self) -> Result<u64>;
}
