//! In-memory ledger store for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::journal::{JournalEntry, LedgerEntry};
use crate::store::LedgerStore;

#[derive(Default)]
struct InMemoryLedgerState {
    entries: HashMap<String, LedgerEntry>,
    posting_rows: u64,
    next_id: i64,
}

/// In-memory ledger store implementation for testing.
///
/// Provides the same idempotency semantics as the PostgreSQL
/// implementation: a duplicate entry id is skipped entirely.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of journal entries stored.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn post_entries_atomic(&self, entries: Vec<JournalEntry>) -> Result<Vec<LedgerEntry>> {
        // verify before touching state, so a bad entry aborts the whole batch
        for entry in &entries {
            entry.validate()?;
        }

        let mut state = self.state.write().await;
        let mut persisted = Vec::new();

        for journal in entries {
            if state.entries.contains_key(journal.entry_id()) {
                metrics::counter!("ledger_duplicate_entries_total").increment(1);
                continue;
            }

            state.next_id += 1;
            let entry = LedgerEntry {
                ledger_entry_id: state.next_id,
                journal,
                created_at: Utc::now(),
            };
            state.posting_rows += entry.journal.postings().len() as u64;
            state
                .entries
                .insert(entry.journal.entry_id().to_string(), entry.clone());
            metrics::counter!("ledger_entries_posted_total").increment(1);
            persisted.push(entry);
        }

        Ok(persisted)
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self.state.read().await.entries.get(entry_id).cloned())
    }

    async fn posting_count(&self) -> Result<u64> {
        Ok(self.state.read().await.posting_rows)
    }
}
