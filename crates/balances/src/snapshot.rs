//! Durable, reconciled balance snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// Durable balance for one account, advanced only by merges.
///
/// Invariant: `last_applied_entry_id` is monotonically non-decreasing; the
/// balance advances only by deltas whose source ledger entry id exceeds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalanceSnapshot {
    pub account_code: String,
    /// Balance in minor units.
    pub balance: i64,
    /// Watermark: highest ledger entry id already merged.
    pub last_applied_entry_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalanceSnapshot {
    /// Returns the zero snapshot for an account that was never merged.
    pub fn zero(account_code: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            account_code: account_code.into(),
            balance: 0,
            last_applied_entry_id: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Port for durable snapshot storage.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads the snapshot for an account, if any.
    async fn get(&self, account_code: &str) -> Result<Option<AccountBalanceSnapshot>>;

    /// Upserts a snapshot, guarded by the watermark.
    ///
    /// The write applies only when the stored watermark is at or below the
    /// new one; returns false when the guard rejected it (a newer merge
    /// already landed).
    async fn upsert(&self, snapshot: AccountBalanceSnapshot) -> Result<bool>;
}

/// In-memory snapshot store for testing.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    state: Arc<RwLock<HashMap<String, AccountBalanceSnapshot>>>,
}

impl InMemorySnapshotStore {
    /// Creates a new empty snapshot store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of snapshots stored.
    pub async fn snapshot_count(&self) -> usize {
        self.state.read().await.len()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, account_code: &str) -> Result<Option<AccountBalanceSnapshot>> {
        Ok(self.state.read().await.get(account_code).cloned())
    }

    async fn upsert(&self, snapshot: AccountBalanceSnapshot) -> Result<bool> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.get(&snapshot.account_code)
            && existing.last_applied_entry_id > snapshot.last_applied_entry_id
        {
            return Ok(false);
        }
        state.insert(snapshot.account_code.clone(), snapshot);
        Ok(true)
    }
}
