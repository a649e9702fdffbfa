//! Balance application, reads and merges.

use std::collections::HashMap;

use chrono::Utc;
use ledger::LedgerEntry;

use crate::cache::BalanceCache;
use crate::error::Result;
use crate::snapshot::{AccountBalanceSnapshot, SnapshotStore};

/// Maintains per-account balances from ledger deltas.
///
/// Real-time read = durable snapshot balance + ephemeral cache delta.
/// The merge path is ordered deliberately: take-and-reset the
/// cache first, then load the snapshot, so a merge that committed earlier
/// is always visible to the balance computation.
pub struct BalanceService<C, S> {
    cache: C,
    snapshots: S,
}

impl<C, S> BalanceService<C, S>
where
    C: BalanceCache,
    S: SnapshotStore,
{
    /// Creates a new balance service.
    pub fn new(cache: C, snapshots: S) -> Self {
        Self { cache, snapshots }
    }

    /// Highest ledger entry id already counted for an account, durable
    /// or pending.
    async fn applied_watermark(&self, account_code: &str) -> Result<i64> {
        let durable = self
            .snapshots
            .get(account_code)
            .await?
            .map(|s| s.last_applied_entry_id)
            .unwrap_or(0);
        let pending = self
            .cache
            .peek(account_code)
            .await?
            .map(|c| c.watermark)
            .unwrap_or(0);
        Ok(durable.max(pending))
    }

    /// Feeds newly posted ledger entries into the cache.
    ///
    /// Postings are grouped by account code; each account receives its net
    /// signed delta and the max touched entry id. Entries at or below the
    /// account's applied watermark are replays and contribute nothing.
    #[tracing::instrument(skip(self, entries), fields(entry_count = entries.len()))]
    pub async fn apply_entries(&self, entries: &[LedgerEntry]) -> Result<()> {
        let mut touched: HashMap<String, Vec<(i64, i64)>> = HashMap::new();
        for entry in entries {
            for posting in entry.journal.postings() {
                touched
                    .entry(posting.account.code())
                    .or_default()
                    .push((entry.ledger_entry_id, posting.signed_minor_units()));
            }
        }

        for (account_code, deltas) in touched {
            let applied = self.applied_watermark(&account_code).await?;

            let mut delta = 0i64;
            let mut max_entry_id = applied;
            for (entry_id, signed) in deltas {
                if entry_id <= applied {
                    continue;
                }
                delta += signed;
                max_entry_id = max_entry_id.max(entry_id);
            }

            if max_entry_id > applied {
                self.cache
                    .add_delta(&account_code, delta, max_entry_id)
                    .await?;
            }
        }
        Ok(())
    }

    /// Cheap real-time balance: durable snapshot plus pending cache delta.
    pub async fn real_time_balance(&self, account_code: &str) -> Result<i64> {
        let durable = self
            .snapshots
            .get(account_code)
            .await?
            .map(|s| s.balance)
            .unwrap_or(0);
        let pending = self
            .cache
            .peek(account_code)
            .await?
            .map(|c| c.delta)
            .unwrap_or(0);
        Ok(durable + pending)
    }

    /// Strong read: folds the pending delta into the durable snapshot and
    /// returns the reconciled balance.
    #[tracing::instrument(skip(self))]
    pub async fn merge(&self, account_code: &str) -> Result<i64> {
        let taken = self.cache.get_and_reset(account_code).await?;
        let snapshot = self
            .snapshots
            .get(account_code)
            .await?
            .unwrap_or_else(|| AccountBalanceSnapshot::zero(account_code));

        let Some(taken) = taken else {
            return Ok(snapshot.balance);
        };

        let merged = AccountBalanceSnapshot {
            account_code: account_code.to_string(),
            balance: snapshot.balance + taken.delta,
            last_applied_entry_id: snapshot.last_applied_entry_id.max(taken.watermark),
            created_at: snapshot.created_at,
            updated_at: Utc::now(),
        };

        if self.snapshots.upsert(merged.clone()).await? {
            metrics::counter!("balance_merges_total").increment(1);
            return Ok(merged.balance);
        }

        // A newer merge landed first; requeue the taken delta so it is not
        // lost and fall back to the real-time view.
        tracing::warn!(account_code, "snapshot guard rejected merge, delta requeued");
        self.cache
            .add_delta(account_code, taken.delta, taken.watermark)
            .await?;
        self.real_time_balance(account_code).await
    }

    /// Merges every account with a pending delta; used by the periodic job.
    #[tracing::instrument(skip(self))]
    pub async fn merge_dirty(&self) -> Result<usize> {
        let dirty = self.cache.dirty_accounts().await?;
        let merged = dirty.len();
        for account_code in dirty {
            self.merge(&account_code).await?;
        }
        Ok(merged)
    }
}
