//! In-memory outbox store for testing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::event::{NewOutboxEvent, OutboxEvent, OutboxStatus};
use crate::store::OutboxStore;

#[derive(Debug, Default)]
struct InMemoryOutboxState {
    rows: Vec<OutboxEvent>,
    next_id: i64,
}

impl InMemoryOutboxState {
    fn insert_row(&mut self, event: NewOutboxEvent) -> OutboxEvent {
        self.next_id += 1;
        let row = OutboxEvent {
            id: self.next_id,
            event_type: event.event_type,
            aggregate_id: event.aggregate_id,
            trace_id: event.trace_id,
            payload: event.payload,
            status: OutboxStatus::New,
            claimed_by: None,
            claimed_at: None,
            created_at: Utc::now(),
        };
        self.rows.push(row.clone());
        row
    }
}

/// In-memory outbox store.
///
/// Rows are kept in insertion (id) order; the write lock around the whole
/// state gives claims the same atomicity as the row-locking SQL variant.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOutboxStore {
    state: Arc<RwLock<InMemoryOutboxState>>,
}

impl InMemoryOutboxStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every row, for test assertions.
    pub async fn all_rows(&self) -> Vec<OutboxEvent> {
        self.state.read().await.rows.clone()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn insert(&self, event: NewOutboxEvent) -> Result<OutboxEvent> {
        let mut state = self.state.write().await;
        Ok(state.insert_row(event))
    }

    async fn insert_batch(&self, events: Vec<NewOutboxEvent>) -> Result<Vec<OutboxEvent>> {
        let mut state = self.state.write().await;
        Ok(events.into_iter().map(|e| state.insert_row(e)).collect())
    }

    async fn claim_batch(&self, worker_id: &str, batch_size: u32) -> Result<Vec<OutboxEvent>> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut claimed = Vec::new();
        for row in state.rows.iter_mut() {
            if claimed.len() as u32 >= batch_size {
                break;
            }
            if row.status == OutboxStatus::New && row.claimed_by.is_none() {
                row.claimed_by = Some(worker_id.to_string());
                row.claimed_at = Some(now);
                claimed.push(row.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(&self, ids: &[i64]) -> Result<()> {
        let mut state = self.state.write().await;
        for row in state.rows.iter_mut() {
            if ids.contains(&row.id) {
                row.status = OutboxStatus::Sent;
            }
        }
        Ok(())
    }

    async fn unclaim(&self, ids: &[i64]) -> Result<()> {
        let mut state = self.state.write().await;
        for row in state.rows.iter_mut() {
            if ids.contains(&row.id) && row.status != OutboxStatus::Sent {
                row.claimed_by = None;
                row.claimed_at = None;
            }
        }
        Ok(())
    }

    async fn reclaim_stuck(&self, older_than: Duration) -> Result<u64> {
        let mut state = self.state.write().await;
        let cutoff = Utc::now() - older_than;
        let mut freed = 0;
        for row in state.rows.iter_mut() {
            if row.status == OutboxStatus::New
                && let Some(claimed_at) = row.claimed_at
                && claimed_at < cutoff
            {
                row.claimed_by = None;
                row.claimed_at = None;
                freed += 1;
            }
        }
        Ok(freed)
    }

    async fn count_pending(&self) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .rows
            .iter()
            .filter(|r| r.status == OutboxStatus::New && r.claimed_by.is_none())
            .count() as u64)
    }

    async fn get(&self, id: i64) -> Result<Option<OutboxEvent>> {
        let state = self.state.read().await;
        Ok(state.rows.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_event(event_type: &str) -> NewOutboxEvent {
        NewOutboxEvent::new(event_type, "order-1", serde_json::json!({}))
    }

    #[tokio::test]
    async fn claim_hands_out_disjoint_sets() {
        let store = InMemoryOutboxStore::new();
        for i in 0..6 {
            store.insert(new_event(&format!("event.{i}"))).await.unwrap();
        }

        let a = store.claim_batch("worker-a", 4).await.unwrap();
        let b = store.claim_batch("worker-b", 4).await.unwrap();

        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 2);
        let a_ids: Vec<i64> = a.iter().map(|r| r.id).collect();
        assert!(b.iter().all(|r| !a_ids.contains(&r.id)));
    }

    #[tokio::test]
    async fn claim_is_oldest_first() {
        let store = InMemoryOutboxStore::new();
        let first = store.insert(new_event("a")).await.unwrap();
        let second = store.insert(new_event("b")).await.unwrap();

        let claimed = store.claim_batch("w", 1).await.unwrap();
        assert_eq!(claimed[0].id, first.id);

        let claimed = store.claim_batch("w", 1).await.unwrap();
        assert_eq!(claimed[0].id, second.id);
    }

    #[tokio::test]
    async fn sent_rows_are_never_reclaimed() {
        let store = InMemoryOutboxStore::new();
        let row = store.insert(new_event("a")).await.unwrap();
        store.claim_batch("w", 1).await.unwrap();
        store.mark_sent(&[row.id]).await.unwrap();

        // unclaim on a SENT row is a no-op
        store.unclaim(&[row.id]).await.unwrap();
        let stored = store.get(row.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OutboxStatus::Sent);
        assert!(stored.claimed_by.is_some());

        assert!(store.claim_batch("other", 10).await.unwrap().is_empty());
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unclaim_makes_row_claimable_again() {
        let store = InMemoryOutboxStore::new();
        let row = store.insert(new_event("a")).await.unwrap();
        store.claim_batch("w", 1).await.unwrap();
        assert!(store.claim_batch("other", 1).await.unwrap().is_empty());

        store.unclaim(&[row.id]).await.unwrap();
        let reclaimed = store.claim_batch("other", 1).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].claimed_by.as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn reclaim_stuck_only_frees_old_claims() {
        let store = InMemoryOutboxStore::new();
        store.insert(new_event("a")).await.unwrap();
        store.insert(new_event("b")).await.unwrap();
        store.claim_batch("w", 2).await.unwrap();

        // backdate one claim past the threshold
        {
            let mut state = store.state.write().await;
            state.rows[0].claimed_at = Some(Utc::now() - Duration::minutes(10));
        }

        let freed = store.reclaim_stuck(Duration::minutes(5)).await.unwrap();
        assert_eq!(freed, 1);
        assert_eq!(store.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_batch_assigns_sequential_ids() {
        let store = InMemoryOutboxStore::new();
        let rows = store
            .insert_batch(vec![new_event("a"), new_event("b"), new_event("c")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[1].id == w[0].id + 1));
    }
}
