//! Payment order repository port.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::PaymentOrderId;
use outbox::{InMemoryOutboxStore, NewOutboxEvent, OutboxStore};

use crate::error::{Result, SettlementError};
use crate::order::PaymentOrder;

/// Port for payment order persistence.
///
/// `update_with_outbox` is the transactional-outbox seam: the order update
/// and the outbox row must become durable together or not at all.
#[async_trait]
pub trait PaymentOrderRepository: Send + Sync {
    /// Inserts a new order.
    async fn insert(&self, order: &PaymentOrder) -> Result<()>;

    /// Fetches an order by id.
    async fn get(&self, id: PaymentOrderId) -> Result<Option<PaymentOrder>>;

    /// Updates an existing order in place.
    async fn update(&self, order: &PaymentOrder) -> Result<()>;

    /// Updates the order and inserts an outbox row in one local transaction.
    async fn update_with_outbox(&self, order: &PaymentOrder, event: NewOutboxEvent) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryRepositoryState {
    orders: HashMap<PaymentOrderId, PaymentOrder>,
    fail_on_update: bool,
}

/// In-memory payment order repository for testing.
///
/// Shares an [`InMemoryOutboxStore`] so tests can observe the outbox rows a
/// processor run produced. `set_fail_on_update` simulates a persistence
/// failure; as in the real transaction, neither the order nor the outbox
/// row is written.
#[derive(Clone, Default)]
pub struct InMemoryPaymentOrderRepository {
    state: Arc<RwLock<InMemoryRepositoryState>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryPaymentOrderRepository {
    /// Creates a new repository with its own outbox store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository writing outbox rows into `outbox`.
    pub fn with_outbox(outbox: InMemoryOutboxStore) -> Self {
        Self {
            state: Arc::default(),
            outbox,
        }
    }

    /// Returns the outbox store rows are written into.
    pub fn outbox(&self) -> &InMemoryOutboxStore {
        &self.outbox
    }

    /// Makes every update fail, simulating a database outage.
    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.fail_on_update = fail;
    }
}

#[async_trait]
impl PaymentOrderRepository for InMemoryPaymentOrderRepository {
    async fn insert(&self, order: &PaymentOrder) -> Result<()> {
        self.state
            .write()
            .await
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: PaymentOrderId) -> Result<Option<PaymentOrder>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn update(&self, order: &PaymentOrder) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_update {
            return Err(SettlementError::InvalidStored(
                "simulated update failure".to_string(),
            ));
        }
        if !state.orders.contains_key(&order.id) {
            return Err(SettlementError::OrderNotFound(order.id));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_with_outbox(&self, order: &PaymentOrder, event: NewOutboxEvent) -> Result<()> {
        // hold the state lock across both writes to mimic one transaction
        let mut state = self.state.write().await;
        if state.fail_on_update {
            return Err(SettlementError::InvalidStored(
                "simulated update failure".to_string(),
            ));
        }
        if !state.orders.contains_key(&order.id) {
            return Err(SettlementError::OrderNotFound(order.id));
        }
        state.orders.insert(order.id, order.clone());
        self.outbox.insert(event).await?;
        Ok(())
    }
}
