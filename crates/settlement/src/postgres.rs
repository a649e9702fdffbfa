//! PostgreSQL-backed payment order repository.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use common::{Currency, Money, PaymentOrderId, SellerId};
use outbox::NewOutboxEvent;

use crate::error::{Result, SettlementError};
use crate::order::PaymentOrder;
use crate::repository::PaymentOrderRepository;
use crate::state::PaymentOrderStatus;

/// PostgreSQL-backed payment order repository.
#[derive(Clone)]
pub struct PostgresPaymentOrderRepository {
    pool: PgPool,
}

impl PostgresPaymentOrderRepository {
    /// Creates a new PostgreSQL repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: &PgRow) -> Result<PaymentOrder> {
        let id: uuid::Uuid = row.try_get("id")?;
        let parent: Option<uuid::Uuid> = row.try_get("parent_payment_id")?;
        let seller_id: String = row.try_get("seller_id")?;
        let amount_minor: i64 = row.try_get("amount_minor")?;
        let currency: String = row.try_get("currency")?;
        let currency = Currency::from_str(&currency)
            .map_err(|e| SettlementError::InvalidStored(e.to_string()))?;
        let status = PaymentOrderStatus::from_str(row.try_get("status")?)?;
        let retry_count: i32 = row.try_get("retry_count")?;

        Ok(PaymentOrder {
            id: PaymentOrderId::from_uuid(id),
            public_id: row.try_get("public_id")?,
            parent_payment_id: parent.map(PaymentOrderId::from_uuid),
            seller_id: SellerId::new(seller_id),
            amount: Money::from_minor(amount_minor, currency),
            status,
            retry_count: retry_count as u32,
            retry_reason: row.try_get("retry_reason")?,
            last_error_message: row.try_get("last_error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn update_in<'e, E>(executor: E, order: &PaymentOrder) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders
            SET status = $2, retry_count = $3, retry_reason = $4,
                last_error_message = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.retry_count as i32)
        .bind(&order.retry_reason)
        .bind(&order.last_error_message)
        .bind(order.updated_at)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SettlementError::OrderNotFound(order.id));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentOrderRepository for PostgresPaymentOrderRepository {
    async fn insert(&self, order: &PaymentOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_orders
                (id, public_id, parent_payment_id, seller_id, amount_minor, currency,
                 status, retry_count, retry_reason, last_error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.public_id)
        .bind(order.parent_payment_id.map(|p| p.as_uuid()))
        .bind(order.seller_id.as_str())
        .bind(order.amount.minor_units())
        .bind(order.amount.currency().as_str())
        .bind(order.status.as_str())
        .bind(order.retry_count as i32)
        .bind(&order.retry_reason)
        .bind(&order.last_error_message)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: PaymentOrderId) -> Result<Option<PaymentOrder>> {
        let row = sqlx::query("SELECT * FROM payment_orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn update(&self, order: &PaymentOrder) -> Result<()> {
        Self::update_in(&self.pool, order).await
    }

    #[tracing::instrument(skip(self, order, event), fields(order_id = %order.id))]
    async fn update_with_outbox(&self, order: &PaymentOrder, event: NewOutboxEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        Self::update_in(&mut *tx, order).await?;
        sqlx::query(
            r#"
            INSERT INTO outbox_events (event_type, aggregate_id, trace_id, payload, status)
            VALUES ($1, $2, $3, $4, 'NEW')
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.aggregate_id)
        .bind(event.trace_id.as_uuid())
        .bind(&event.payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
