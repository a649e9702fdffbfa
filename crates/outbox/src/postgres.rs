//! PostgreSQL-backed outbox store implementation.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Duration;
use sqlx::{PgPool, Row, postgres::PgRow};

use common::TraceId;

use crate::error::{OutboxError, Result};
use crate::event::{NewOutboxEvent, OutboxEvent, OutboxStatus};
use crate::store::OutboxStore;

/// PostgreSQL-backed outbox store.
///
/// Claiming uses `FOR UPDATE SKIP LOCKED` so competing workers never block
/// each other and never receive the same row.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    /// Creates a new PostgreSQL outbox store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: &PgRow) -> Result<OutboxEvent> {
        let trace_id: uuid::Uuid = row.try_get("trace_id")?;
        let status = OutboxStatus::from_str(row.try_get("status")?)?;

        Ok(OutboxEvent {
            id: row.try_get("id")?,
            event_type: row.try_get("event_type")?,
            aggregate_id: row.try_get("aggregate_id")?,
            trace_id: TraceId::from_uuid(trace_id),
            payload: row.try_get("payload")?,
            status,
            claimed_by: row.try_get("claimed_by")?,
            claimed_at: row.try_get("claimed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_in<'e, E>(executor: E, event: NewOutboxEvent) -> Result<OutboxEvent>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            INSERT INTO outbox_events (event_type, aggregate_id, trace_id, payload, status)
            VALUES ($1, $2, $3, $4, 'NEW')
            RETURNING id, event_type, aggregate_id, trace_id, payload, status,
                      claimed_by, claimed_at, created_at
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.aggregate_id)
        .bind(event.trace_id.as_uuid())
        .bind(&event.payload)
        .fetch_one(executor)
        .await?;

        Self::row_to_event(&row)
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn insert(&self, event: NewOutboxEvent) -> Result<OutboxEvent> {
        Self::insert_in(&self.pool, event).await
    }

    async fn insert_batch(&self, events: Vec<NewOutboxEvent>) -> Result<Vec<OutboxEvent>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(events.len());
        for event in events {
            inserted.push(Self::insert_in(&mut *tx, event).await?);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    #[tracing::instrument(skip(self))]
    async fn claim_batch(&self, worker_id: &str, batch_size: u32) -> Result<Vec<OutboxEvent>> {
        let rows = sqlx::query(
            r#"
            UPDATE outbox_events
            SET claimed_by = $1, claimed_at = now()
            WHERE id IN (
                SELECT id FROM outbox_events
                WHERE status = 'NEW' AND claimed_by IS NULL
                ORDER BY id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, event_type, aggregate_id, trace_id, payload, status,
                      claimed_by, claimed_at, created_at
            "#,
        )
        .bind(worker_id)
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut claimed = rows
            .iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;
        // RETURNING does not guarantee row order
        claimed.sort_by_key(|e| e.id);
        Ok(claimed)
    }

    async fn mark_sent(&self, ids: &[i64]) -> Result<()> {
        sqlx::query("UPDATE outbox_events SET status = 'SENT' WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unclaim(&self, ids: &[i64]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET claimed_by = NULL, claimed_at = NULL
            WHERE id = ANY($1) AND status <> 'SENT'
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reclaim_stuck(&self, older_than: Duration) -> Result<u64> {
        let seconds = older_than.num_seconds();
        if seconds < 0 {
            return Err(OutboxError::InvalidStored(
                "reclaim threshold must be non-negative".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET claimed_by = NULL, claimed_at = NULL
            WHERE status = 'NEW'
              AND claimed_at IS NOT NULL
              AND claimed_at < now() - make_interval(secs => $1)
            "#,
        )
        .bind(seconds as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_pending(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_events WHERE status = 'NEW' AND claimed_by IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn get(&self, id: i64) -> Result<Option<OutboxEvent>> {
        let row = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, trace_id, payload, status,
                   claimed_by, claimed_at, created_at
            FROM outbox_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_event).transpose()
    }
}
