//! PostgreSQL-backed snapshot store implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::Result;
use crate::snapshot::{AccountBalanceSnapshot, SnapshotStore};

/// PostgreSQL-backed snapshot store.
///
/// The watermark guard is expressed in the upsert statement itself, so the
/// check and the write are one atomic statement.
#[derive(Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Creates a new PostgreSQL snapshot store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_snapshot(row: PgRow) -> Result<AccountBalanceSnapshot> {
        Ok(AccountBalanceSnapshot {
            account_code: row.try_get("account_code")?,
            balance: row.try_get("balance")?,
            last_applied_entry_id: row.try_get("last_applied_entry_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn get(&self, account_code: &str) -> Result<Option<AccountBalanceSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT account_code, balance, last_applied_entry_id, created_at, updated_at
            FROM account_balance_snapshots
            WHERE account_code = $1
            "#,
        )
        .bind(account_code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_snapshot).transpose()
    }

    async fn upsert(&self, snapshot: AccountBalanceSnapshot) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO account_balance_snapshots
                (account_code, balance, last_applied_entry_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_code) DO UPDATE SET
                balance = EXCLUDED.balance,
                last_applied_entry_id = EXCLUDED.last_applied_entry_id,
                updated_at = EXCLUDED.updated_at
            WHERE account_balance_snapshots.last_applied_entry_id
                <= EXCLUDED.last_applied_entry_id
            "#,
        )
        .bind(&snapshot.account_code)
        .bind(snapshot.balance)
        .bind(snapshot.last_applied_entry_id)
        .bind(snapshot.created_at)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
