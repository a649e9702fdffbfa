//! PostgreSQL-backed ledger store implementation.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use common::Money;

use crate::account::Account;
use crate::error::Result;
use crate::journal::{Direction, JournalEntry, LedgerEntry, Posting, TransactionType};
use crate::store::LedgerStore;

/// PostgreSQL-backed ledger store.
///
/// The `entry_id` unique constraint on `journal_entries` is the only
/// dedup mechanism; `ON CONFLICT DO NOTHING ... RETURNING` signals
/// "already applied" by returning no row.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
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

    fn row_to_posting(row: &PgRow) -> Result<Posting> {
        let account_json: serde_json::Value = row.try_get("account")?;
        let account: Account = serde_json::from_value(account_json)?;
        let direction = Direction::from_str(row.try_get("direction")?)?;
        let amount_minor: i64 = row.try_get("amount_minor")?;

        Ok(Posting {
            direction,
            amount: Money::from_minor(amount_minor, account.currency),
            account,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[tracing::instrument(skip(self, entries), fields(entry_count = entries.len()))]
    async fn post_entries_atomic(&self, entries: Vec<JournalEntry>) -> Result<Vec<LedgerEntry>> {
        // re-verify the balance invariant before anything hits the database
        for entry in &entries {
            entry.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        let mut persisted = Vec::new();

        for journal in entries {
            let inserted: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
                r#"
                INSERT INTO journal_entries (entry_id, transaction_type, currency)
                VALUES ($1, $2, $3)
                ON CONFLICT (entry_id) DO NOTHING
                RETURNING ledger_entry_id, created_at
                "#,
            )
            .bind(journal.entry_id())
            .bind(journal.transaction_type().as_str())
            .bind(journal.currency().as_str())
            .fetch_optional(&mut *tx)
            .await?;

            // duplicate id: idempotent replay, skip all posting inserts
            let Some((ledger_entry_id, created_at)) = inserted else {
                tracing::debug!(entry_id = journal.entry_id(), "duplicate entry skipped");
                metrics::counter!("ledger_duplicate_entries_total").increment(1);
                continue;
            };

            for (seq, posting) in journal.postings().iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO postings
                        (ledger_entry_id, seq, account_code, account, direction, amount_minor, currency)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(ledger_entry_id)
                .bind(seq as i32)
                .bind(posting.account.code())
                .bind(serde_json::to_value(&posting.account)?)
                .bind(posting.direction.as_str())
                .bind(posting.amount.minor_units())
                .bind(posting.amount.currency().as_str())
                .execute(&mut *tx)
                .await?;
            }

            metrics::counter!("ledger_entries_posted_total").increment(1);
            persisted.push(LedgerEntry {
                ledger_entry_id,
                journal,
                created_at,
            });
        }

        tx.commit().await?;
        Ok(persisted)
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        let header: Option<PgRow> = sqlx::query(
            r#"
            SELECT ledger_entry_id, entry_id, transaction_type, created_at
            FROM journal_entries
            WHERE entry_id = $1
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let ledger_entry_id: i64 = header.try_get("ledger_entry_id")?;
        let transaction_type = TransactionType::from_str(header.try_get("transaction_type")?)?;
        let created_at: DateTime<Utc> = header.try_get("created_at")?;

        let posting_rows = sqlx::query(
            r#"
            SELECT account, direction, amount_minor
            FROM postings
            WHERE ledger_entry_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(ledger_entry_id)
        .fetch_all(&self.pool)
        .await?;

        let postings = posting_rows
            .iter()
            .map(Self::row_to_posting)
            .collect::<Result<Vec<_>>>()?;

        let journal = JournalEntry::new(entry_id, transaction_type, postings)?;
        Ok(Some(LedgerEntry {
            ledger_entry_id,
            journal,
            created_at,
        }))
    }

    async fn posting_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM postings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
