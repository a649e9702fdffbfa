//! Double-entry ledger posting engine.
//!
//! This crate turns business events into balanced journal entries and
//! persists them exactly once:
//! - Account chart with fixed debit/credit-normal polarity per account type
//! - Journal entry factories with fixed posting shapes per transaction type
//! - `LedgerStore` port with in-memory and PostgreSQL implementations;
//!   deterministic entry ids double as the idempotency key at insert time

pub mod account;
pub mod error;
pub mod factory;
pub mod journal;
pub mod memory;
pub mod postgres;
pub mod store;

pub use account::{Account, AccountCategory, AccountType};
pub use error::{LedgerError, Result};
pub use journal::{Direction, JournalEntry, LedgerEntry, Posting, TransactionType};
pub use memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use store::LedgerStore;
