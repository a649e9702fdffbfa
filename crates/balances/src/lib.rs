//! Per-account balance cache and reconciled snapshots.
//!
//! Exposes a cheap real-time balance and a durable, reconciled strong
//! balance per account without scanning the ledger on every read:
//! - `BalanceCache`: ephemeral per-account delta counter plus watermark
//! - `SnapshotStore`: durable balance with a monotone watermark guard
//! - `BalanceService`: applies ledger deltas, serves reads, runs merges

pub mod cache;
pub mod error;
pub mod postgres;
pub mod service;
pub mod snapshot;

pub use cache::{BalanceCache, CachedDelta, InMemoryBalanceCache};
pub use error::{BalanceError, Result};
pub use postgres::PostgresSnapshotStore;
pub use service::BalanceService;
pub use snapshot::{AccountBalanceSnapshot, InMemorySnapshotStore, SnapshotStore};
