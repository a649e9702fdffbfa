//! Transactional outbox dispatcher.
//!
//! Producers insert outbox rows in the same local transaction as their
//! primary write; a pool of competing workers claims, optionally expands,
//! publishes and acknowledges them. The NEW→SENT transition is the only
//! durability boundary, so no state change is ever silently lost:
//! - `OutboxStore` port with in-memory and PostgreSQL implementations
//! - `Dispatcher` worker pool with per-row publish confirmation
//! - `Reclaimer` for claims orphaned by a crashed worker
//! - `BacklogGauge`, a best-effort counter corrected by periodic recount

pub mod backlog;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod expand;
pub mod memory;
pub mod postgres;
pub mod reclaimer;
pub mod store;

pub use backlog::{BacklogGauge, BacklogResync};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{OutboxError, Result};
pub use event::{NewOutboxEvent, OutboxEvent, OutboxStatus};
pub use expand::{EventExpander, ExpanderRegistry, LineItemExpander};
pub use memory::InMemoryOutboxStore;
pub use postgres::PostgresOutboxStore;
pub use reclaimer::Reclaimer;
pub use store::OutboxStore;
