//! Settlement state machine.
//!
//! Maps an asynchronous PSP outcome for one payment order to exactly one
//! durable state transition, with bounded backed-off retry:
//! - `PaymentOrderStatus` transition graph and `PaymentOrder` row
//! - pure PSP status classification over a closed status set
//! - equal-jitter backoff for transient outcomes
//! - `SettlementProcessor` driving charge / retry / status-check / finalize

pub mod backoff;
pub mod error;
pub mod order;
pub mod postgres;
pub mod processor;
pub mod psp;
pub mod repository;
pub mod retry;
pub mod state;

pub use backoff::{MAX_RETRIES, equal_jitter_delay};
pub use error::{Result, SettlementError};
pub use order::PaymentOrder;
pub use postgres::PostgresPaymentOrderRepository;
pub use processor::SettlementProcessor;
pub use psp::{InMemoryPspGateway, PspGateway, PspOutcome, PspStatus, classify};
pub use repository::{InMemoryPaymentOrderRepository, PaymentOrderRepository};
pub use retry::{
    InMemoryPspResultCache, InMemoryRetryCounterStore, InMemoryRetryScheduler, PspResultCache,
    RetryCounterStore, RetryScheduler,
};
pub use state::PaymentOrderStatus;
