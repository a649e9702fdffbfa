//! Shared types and ports for the payment settlement platform.
//!
//! This crate provides the vocabulary the other crates speak:
//! - Typed identifiers for payment orders, sellers and events
//! - `Money` as integer minor units plus currency
//! - The interchange `EventEnvelope` exchanged over the bus
//! - The `EventPublisher` port with an in-memory test implementation

pub mod envelope;
pub mod money;
pub mod publish;
pub mod types;

pub use envelope::{EventEnvelope, EventEnvelopeBuilder};
pub use money::{Currency, Money, MoneyError};
pub use publish::{EventPublisher, InMemoryEventPublisher, PublishError, PublishOutcome};
pub use types::{EventId, PaymentOrderId, SellerId, TraceId};
