use thiserror::Error;

use common::PaymentOrderId;
use common::publish::PublishError;

use crate::state::PaymentOrderStatus;

/// Errors that can occur in the settlement state machine.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The payment order does not exist.
    #[error("payment order not found: {0}")]
    OrderNotFound(PaymentOrderId),

    /// The requested status transition is not on the transition graph.
    #[error("invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: PaymentOrderId,
        from: PaymentOrderStatus,
        to: PaymentOrderStatus,
    },

    /// The PSP gateway failed at the transport level.
    #[error("psp gateway error: {0}")]
    PspGateway(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Publishing the terminal success event failed.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// An outbox write attached to the order update failed.
    #[error(transparent)]
    Outbox(#[from] outbox::OutboxError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row contained a value outside the closed code sets.
    #[error("invalid stored value: {0}")]
    InvalidStored(String),
}

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, SettlementError>;
