//! Payment order status graph.

use serde::{Deserialize, Serialize};

use crate::error::SettlementError;

/// The status of a payment order in its settlement lifecycle.
///
/// Status transitions:
/// ```text
/// Initiated ──┬──► SuccessfulFinal
///             ├──► FailedTransientError ──► Initiated (scheduled retry)
///             │                        └──► FailedFinal (retries exhausted)
///             ├──► PendingStatusCheckLater ──► (re-enters via status check)
///             ├──► FailedFinal
///             ├──► DeclinedFinal
///             └──► UnknownFinal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentOrderStatus {
    /// Waiting for a PSP outcome.
    #[default]
    Initiated,

    /// Paid; the success event has been published (terminal state).
    SuccessfulFinal,

    /// The PSP reported a transient failure; a retry is scheduled.
    FailedTransientError,

    /// The PSP outcome is not yet known; a status check is scheduled.
    PendingStatusCheckLater,

    /// Failed permanently (terminal state).
    FailedFinal,

    /// Declined by the PSP (terminal state).
    DeclinedFinal,

    /// Finalized without a conclusive PSP outcome (terminal state).
    UnknownFinal,
}

impl PaymentOrderStatus {
    /// Returns true if no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentOrderStatus::SuccessfulFinal
                | PaymentOrderStatus::FailedFinal
                | PaymentOrderStatus::DeclinedFinal
                | PaymentOrderStatus::UnknownFinal
        )
    }

    /// Returns true if `next` is reachable from this status in one step.
    pub fn can_transition_to(&self, next: PaymentOrderStatus) -> bool {
        use PaymentOrderStatus::*;
        match self {
            Initiated => next != Initiated,
            // a scheduled retry re-enters the machine; exhaustion finalizes
            FailedTransientError => matches!(next, Initiated | FailedFinal),
            // an out-of-band status check re-runs classification
            PendingStatusCheckLater => !matches!(next, PendingStatusCheckLater),
            _ => false,
        }
    }

    /// Returns the stable code used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOrderStatus::Initiated => "INITIATED",
            PaymentOrderStatus::SuccessfulFinal => "SUCCESSFUL_FINAL",
            PaymentOrderStatus::FailedTransientError => "FAILED_TRANSIENT_ERROR",
            PaymentOrderStatus::PendingStatusCheckLater => "PENDING_STATUS_CHECK_LATER",
            PaymentOrderStatus::FailedFinal => "FAILED_FINAL",
            PaymentOrderStatus::DeclinedFinal => "DECLINED_FINAL",
            PaymentOrderStatus::UnknownFinal => "UNKNOWN_FINAL",
        }
    }
}

impl std::fmt::Display for PaymentOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentOrderStatus {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(PaymentOrderStatus::Initiated),
            "SUCCESSFUL_FINAL" => Ok(PaymentOrderStatus::SuccessfulFinal),
            "FAILED_TRANSIENT_ERROR" => Ok(PaymentOrderStatus::FailedTransientError),
            "PENDING_STATUS_CHECK_LATER" => Ok(PaymentOrderStatus::PendingStatusCheckLater),
            "FAILED_FINAL" => Ok(PaymentOrderStatus::FailedFinal),
            "DECLINED_FINAL" => Ok(PaymentOrderStatus::DeclinedFinal),
            "UNKNOWN_FINAL" => Ok(PaymentOrderStatus::UnknownFinal),
            other => Err(SettlementError::InvalidStored(format!(
                "payment order status {other}"
            ))),
        }
    }
}
