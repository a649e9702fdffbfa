//! Payment order row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Money, PaymentOrderId, SellerId};

use crate::error::{Result, SettlementError};
use crate::state::PaymentOrderStatus;

/// A payment order, updated in place as settlement progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: PaymentOrderId,
    /// Identifier exposed to the checkout, distinct from the row id.
    pub public_id: String,
    /// Set on follow-up payments (e.g. a retry charge after a partial failure).
    pub parent_payment_id: Option<PaymentOrderId>,
    pub seller_id: SellerId,
    pub amount: Money,
    pub status: PaymentOrderStatus,
    pub retry_count: u32,
    pub retry_reason: Option<String>,
    pub last_error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    /// Creates a new order in `Initiated`.
    pub fn new(seller_id: SellerId, amount: Money) -> Self {
        let id = PaymentOrderId::new();
        let now = Utc::now();
        Self {
            id,
            public_id: format!("pay_{}", id.as_uuid().simple()),
            parent_payment_id: None,
            seller_id,
            amount,
            status: PaymentOrderStatus::Initiated,
            retry_count: 0,
            retry_reason: None,
            last_error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the order to `next`, enforcing the transition graph.
    pub fn transition(&mut self, next: PaymentOrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SettlementError::InvalidTransition {
                order_id: self.id,
                from: self.status,
                to: next,
            });
        }
        tracing::debug!(order_id = %self.id, from = %self.status, to = %next, "order transition");
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records why the latest attempt did not finalize the order.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.retry_reason = Some(reason.clone());
        self.last_error_message = Some(reason);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Currency;

    fn order() -> PaymentOrder {
        PaymentOrder::new(
            SellerId::new("merchant-x"),
            Money::from_minor(10000, Currency::EUR),
        )
    }

    #[test]
    fn new_order_is_initiated() {
        let order = order();
        assert_eq!(order.status, PaymentOrderStatus::Initiated);
        assert_eq!(order.retry_count, 0);
        assert!(order.public_id.starts_with("pay_"));
    }

    #[test]
    fn valid_transition_updates_status() {
        let mut order = order();
        order.transition(PaymentOrderStatus::SuccessfulFinal).unwrap();
        assert_eq!(order.status, PaymentOrderStatus::SuccessfulFinal);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut order = order();
        order.transition(PaymentOrderStatus::DeclinedFinal).unwrap();

        let err = order
            .transition(PaymentOrderStatus::SuccessfulFinal)
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidTransition { .. }));
        assert_eq!(order.status, PaymentOrderStatus::DeclinedFinal);
    }
}
