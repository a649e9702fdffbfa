//! PSP gateway port and status classification.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::PaymentOrderId;

use crate::error::{Result, SettlementError};
use crate::order::PaymentOrder;
use crate::state::PaymentOrderStatus;

/// Status codes returned by the PSP, as a closed set.
///
/// Codes the PSP adds over time land in `Unrecognized` rather than failing
/// deserialization; classification routes them to a status check instead of
/// failing fast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PspStatus {
    /// The charge went through.
    Successful,
    /// Explicit "try again later" from the PSP.
    TryLater,
    /// The PSP was unreachable or shedding load.
    ServiceUnavailable,
    /// The call exceeded the caller's timeout budget.
    Timeout,
    /// The PSP asked to poll for the outcome out of band.
    StatusCheckNeeded,
    /// The charge was declined; retrying will not help.
    Declined,
    /// The charge failed permanently.
    Failed,
    /// A code outside the known set.
    Unrecognized(String),
}

impl PspStatus {
    /// Returns the status code as reported on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            PspStatus::Successful => "SUCCESSFUL",
            PspStatus::TryLater => "TRY_LATER",
            PspStatus::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            PspStatus::Timeout => "TIMEOUT",
            PspStatus::StatusCheckNeeded => "STATUS_CHECK_NEEDED",
            PspStatus::Declined => "DECLINED",
            PspStatus::Failed => "FAILED",
            PspStatus::Unrecognized(code) => code,
        }
    }
}

impl std::fmt::Display for PspStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the state machine should do with a PSP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PspOutcome {
    /// Finalize as paid and publish the success event.
    Success,
    /// Schedule a backed-off retry.
    Retry,
    /// Schedule an out-of-band status check.
    StatusCheck,
    /// Finalize with the given terminal status.
    Final(PaymentOrderStatus),
}

/// Classifies a PSP status into the settlement action it requires.
///
/// Pure and total over the closed status set; the `Unrecognized` arm is the
/// explicit default and routes to a status check.
pub fn classify(status: &PspStatus) -> PspOutcome {
    match status {
        PspStatus::Successful => PspOutcome::Success,
        PspStatus::TryLater | PspStatus::ServiceUnavailable | PspStatus::Timeout => {
            PspOutcome::Retry
        }
        PspStatus::StatusCheckNeeded => PspOutcome::StatusCheck,
        PspStatus::Declined => PspOutcome::Final(PaymentOrderStatus::DeclinedFinal),
        PspStatus::Failed => PspOutcome::Final(PaymentOrderStatus::FailedFinal),
        PspStatus::Unrecognized(_) => PspOutcome::StatusCheck,
    }
}

/// Port for the external payment service provider.
#[async_trait]
pub trait PspGateway: Send + Sync {
    /// Authorizes and charges the order.
    async fn charge(&self, order: &PaymentOrder) -> Result<PspStatus>;

    /// Captures a previously authorized charge.
    async fn capture(&self, order: &PaymentOrder) -> Result<PspStatus>;

    /// Queries the PSP for the current outcome of an order.
    async fn check_status(&self, order_id: PaymentOrderId) -> Result<PspStatus>;
}

#[derive(Debug, Default)]
struct InMemoryPspState {
    /// Per-order scripted responses, consumed front to back.
    scripted: HashMap<PaymentOrderId, Vec<PspStatus>>,
    default_status: Option<PspStatus>,
    response_delay: Option<Duration>,
    fail_transport: bool,
    charge_count: u32,
    status_check_count: u32,
}

/// In-memory PSP gateway for testing.
///
/// Responses are scripted per order; each call consumes the next scripted
/// status. An optional artificial delay simulates a slow PSP for timeout
/// tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPspGateway {
    state: Arc<RwLock<InMemoryPspState>>,
}

impl InMemoryPspGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues scripted responses for an order.
    pub fn script(&self, order_id: PaymentOrderId, statuses: Vec<PspStatus>) {
        self.state
            .write()
            .unwrap()
            .scripted
            .entry(order_id)
            .or_default()
            .extend(statuses);
    }

    /// Sets the status returned when no scripted response remains.
    pub fn set_default_status(&self, status: PspStatus) {
        self.state.write().unwrap().default_status = Some(status);
    }

    /// Delays every response by `delay`.
    pub fn set_response_delay(&self, delay: Duration) {
        self.state.write().unwrap().response_delay = Some(delay);
    }

    /// Makes every call fail at the transport level.
    pub fn set_fail_transport(&self, fail: bool) {
        self.state.write().unwrap().fail_transport = fail;
    }

    /// Returns the number of charge calls made.
    pub fn charge_count(&self) -> u32 {
        self.state.read().unwrap().charge_count
    }

    /// Returns the number of status check calls made.
    pub fn status_check_count(&self) -> u32 {
        self.state.read().unwrap().status_check_count
    }

    async fn respond(&self, order_id: PaymentOrderId) -> Result<PspStatus> {
        let delay = self.state.read().unwrap().response_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        if state.fail_transport {
            return Err(SettlementError::PspGateway("connection refused".to_string()));
        }
        let scripted = state
            .scripted
            .get_mut(&order_id)
            .filter(|s| !s.is_empty())
            .map(|s| s.remove(0));
        match scripted.or_else(|| state.default_status.clone()) {
            Some(status) => Ok(status),
            None => Err(SettlementError::PspGateway(format!(
                "no scripted response for order {order_id}"
            ))),
        }
    }
}

#[async_trait]
impl PspGateway for InMemoryPspGateway {
    async fn charge(&self, order: &PaymentOrder) -> Result<PspStatus> {
        self.state.write().unwrap().charge_count += 1;
        self.respond(order.id).await
    }

    async fn capture(&self, order: &PaymentOrder) -> Result<PspStatus> {
        self.respond(order.id).await
    }

    async fn check_status(&self, order_id: PaymentOrderId) -> Result<PspStatus> {
        self.state.write().unwrap().status_check_count += 1;
        self.respond(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, Money, SellerId};

    #[test]
    fn classification_covers_every_status() {
        assert_eq!(classify(&PspStatus::Successful), PspOutcome::Success);
        assert_eq!(classify(&PspStatus::TryLater), PspOutcome::Retry);
        assert_eq!(classify(&PspStatus::ServiceUnavailable), PspOutcome::Retry);
        assert_eq!(classify(&PspStatus::Timeout), PspOutcome::Retry);
        assert_eq!(classify(&PspStatus::StatusCheckNeeded), PspOutcome::StatusCheck);
        assert_eq!(
            classify(&PspStatus::Declined),
            PspOutcome::Final(PaymentOrderStatus::DeclinedFinal)
        );
        assert_eq!(
            classify(&PspStatus::Failed),
            PspOutcome::Final(PaymentOrderStatus::FailedFinal)
        );
    }

    #[test]
    fn unrecognized_status_routes_to_status_check() {
        let status = PspStatus::Unrecognized("FRAUD_REVIEW".to_string());
        assert_eq!(classify(&status), PspOutcome::StatusCheck);
    }

    #[tokio::test]
    async fn scripted_responses_are_consumed_in_order() {
        let gateway = InMemoryPspGateway::new();
        let order = PaymentOrder::new(
            SellerId::new("merchant-x"),
            Money::from_minor(1000, Currency::EUR),
        );
        gateway.script(order.id, vec![PspStatus::TryLater, PspStatus::Successful]);

        assert_eq!(gateway.charge(&order).await.unwrap(), PspStatus::TryLater);
        assert_eq!(gateway.charge(&order).await.unwrap(), PspStatus::Successful);
        assert!(gateway.charge(&order).await.is_err());
        assert_eq!(gateway.charge_count(), 3);
    }
}
