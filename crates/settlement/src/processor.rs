//! Settlement processor: one PSP outcome in, exactly one transition out.

use std::time::Duration;

use common::publish::EventPublisher;
use common::{EventEnvelope, PaymentOrderId};
use outbox::NewOutboxEvent;

use crate::backoff::{MAX_RETRIES, equal_jitter_delay};
use crate::error::{Result, SettlementError};
use crate::order::PaymentOrder;
use crate::psp::{PspGateway, PspOutcome, PspStatus, classify};
use crate::repository::PaymentOrderRepository;
use crate::retry::{PspResultCache, RetryCounterStore, RetryScheduler};
use crate::state::PaymentOrderStatus;

/// Budget for a single PSP call; an elapsed timeout cancels the in-flight
/// call and counts as a transient outcome.
const PSP_CALL_TIMEOUT: Duration = Duration::from_secs(1);

/// How far out a requested status check is scheduled.
const STATUS_CHECK_DELAY: Duration = Duration::from_secs(30 * 60);

/// Drives the settlement state machine for payment orders.
///
/// Every branch persists the new order row before any publish; persistence
/// errors propagate so the inbound message is redelivered. Terminal
/// failures go through the outbox; the terminal-success event is published
/// synchronously (terminal and idempotent downstream, so the outbox
/// round trip is skipped for latency).
pub struct SettlementProcessor<R, G, P, C, S, H>
where
    R: PaymentOrderRepository,
    G: PspGateway,
    P: EventPublisher,
    C: RetryCounterStore,
    S: RetryScheduler,
    H: PspResultCache,
{
    repository: R,
    gateway: G,
    publisher: P,
    retry_counts: C,
    scheduler: S,
    psp_cache: H,
}

impl<R, G, P, C, S, H> SettlementProcessor<R, G, P, C, S, H>
where
    R: PaymentOrderRepository,
    G: PspGateway,
    P: EventPublisher,
    C: RetryCounterStore,
    S: RetryScheduler,
    H: PspResultCache,
{
    /// Creates a new settlement processor.
    pub fn new(
        repository: R,
        gateway: G,
        publisher: P,
        retry_counts: C,
        scheduler: S,
        psp_cache: H,
    ) -> Self {
        Self {
            repository,
            gateway,
            publisher,
            retry_counts,
            scheduler,
            psp_cache,
        }
    }

    /// Handles an order-created (or retry-redelivered) message: charge the
    /// PSP and process the outcome.
    ///
    /// Redelivery of an already-successful order re-publishes the success
    /// event; redelivery of any other terminal order is a no-op.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn handle_order_created(
        &self,
        order_id: PaymentOrderId,
    ) -> Result<PaymentOrderStatus> {
        let mut order = self
            .repository
            .get(order_id)
            .await?
            .ok_or(SettlementError::OrderNotFound(order_id))?;

        if order.status == PaymentOrderStatus::SuccessfulFinal {
            // publish may have failed after the terminal write; re-emit
            self.publisher.publish(&success_envelope(&order)).await?;
            return Ok(order.status);
        }
        if order.status.is_terminal() {
            tracing::debug!(status = %order.status, "redelivery of terminal order ignored");
            return Ok(order.status);
        }
        if order.status == PaymentOrderStatus::FailedTransientError {
            // scheduled retry re-enters the machine
            order.transition(PaymentOrderStatus::Initiated)?;
        }

        let psp_status = self.charge_with_timeout(&order).await?;
        self.process_psp_result(order, psp_status).await
    }

    /// Handles a scheduled status-check redelivery.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn handle_status_check(
        &self,
        order_id: PaymentOrderId,
    ) -> Result<PaymentOrderStatus> {
        let order = self
            .repository
            .get(order_id)
            .await?
            .ok_or(SettlementError::OrderNotFound(order_id))?;

        if order.status.is_terminal() {
            return Ok(order.status);
        }

        let psp_status =
            match tokio::time::timeout(PSP_CALL_TIMEOUT, self.gateway.check_status(order_id)).await
            {
                Ok(result) => result?,
                Err(_) => PspStatus::Timeout,
            };
        self.process_psp_result(order, psp_status).await
    }

    /// Maps a PSP outcome for `order` to exactly one transition.
    pub async fn process_psp_result(
        &self,
        mut order: PaymentOrder,
        psp_status: PspStatus,
    ) -> Result<PaymentOrderStatus> {
        let outcome = classify(&psp_status);
        tracing::info!(
            order_id = %order.id,
            psp_status = %psp_status,
            ?outcome,
            "processing psp result"
        );

        match outcome {
            PspOutcome::Success => {
                order.transition(PaymentOrderStatus::SuccessfulFinal)?;
                self.repository.update(&order).await?;
                metrics::counter!("settlement_outcomes_total", "outcome" => "success")
                    .increment(1);
                self.publisher.publish(&success_envelope(&order)).await?;
            }
            PspOutcome::Retry => {
                let attempt = self.retry_counts.add(order.id, 1).await?;
                if attempt >= MAX_RETRIES {
                    return self.force_finalize(order, &psp_status).await;
                }

                order.retry_count = attempt;
                order.record_failure(psp_status.as_str());
                order.transition(PaymentOrderStatus::FailedTransientError)?;
                self.repository.update(&order).await?;

                self.psp_cache.invalidate(order.id).await?;
                let delay = equal_jitter_delay(attempt);
                self.scheduler.schedule_retry(order.id, delay).await?;
                metrics::counter!("settlement_outcomes_total", "outcome" => "retry_scheduled")
                    .increment(1);
                tracing::info!(order_id = %order.id, attempt, ?delay, "retry scheduled");
            }
            PspOutcome::StatusCheck => {
                if order.status != PaymentOrderStatus::PendingStatusCheckLater {
                    order.transition(PaymentOrderStatus::PendingStatusCheckLater)?;
                    let event = NewOutboxEvent::new(
                        "payment_order.pending_status_check",
                        order.id.to_string(),
                        order_payload(&order),
                    );
                    self.repository.update_with_outbox(&order, event).await?;
                }
                self.scheduler
                    .schedule_status_check(order.id, STATUS_CHECK_DELAY)
                    .await?;
                metrics::counter!("settlement_outcomes_total", "outcome" => "status_check")
                    .increment(1);
            }
            PspOutcome::Final(status) => {
                order.record_failure(psp_status.as_str());
                order.transition(status)?;
                let event_type = match status {
                    PaymentOrderStatus::DeclinedFinal => "payment_order.declined",
                    _ => "payment_order.failed",
                };
                let event =
                    NewOutboxEvent::new(event_type, order.id.to_string(), order_payload(&order));
                self.repository.update_with_outbox(&order, event).await?;
                metrics::counter!("settlement_outcomes_total", "outcome" => "finalized_failed")
                    .increment(1);
            }
        }

        Ok(order.status)
    }

    /// Finalizes an order whose transient retries are exhausted.
    async fn force_finalize(
        &self,
        mut order: PaymentOrder,
        psp_status: &PspStatus,
    ) -> Result<PaymentOrderStatus> {
        order.record_failure(format!(
            "retries exhausted after {MAX_RETRIES} attempts (last: {psp_status})"
        ));
        order.transition(PaymentOrderStatus::FailedFinal)?;
        let event = NewOutboxEvent::new(
            "payment_order.failed",
            order.id.to_string(),
            order_payload(&order),
        );
        self.repository.update_with_outbox(&order, event).await?;
        self.retry_counts.reset(order.id).await?;
        metrics::counter!("settlement_outcomes_total", "outcome" => "retries_exhausted")
            .increment(1);
        tracing::warn!(order_id = %order.id, "transient retries exhausted, order failed");
        Ok(order.status)
    }

    async fn charge_with_timeout(&self, order: &PaymentOrder) -> Result<PspStatus> {
        match tokio::time::timeout(PSP_CALL_TIMEOUT, self.gateway.charge(order)).await {
            Ok(result) => result,
            Err(_) => {
                metrics::counter!("settlement_psp_timeouts_total").increment(1);
                tracing::warn!(order_id = %order.id, "psp charge timed out");
                Ok(PspStatus::Timeout)
            }
        }
    }
}

fn order_payload(order: &PaymentOrder) -> serde_json::Value {
    serde_json::json!({
        "payment_order_id": order.id,
        "public_id": order.public_id,
        "seller_id": order.seller_id,
        "amount_minor": order.amount.minor_units(),
        "currency": order.amount.currency().as_str(),
        "status": order.status.as_str(),
        "retry_reason": order.retry_reason,
    })
}

fn success_envelope(order: &PaymentOrder) -> EventEnvelope {
    EventEnvelope::builder()
        .event_type("payment_order.settled")
        .aggregate_id(order.id.to_string())
        .data_raw(order_payload(order))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, InMemoryEventPublisher, Money, SellerId};
    use outbox::OutboxStore;

    use crate::psp::InMemoryPspGateway;
    use crate::repository::InMemoryPaymentOrderRepository;
    use crate::retry::{
        InMemoryPspResultCache, InMemoryRetryCounterStore, InMemoryRetryScheduler,
        ScheduledRedelivery,
    };

    type TestProcessor = SettlementProcessor<
        InMemoryPaymentOrderRepository,
        InMemoryPspGateway,
        InMemoryEventPublisher,
        InMemoryRetryCounterStore,
        InMemoryRetryScheduler,
        InMemoryPspResultCache,
    >;

    struct Fixture {
        processor: TestProcessor,
        repository: InMemoryPaymentOrderRepository,
        gateway: InMemoryPspGateway,
        publisher: InMemoryEventPublisher,
        retry_counts: InMemoryRetryCounterStore,
        scheduler: InMemoryRetryScheduler,
        psp_cache: InMemoryPspResultCache,
    }

    fn fixture() -> Fixture {
        let repository = InMemoryPaymentOrderRepository::new();
        let gateway = InMemoryPspGateway::new();
        let publisher = InMemoryEventPublisher::new();
        let retry_counts = InMemoryRetryCounterStore::new();
        let scheduler = InMemoryRetryScheduler::new();
        let psp_cache = InMemoryPspResultCache::new();
        let processor = SettlementProcessor::new(
            repository.clone(),
            gateway.clone(),
            publisher.clone(),
            retry_counts.clone(),
            scheduler.clone(),
            psp_cache.clone(),
        );
        Fixture {
            processor,
            repository,
            gateway,
            publisher,
            retry_counts,
            scheduler,
            psp_cache,
        }
    }

    async fn seeded_order(fx: &Fixture) -> PaymentOrder {
        let order = PaymentOrder::new(
            SellerId::new("merchant-x"),
            Money::from_minor(10000, Currency::EUR),
        );
        fx.repository.insert(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn successful_charge_finalizes_and_publishes() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.script(order.id, vec![PspStatus::Successful]);

        let status = fx.processor.handle_order_created(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::SuccessfulFinal);

        let events = fx.publisher.published_of_type("payment_order.settled");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate_id, order.id.to_string());
        // success bypasses the outbox
        assert_eq!(fx.repository.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn redelivered_success_republishes_without_recharging() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.script(order.id, vec![PspStatus::Successful]);

        fx.processor.handle_order_created(order.id).await.unwrap();
        fx.processor.handle_order_created(order.id).await.unwrap();

        assert_eq!(fx.gateway.charge_count(), 1);
        assert_eq!(
            fx.publisher.published_of_type("payment_order.settled").len(),
            2
        );
    }

    #[tokio::test]
    async fn declined_finalizes_through_the_outbox() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.script(order.id, vec![PspStatus::Declined]);

        let status = fx.processor.handle_order_created(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::DeclinedFinal);

        let stored = fx.repository.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_reason.as_deref(), Some("DECLINED"));

        let rows = fx.repository.outbox().all_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "payment_order.declined");
        assert_eq!(fx.publisher.published_count(), 0);
    }

    #[tokio::test]
    async fn transient_failure_schedules_backed_off_retry() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.script(order.id, vec![PspStatus::TryLater]);

        let status = fx.processor.handle_order_created(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::FailedTransientError);

        let stored = fx.repository.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 1);

        // first attempt: capped = 2000ms, delay in [1000, 2000]
        let delays = fx.scheduler.retry_delays();
        assert_eq!(delays.len(), 1);
        assert!((1000..=2000).contains(&(delays[0].as_millis() as u64)));

        assert_eq!(fx.psp_cache.invalidated(), vec![order.id]);
    }

    #[tokio::test]
    async fn ten_transient_failures_force_finalize_and_reset_counter() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway
            .script(order.id, vec![PspStatus::TryLater; MAX_RETRIES as usize]);

        let mut status = PaymentOrderStatus::Initiated;
        for _ in 0..MAX_RETRIES {
            status = fx.processor.handle_order_created(order.id).await.unwrap();
        }

        assert_eq!(status, PaymentOrderStatus::FailedFinal);
        assert_eq!(fx.retry_counts.get(order.id).await.unwrap(), 0);
        // nine retries scheduled, the tenth failure finalizes instead
        assert_eq!(fx.scheduler.retry_delays().len(), MAX_RETRIES as usize - 1);

        let rows = fx.repository.outbox().all_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "payment_order.failed");
    }

    #[tokio::test]
    async fn status_check_marks_pending_then_resolves() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway
            .script(order.id, vec![PspStatus::StatusCheckNeeded, PspStatus::Successful]);

        let status = fx.processor.handle_order_created(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::PendingStatusCheckLater);
        assert!(matches!(
            fx.scheduler.scheduled()[0],
            ScheduledRedelivery::StatusCheck { delay, .. } if delay == STATUS_CHECK_DELAY
        ));

        let status = fx.processor.handle_status_check(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::SuccessfulFinal);
        assert_eq!(fx.gateway.status_check_count(), 1);
    }

    #[tokio::test]
    async fn repeated_status_check_requests_only_reschedule() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.script(
            order.id,
            vec![PspStatus::StatusCheckNeeded, PspStatus::StatusCheckNeeded],
        );

        fx.processor.handle_order_created(order.id).await.unwrap();
        let status = fx.processor.handle_status_check(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::PendingStatusCheckLater);

        // pending row written once, check scheduled twice
        assert_eq!(fx.repository.outbox().all_rows().await.len(), 1);
        assert_eq!(fx.scheduler.scheduled().len(), 2);
    }

    #[tokio::test]
    async fn unrecognized_status_routes_to_status_check() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.script(
            order.id,
            vec![PspStatus::Unrecognized("FRAUD_REVIEW".to_string())],
        );

        let status = fx.processor.handle_order_created(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::PendingStatusCheckLater);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_psp_charge_counts_as_transient() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.set_default_status(PspStatus::Successful);
        fx.gateway.set_response_delay(Duration::from_secs(5));

        let status = fx.processor.handle_order_created(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::FailedTransientError);
        assert_eq!(fx.retry_counts.get(order.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_propagates_for_redelivery() {
        let fx = fixture();
        let order = seeded_order(&fx).await;
        fx.gateway.script(order.id, vec![PspStatus::Declined, PspStatus::Declined]);
        fx.repository.set_fail_on_update(true).await;

        assert!(fx.processor.handle_order_created(order.id).await.is_err());

        // the stored row is untouched, so redelivery can try again
        let stored = fx.repository.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentOrderStatus::Initiated);

        fx.repository.set_fail_on_update(false).await;
        let status = fx.processor.handle_order_created(order.id).await.unwrap();
        assert_eq!(status, PaymentOrderStatus::DeclinedFinal);
    }
}
