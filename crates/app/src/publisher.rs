//! Stand-in bus adapter.
//!
//! The real message-bus adapter lives outside this repository; this
//! publisher confirms every event after logging it, which keeps the
//! dispatcher pipeline runnable end to end.

use async_trait::async_trait;

use common::EventEnvelope;
use common::publish::{EventPublisher, PublishError, PublishOutcome};

#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &EventEnvelope) -> Result<(), PublishError> {
        tracing::info!(
            event_id = %event.event_id,
            event_type = event.event_type,
            aggregate_id = event.aggregate_id,
            "event published"
        );
        metrics::counter!("bus_events_published_total").increment(1);
        Ok(())
    }

    async fn publish_batch(
        &self,
        events: &[EventEnvelope],
    ) -> Result<Vec<PublishOutcome>, PublishError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(vec![PublishOutcome::Confirmed; events.len()])
    }
}
