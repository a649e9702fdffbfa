//! Bus publish port and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::EventEnvelope;

/// Errors raised by the bus adapter.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus could not be reached; the whole batch must be retried.
    #[error("bus transport error: {0}")]
    Transport(String),

    /// The bus rejected the event.
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Per-event outcome of a batch publish.
///
/// An event counts as delivered only when the bus explicitly confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The bus confirmed delivery.
    Confirmed,
    /// The bus reported a failure for this event only.
    Failed(String),
}

impl PublishOutcome {
    /// Returns true if the bus confirmed delivery.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, PublishOutcome::Confirmed)
    }
}

/// Port for publishing events to the message bus.
///
/// `publish` is used synchronously on the terminal-success settlement path;
/// `publish_batch` is used by the outbox dispatcher. A batch-level `Err`
/// means nothing in the batch was delivered; otherwise the returned outcomes
/// align index-wise with the input slice.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a single event, waiting for bus confirmation.
    async fn publish(&self, event: &EventEnvelope) -> Result<(), PublishError>;

    /// Publishes a batch of events, returning one outcome per event.
    async fn publish_batch(
        &self,
        events: &[EventEnvelope],
    ) -> Result<Vec<PublishOutcome>, PublishError>;
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<EventEnvelope>,
    fail_all: bool,
    fail_event_types: HashSet<String>,
}

/// In-memory publisher for testing.
///
/// Records every confirmed event and can be configured to fail a whole
/// batch or individual event types.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail every call at the batch level.
    pub fn set_fail_all(&self, fail: bool) {
        self.state.write().unwrap().fail_all = fail;
    }

    /// Configures the publisher to fail events of the given type only.
    pub fn set_fail_event_type(&self, event_type: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .fail_event_types
            .insert(event_type.into());
    }

    /// Clears any configured per-type failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.write().unwrap();
        state.fail_all = false;
        state.fail_event_types.clear();
    }

    /// Returns the number of confirmed events.
    pub fn published_count(&self) -> usize {
        self.state.read().unwrap().published.len()
    }

    /// Returns a copy of all confirmed events.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns the confirmed events of the given type.
    pub fn published_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.state
            .read()
            .unwrap()
            .published
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &EventEnvelope) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap();
        if state.fail_all {
            return Err(PublishError::Transport("bus unavailable".to_string()));
        }
        if state.fail_event_types.contains(&event.event_type) {
            return Err(PublishError::Rejected(format!(
                "event type {} rejected",
                event.event_type
            )));
        }
        state.published.push(event.clone());
        Ok(())
    }

    async fn publish_batch(
        &self,
        events: &[EventEnvelope],
    ) -> Result<Vec<PublishOutcome>, PublishError> {
        let mut state = self.state.write().unwrap();
        if state.fail_all {
            return Err(PublishError::Transport("bus unavailable".to_string()));
        }

        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            if state.fail_event_types.contains(&event.event_type) {
                outcomes.push(PublishOutcome::Failed(format!(
                    "event type {} rejected",
                    event.event_type
                )));
            } else {
                state.published.push(event.clone());
                outcomes.push(PublishOutcome::Confirmed);
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type(event_type)
            .aggregate_id("agg-1")
            .data_raw(serde_json::json!({}))
            .build()
    }

    #[tokio::test]
    async fn publish_records_event() {
        let publisher = InMemoryEventPublisher::new();
        publisher.publish(&envelope("a")).await.unwrap();
        assert_eq!(publisher.published_count(), 1);
    }

    #[tokio::test]
    async fn fail_all_fails_whole_batch() {
        let publisher = InMemoryEventPublisher::new();
        publisher.set_fail_all(true);

        let result = publisher.publish_batch(&[envelope("a"), envelope("b")]).await;
        assert!(matches!(result, Err(PublishError::Transport(_))));
        assert_eq!(publisher.published_count(), 0);
    }

    #[tokio::test]
    async fn per_type_failure_only_affects_that_event() {
        let publisher = InMemoryEventPublisher::new();
        publisher.set_fail_event_type("bad");

        let outcomes = publisher
            .publish_batch(&[envelope("good"), envelope("bad")])
            .await
            .unwrap();

        assert_eq!(outcomes[0], PublishOutcome::Confirmed);
        assert!(matches!(outcomes[1], PublishOutcome::Failed(_)));
        assert_eq!(publisher.published_count(), 1);
    }
}
