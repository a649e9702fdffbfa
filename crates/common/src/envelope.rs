//! Interchange envelope exchanged over the message bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, TraceId};

/// The envelope wrapping every event crossing a service boundary.
///
/// The `data` payload is opaque to the core: its shape is a per-`event_type`
/// contract between producer and consumer. Topic naming and wire format are
/// adapter concerns; the assumed contract is one logical topic per event
/// type, keyed by `aggregate_id` for partition affinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The type of the event (e.g. `"payment_order.settled"`).
    pub event_type: String,

    /// The aggregate this event belongs to, used as the partition key.
    pub aggregate_id: String,

    /// Correlation ID propagated from the originating request.
    pub trace_id: TraceId,

    /// The event that caused this one, if any.
    pub parent_event_id: Option<EventId>,

    /// When the event was created.
    pub occurred_at: DateTime<Utc>,

    /// The event payload as JSON, opaque per event type.
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<String>,
    trace_id: Option<TraceId>,
    parent_event_id: Option<EventId>,
    occurred_at: Option<DateTime<Utc>>,
    data: Option<serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: impl Into<String>) -> Self {
        self.aggregate_id = Some(id.into());
        self
    }

    /// Sets the trace ID. If not set, a new one will be generated.
    pub fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Sets the parent event ID.
    pub fn parent_event_id(mut self, id: EventId) -> Self {
        self.parent_event_id = Some(id);
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn data<T: Serialize>(mut self, data: &T) -> Result<Self, serde_json::Error> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn data_raw(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Builds the event envelope.
    ///
    /// # Panics
    ///
    /// Panics if `event_type`, `aggregate_id` or `data` are not set.
    pub fn build(self) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.expect("event_type is required"),
            aggregate_id: self.aggregate_id.expect("aggregate_id is required"),
            trace_id: self.trace_id.unwrap_or_default(),
            parent_event_id: self.parent_event_id,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            data: self.data.expect("data is required"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_builder_fills_defaults() {
        let envelope = EventEnvelope::builder()
            .event_type("payment_order.settled")
            .aggregate_id("8b2e0c1a")
            .data_raw(serde_json::json!({"amount": 10000}))
            .build();

        assert_eq!(envelope.event_type, "payment_order.settled");
        assert_eq!(envelope.aggregate_id, "8b2e0c1a");
        assert!(envelope.parent_event_id.is_none());
        assert_eq!(envelope.data, serde_json::json!({"amount": 10000}));
    }

    #[test]
    fn envelope_serialization_roundtrip() {
        let envelope = EventEnvelope::builder()
            .event_type("ledger.entry_posted")
            .aggregate_id("AUTH:123")
            .parent_event_id(EventId::new())
            .data_raw(serde_json::json!({"entries": []}))
            .build();

        let json = serde_json::to_string(&envelope).unwrap();
        let deserialized: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope, deserialized);
    }
}
