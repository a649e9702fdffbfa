//! Outbox rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{EventEnvelope, TraceId};

use crate::error::{OutboxError, Result};

/// Delivery status of an outbox row.
///
/// Claiming is an implicit marker (`claimed_by` + `claimed_at`), not a
/// status of its own: a crashed worker's claim is simply cleared again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxStatus {
    New,
    Sent,
}

impl OutboxStatus {
    /// Returns the stable code used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::New => "NEW",
            OutboxStatus::Sent => "SENT",
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NEW" => Ok(OutboxStatus::New),
            "SENT" => Ok(OutboxStatus::Sent),
            other => Err(OutboxError::InvalidStored(format!("outbox status {other}"))),
        }
    }
}

/// An outbox row to be inserted alongside a producer's primary write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutboxEvent {
    pub event_type: String,
    pub aggregate_id: String,
    pub trace_id: TraceId,
    /// Opaque serialized payload, interpreted per event type.
    pub payload: serde_json::Value,
}

impl NewOutboxEvent {
    /// Creates a new outbox row with a fresh trace id.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            trace_id: TraceId::new(),
            payload,
        }
    }

    /// Sets the trace id propagated from the originating request.
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = trace_id;
        self
    }
}

/// A persisted outbox row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_type: String,
    pub aggregate_id: String,
    pub trace_id: TraceId,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    /// Builds the interchange envelope for publishing this row.
    pub fn to_envelope(&self) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type(&self.event_type)
            .aggregate_id(&self.aggregate_id)
            .trace_id(self.trace_id)
            .occurred_at(self.created_at)
            .data_raw(self.payload.clone())
            .build()
    }
}
