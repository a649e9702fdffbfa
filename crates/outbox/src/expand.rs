//! Event expansion: parent rows that fan out into child rows.

use std::collections::HashMap;

use crate::error::{OutboxError, Result};
use crate::event::{NewOutboxEvent, OutboxEvent};

/// Derives child outbox rows from an expandable parent row.
///
/// Expansion runs after claim and before publish; the children are
/// inserted in one transaction and flow through the normal dispatch cycle.
/// A crash between insertion and the parent's acknowledgement re-expands
/// on redelivery, so children must carry deterministic aggregate ids and
/// consumers must tolerate duplicates.
pub trait EventExpander: Send + Sync {
    /// Derives the child rows for `parent`.
    fn expand(&self, parent: &OutboxEvent) -> Result<Vec<NewOutboxEvent>>;
}

/// Registry of expanders keyed by event type.
#[derive(Default)]
pub struct ExpanderRegistry {
    expanders: HashMap<String, Box<dyn EventExpander>>,
}

impl ExpanderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an expander for an event type, replacing any previous one.
    pub fn register(&mut self, event_type: impl Into<String>, expander: Box<dyn EventExpander>) {
        let event_type = event_type.into();
        tracing::info!(event_type, "registered event expander");
        self.expanders.insert(event_type, expander);
    }

    /// Returns the expander for `event_type`, if any.
    pub fn get(&self, event_type: &str) -> Option<&dyn EventExpander> {
        self.expanders.get(event_type).map(|e| e.as_ref())
    }
}

/// Expands `payment_order.created` into one row per line item.
///
/// Child aggregate ids are `{parent_aggregate_id}:{index}` so replayed
/// expansions produce identical children.
pub struct LineItemExpander;

/// Event type produced for each line item of a created payment order.
pub const LINE_ITEM_CREATED: &str = "payment_order.line_item.created";

impl EventExpander for LineItemExpander {
    fn expand(&self, parent: &OutboxEvent) -> Result<Vec<NewOutboxEvent>> {
        let Some(line_items) = parent.payload.get("line_items") else {
            return Ok(Vec::new());
        };
        let line_items = line_items
            .as_array()
            .ok_or_else(|| OutboxError::ExpansionFailed {
                event_type: parent.event_type.clone(),
                reason: "line_items is not an array".to_string(),
            })?;

        let children = line_items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                NewOutboxEvent::new(
                    LINE_ITEM_CREATED,
                    format!("{}:{}", parent.aggregate_id, index),
                    serde_json::json!({
                        "payment_order_id": parent.aggregate_id,
                        "index": index,
                        "line_item": item,
                    }),
                )
                .with_trace_id(parent.trace_id)
            })
            .collect();

        Ok(children)
    }
}
