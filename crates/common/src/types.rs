use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a payment order.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// payment order IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentOrderId(Uuid);

impl PaymentOrderId {
    /// Creates a new random payment order ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a payment order ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PaymentOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PaymentOrderId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PaymentOrderId> for Uuid {
    fn from(id: PaymentOrderId) -> Self {
        id.0
    }
}

/// Identifier for a seller / merchant.
///
/// Sellers are identified by an externally assigned code (e.g. `"merchant-x"`),
/// which also appears as the entity part of merchant account codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SellerId(String);

impl SellerId {
    /// Creates a seller ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the seller ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SellerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SellerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SellerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SellerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation identifier propagated across service boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Creates a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a trace ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_order_id_new_creates_unique_ids() {
        let id1 = PaymentOrderId::new();
        let id2 = PaymentOrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn payment_order_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = PaymentOrderId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn seller_id_string_conversion() {
        let id = SellerId::new("merchant-x");
        assert_eq!(id.as_str(), "merchant-x");

        let id2: SellerId = "merchant-y".into();
        assert_eq!(id2.as_str(), "merchant-y");
    }

    #[test]
    fn payment_order_id_serialization_roundtrip() {
        let id = PaymentOrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: PaymentOrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
