//! Message types produced by the load generator.
//!
//! A [`Message`] is the unit the downstream consumer deserializes. Its field names are part
//! of that consumer's contract, so the serde attributes here must not drift.

use crate::types::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a message.
///
/// Usually a v4 UUID, but setup probes and duplicates carry caller-chosen strings, so the
/// identifier is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a new random (v4) message ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the identifier as a UUID, if it is one.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.0).ok()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Topic name for message routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    /// Create a new topic.
    ///
    /// # Errors
    /// Returns an error if the topic name is empty or contains invalid characters.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidMessage {
                message: "Topic name cannot be empty".to_string(),
            });
        }

        if name.len() > 249 {
            return Err(crate::Error::InvalidMessage {
                message: "Topic name cannot exceed 249 characters".to_string(),
            });
        }

        // Kafka-compatible names: alphanumerics, hyphens, underscores, dots
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.') {
            return Err(crate::Error::InvalidMessage {
                message: format!("Topic name '{name}' contains invalid characters"),
            });
        }

        Ok(Self(name))
    }

    /// Get the topic name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of event carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Regular synthetic traffic
    #[serde(rename = "LOAD_TEST")]
    LoadTest,
    /// Re-send of an already used identifier, for idempotency checks downstream
    #[serde(rename = "DUPLICATE_TEST")]
    DuplicateTest,
    /// Connectivity probe sent once during setup
    #[serde(rename = "K6_SETUP")]
    SetupProbe,
}

impl EventType {
    /// Wire name of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadTest => "LOAD_TEST",
            Self::DuplicateTest => "DUPLICATE_TEST",
            Self::SetupProbe => "K6_SETUP",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monetary amount with exactly two decimal digits, stored as integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// Smallest amount an order may carry (10.00).
    pub const MIN: Self = Self(1_000);
    /// Largest amount an order may carry (1000.00).
    pub const MAX: Self = Self(100_000);

    /// Create an amount from integer cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Integer cents.
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Amount as a floating point number of currency units.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid amount: {value}")));
        }
        Ok(Self((value * 100.0).round() as u64))
    }
}

/// Domain object embedded (serialized) in a message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    /// `ORD-<message id>`
    pub order_id: String,
    /// `CUST-<4 digits>`
    pub customer_id: String,
    /// Order total
    pub amount: Amount,
    /// Number of line items
    pub items: u32,
}

impl OrderPayload {
    /// Serialize to the JSON text carried in [`Message::payload`].
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A synthetic event as it is sent to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier, also used as the record key
    pub message_id: MessageId,

    /// Event kind
    pub event_type: EventType,

    /// Serialized domain object
    pub payload: String,

    /// Creation time (ISO-8601)
    pub timestamp: Timestamp,

    /// Producing component
    pub source: String,

    /// Correlation identifier for tracing across services
    pub correlation_id: String,
}

impl Message {
    /// Create a message builder.
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Serialize the whole message to JSON text.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the embedded order payload.
    ///
    /// # Errors
    /// Returns an error if the payload is not an order (setup probes are not).
    pub fn order(&self) -> crate::Result<OrderPayload> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Builder for constructing messages.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    message_id: Option<MessageId>,
    event_type: Option<EventType>,
    payload: Option<String>,
    timestamp: Option<Timestamp>,
    source: Option<String>,
    correlation_id: Option<String>,
}

impl MessageBuilder {
    /// Set the identifier (a fresh v4 UUID is used otherwise).
    #[must_use]
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    /// Set the event type.
    #[must_use]
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Set the payload text.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Set the creation time (now otherwise).
    #[must_use]
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the producing component.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the correlation identifier.
    #[must_use]
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Build the message.
    ///
    /// # Errors
    /// Returns an error if the event type or payload is missing.
    pub fn build(self) -> crate::Result<Message> {
        let event_type = self.event_type.ok_or_else(|| crate::Error::InvalidMessage {
            message: "Event type is required".to_string(),
        })?;
        let payload = self.payload.ok_or_else(|| crate::Error::InvalidMessage {
            message: "Payload is required".to_string(),
        })?;

        Ok(Message {
            message_id: self.message_id.unwrap_or_default(),
            event_type,
            payload,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source: self.source.unwrap_or_default(),
            correlation_id: self.correlation_id.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderPayload {
        OrderPayload {
            order_id: "ORD-1".to_string(),
            customer_id: "CUST-1234".to_string(),
            amount: Amount::from_cents(12_345),
            items: 3,
        }
    }

    #[test]
    fn test_message_builder() {
        let message = Message::builder()
            .event_type(EventType::LoadTest)
            .payload(order().to_json().unwrap())
            .source("surge-producer")
            .correlation_id("corr-abc123")
            .build()
            .unwrap();

        assert_eq!(message.event_type, EventType::LoadTest);
        assert!(message.message_id.as_uuid().is_some());
        assert_eq!(message.order().unwrap(), order());
    }

    #[test]
    fn test_builder_requires_event_type() {
        let result = Message::builder().payload("{}").build();
        assert!(matches!(result, Err(crate::Error::InvalidMessage { .. })));
    }

    #[test]
    fn test_message_wire_field_names() {
        let message = Message::builder()
            .message_id(MessageId::from_string("abc"))
            .event_type(EventType::DuplicateTest)
            .payload("{}")
            .build()
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(json["message_id"], "abc");
        assert_eq!(json["event_type"], "DUPLICATE_TEST");
        assert!(json["timestamp"].is_string());
        assert!(json.get("correlation_id").is_some());
    }

    #[test]
    fn test_payload_camel_case() {
        let json: serde_json::Value = serde_json::from_str(&order().to_json().unwrap()).unwrap();
        assert_eq!(json["orderId"], "ORD-1");
        assert_eq!(json["customerId"], "CUST-1234");
        assert_eq!(json["amount"], 123.45);
        assert_eq!(json["items"], 3);
    }

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::from_cents(1_000).to_string(), "10.00");
        assert_eq!(Amount::from_cents(100_000).to_string(), "1000.00");
        assert_eq!(Amount::from_cents(1_005).to_string(), "10.05");
    }

    #[test]
    fn test_topic_validation() {
        assert!(Topic::new("high-volume-topic").is_ok());
        assert!(Topic::new("").is_err());
        assert!(Topic::new("invalid topic").is_err());
        assert!(Topic::new("a".repeat(250)).is_err());
    }
}
