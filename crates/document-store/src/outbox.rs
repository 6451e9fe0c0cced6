use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Unique identifier for an outbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxId(Uuid);

impl OutboxId {
    /// Creates a new random outbox ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an outbox ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OutboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message recorded alongside a document change, awaiting publication.
///
/// Outbox messages are written in the same atomic operation as the document
/// they describe, so a durable state change always has a durable record of
/// the side effect it owes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Unique identifier for this message.
    pub id: OutboxId,

    /// Collection of the document that produced the message.
    pub collection: String,

    /// Key of the document that produced the message.
    pub document_id: String,

    /// The type of the recorded event (e.g. "DriverAssigned").
    pub event_type: String,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// When the message was recorded.
    pub created_at: DateTime<Utc>,

    /// When the message was published, if it has been.
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Creates a new unpublished message from a raw JSON payload.
    pub fn new(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: OutboxId::new(),
            collection: collection.into(),
            document_id: document_id.into(),
            event_type: event_type.into(),
            payload,
            created_at: Utc::now(),
            published_at: None,
        }
    }

    /// Creates a new unpublished message by serializing an event.
    pub fn from_event<T: Serialize>(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        event_type: impl Into<String>,
        event: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            collection,
            document_id,
            event_type,
            serde_json::to_value(event)?,
        ))
    }

    /// Deserializes the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Returns true once the message has been published.
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_id_new_creates_unique_ids() {
        assert_ne!(OutboxId::new(), OutboxId::new());
    }

    #[test]
    fn new_message_is_unpublished() {
        let msg = OutboxMessage::new("trips", "T1", "DriverAssigned", serde_json::json!({}));
        assert!(!msg.is_published());
        assert_eq!(msg.document_id, "T1");
        assert_eq!(msg.event_type, "DriverAssigned");
    }

    #[test]
    fn from_event_serializes_payload() {
        let msg = OutboxMessage::from_event(
            "trips",
            "T1",
            "Thing",
            &serde_json::json!({"driver": "D1"}),
        )
        .unwrap();
        let decoded: serde_json::Value = msg.decode().unwrap();
        assert_eq!(decoded["driver"], "D1");
    }
}
