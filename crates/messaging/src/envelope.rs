use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// The outer wire wrapper carried over the broker.
///
/// `data` holds the tag-specific payload; its schema is known only to the
/// producer and the consumer of a given routing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The user the message concerns (the rider, for trip events).
    #[serde(rename = "ownerID")]
    pub owner_id: String,

    pub data: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope from a raw payload.
    pub fn new(owner_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            owner_id: owner_id.into(),
            data,
        }
    }

    /// Creates an envelope by serializing a payload.
    pub fn from_payload<T: Serialize>(
        owner_id: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(owner_id, serde_json::to_value(payload)?))
    }

    /// Deserializes the payload.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Encodes the envelope for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A message handed to a queue consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The key the message was published with; selects the handler.
    pub routing_key: String,

    /// The raw message body, normally an encoded [`Envelope`].
    pub body: Vec<u8>,

    /// 1 on first delivery, incremented on each redelivery.
    pub attempt: u32,
}

impl Delivery {
    /// Creates a first-attempt delivery from a raw body.
    pub fn new(routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            routing_key: routing_key.into(),
            body,
            attempt: 1,
        }
    }

    /// Creates a first-attempt delivery carrying an encoded envelope.
    pub fn from_envelope(
        routing_key: impl Into<String>,
        envelope: &Envelope,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(routing_key, envelope.to_bytes()?))
    }

    /// Decodes the body as an envelope.
    pub fn envelope(&self) -> Result<Envelope, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Returns true if the broker delivered this message before.
    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_shape() {
        let envelope = Envelope::new("R1", serde_json::json!({"tripID": "T1"}));
        let json: serde_json::Value = serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"ownerID": "R1", "data": {"tripID": "T1"}}));
    }

    #[test]
    fn delivery_decodes_envelope() {
        let envelope = Envelope::from_payload("R1", &serde_json::json!({"x": 1})).unwrap();
        let delivery = Delivery::from_envelope("driver-accept", &envelope).unwrap();

        assert_eq!(delivery.attempt, 1);
        assert!(!delivery.is_redelivery());
        assert_eq!(delivery.envelope().unwrap(), envelope);

        let data: serde_json::Value = envelope.decode_data().unwrap();
        assert_eq!(data["x"], 1);
    }

    #[test]
    fn malformed_body_fails_to_decode() {
        let delivery = Delivery::new("driver-accept", b"not json".to_vec());
        assert!(delivery.envelope().is_err());
    }
}
