//! Core aggregate and domain event traits.

use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Stored as the outbox message type and used to route the event.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates persisted as a single document.
///
/// The aggregate state is the document body. Its stored version lives in the
/// document metadata, never in the body, so loading then saving an aggregate
/// leaves the body byte-for-byte comparable.
pub trait Aggregate: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// The type of events this aggregate records for downstream consumers.
    type Event: DomainEvent;

    /// The type of errors this aggregate's rules can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the collection the aggregate is stored in.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's key within its collection.
    fn id(&self) -> &str;
}
