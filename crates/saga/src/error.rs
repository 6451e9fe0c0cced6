//! Saga error types.

use std::time::Duration;

use document_store::DocumentStoreError;
use domain::DomainError;
use messaging::{BusError, HandlerOutcome};
use thiserror::Error;

/// Errors that can occur while applying driver responses or relaying events.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The envelope or its payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// An accept or decline arrived without a driver descriptor.
    #[error("Message '{tag}' is missing a driver")]
    MissingDriver { tag: &'static str },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Document store error.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// Event bus error.
    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    /// The handler did not finish before its deadline.
    #[error("Handler timed out after {0:?}")]
    Timeout(Duration),

    /// An outbox message carries an event this crate cannot route.
    #[error("No outbound route for event type {0}")]
    UnroutableEvent(String),

    /// A payment request was refused before reaching the processor.
    #[error("Invalid payment request: {0}")]
    InvalidPaymentRequest(String),

    /// Payment processor error.
    #[error("Payment processor error: {0}")]
    Payment(String),
}

impl SagaError {
    /// Returns true if handling the same message again may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SagaError::Domain(e) => e.is_transient(),
            SagaError::Store(e) => e.is_transient(),
            SagaError::Bus(_) | SagaError::Timeout(_) | SagaError::Payment(_) => true,
            SagaError::Decode(_)
            | SagaError::MissingDriver { .. }
            | SagaError::UnroutableEvent(_)
            | SagaError::InvalidPaymentRequest(_) => false,
        }
    }

    /// Maps the error onto what the broker should do with the message.
    ///
    /// Invalid transitions are consumed since redelivery cannot change them.
    /// Other terminal errors are dead-lettered and transient ones requeued.
    pub fn disposition(&self) -> HandlerOutcome {
        match self {
            SagaError::Domain(e) if e.is_invalid_transition() => HandlerOutcome::Ack,
            e if e.is_transient() => HandlerOutcome::retry(),
            _ => HandlerOutcome::dead_letter(),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::TripId;
    use document_store::Version;
    use domain::{TripError, TripStatus};

    fn not_found() -> SagaError {
        SagaError::Domain(DomainError::AggregateNotFound {
            aggregate_type: "trips",
            aggregate_id: TripId::new("T1").into_inner(),
        })
    }

    #[test]
    fn disposition_table() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            SagaError::from(decode).disposition(),
            HandlerOutcome::dead_letter()
        );
        assert_eq!(
            SagaError::MissingDriver { tag: "driver-accept" }.disposition(),
            HandlerOutcome::dead_letter()
        );
        assert_eq!(not_found().disposition(), HandlerOutcome::dead_letter());

        let invalid = SagaError::Domain(DomainError::Trip(TripError::InvalidTransition {
            current_status: TripStatus::Requested,
            action: "complete",
        }));
        assert_eq!(invalid.disposition(), HandlerOutcome::Ack);

        let exhausted = SagaError::Domain(DomainError::ConflictRetriesExhausted {
            aggregate_type: "trips",
            aggregate_id: "T1".to_string(),
            attempts: 5,
        });
        assert_eq!(exhausted.disposition(), HandlerOutcome::retry());

        assert_eq!(
            SagaError::Bus(BusError::Closed).disposition(),
            HandlerOutcome::retry()
        );
        assert_eq!(
            SagaError::Timeout(Duration::from_secs(5)).disposition(),
            HandlerOutcome::retry()
        );
    }

    #[test]
    fn store_conflict_is_transient() {
        let conflict = SagaError::Store(DocumentStoreError::ConcurrencyConflict {
            collection: "trips".to_string(),
            id: "T1".to_string(),
            expected: Version::new(1),
            actual: Version::new(2),
        });
        assert!(conflict.is_transient());

        let missing = SagaError::Store(DocumentStoreError::NotFound {
            collection: "trips".to_string(),
            id: "T1".to_string(),
        });
        assert!(!missing.is_transient());
        assert_eq!(missing.disposition(), HandlerOutcome::dead_letter());
    }
}
