//! Domain error types.

use document_store::DocumentStoreError;
use thiserror::Error;

use crate::trip::TripError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// A trip rule rejected the operation.
    #[error("Trip error: {0}")]
    Trip(TripError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Every attempt of a guarded read-modify-write lost a concurrent race.
    #[error("Gave up on {aggregate_type} {aggregate_id} after {attempts} conflicting attempts")]
    ConflictRetriesExhausted {
        aggregate_type: &'static str,
        aggregate_id: String,
        attempts: u32,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if the referenced aggregate does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::AggregateNotFound { .. }
                | DomainError::Store(DocumentStoreError::NotFound { .. })
        )
    }

    /// Returns true if a trip state-machine rule rejected the operation.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, DomainError::Trip(TripError::InvalidTransition { .. }))
    }

    /// Returns true if the operation may succeed when retried later.
    pub fn is_transient(&self) -> bool {
        match self {
            DomainError::ConflictRetriesExhausted { .. } => true,
            DomainError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<TripError> for DomainError {
    fn from(e: TripError) -> Self {
        DomainError::Trip(e)
    }
}
