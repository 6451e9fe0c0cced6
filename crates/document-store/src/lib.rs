//! Versioned document storage with a transactional outbox.
//!
//! Documents are JSON bodies keyed by `(collection, id)` and carry a
//! [`Version`] that increments on every successful save. Saves may be
//! guarded by an expected version for optimistic concurrency, and may carry
//! [`OutboxMessage`]s that are committed atomically with the document.

pub mod document;
pub mod error;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod query;
pub mod store;

pub use document::{Document, Version};
pub use error::{DocumentStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use outbox::{OutboxId, OutboxMessage};
pub use postgres::PostgresDocumentStore;
pub use query::OutboxQuery;
pub use store::{DocumentStore, DocumentStoreExt, SaveOptions};
