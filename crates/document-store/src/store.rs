use std::sync::Arc;

use async_trait::async_trait;

use crate::{Document, DocumentStoreError, OutboxId, OutboxMessage, OutboxQuery, Result, Version};

/// Options for saving a document.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Expected stored version for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl SaveOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stored document to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document at [`Version::first`].
    ///
    /// Fails with `AlreadyExists` if the key is taken.
    async fn insert(&self, document: Document) -> Result<Version>;

    /// Retrieves a document by key.
    ///
    /// Returns None if the document doesn't exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Replaces an existing document and records outbox messages.
    ///
    /// The document and the outbox messages are written atomically: either
    /// all of them are stored or none is. If `options.expected_version` is
    /// set, the save fails with `ConcurrencyConflict` when the stored
    /// version differs.
    ///
    /// Returns the new version of the document.
    async fn save(
        &self,
        document: Document,
        options: SaveOptions,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version>;

    /// Retrieves unpublished outbox messages, oldest first.
    async fn pending_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxMessage>>;

    /// Marks an outbox message as published.
    ///
    /// Marking an already published message is a no-op.
    async fn mark_published(&self, id: OutboxId) -> Result<()>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn insert(&self, document: Document) -> Result<Version> {
        (**self).insert(document).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        (**self).get(collection, id).await
    }

    async fn save(
        &self,
        document: Document,
        options: SaveOptions,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        (**self).save(document, options, outbox).await
    }

    async fn pending_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxMessage>> {
        (**self).pending_outbox(query).await
    }

    async fn mark_published(&self, id: OutboxId) -> Result<()> {
        (**self).mark_published(id).await
    }
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Retrieves a document, failing with `NotFound` if it doesn't exist.
    async fn get_required(&self, collection: &str, id: &str) -> Result<Document> {
        self.get(collection, id)
            .await?
            .ok_or_else(|| DocumentStoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    /// Checks if a document exists.
    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Validates that outbox messages belong to the document being saved.
pub fn validate_outbox_for_save(document: &Document, outbox: &[OutboxMessage]) -> Result<()> {
    for message in outbox {
        if message.collection != document.collection || message.document_id != document.id {
            return Err(DocumentStoreError::InvalidSave(format!(
                "outbox message {} targets {}/{}, not {}/{}",
                message.id,
                message.collection,
                message.document_id,
                document.collection,
                document.id
            )));
        }
        if message.is_published() {
            return Err(DocumentStoreError::InvalidSave(format!(
                "outbox message {} is already published",
                message.id
            )));
        }
    }
    Ok(())
}
