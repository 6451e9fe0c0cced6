use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Document, DocumentStoreError, OutboxId, OutboxMessage, OutboxQuery, Result, Version,
    store::{DocumentStore, SaveOptions, validate_outbox_for_save},
};

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<(String, String), Document>,
    outbox: Vec<OutboxMessage>,
}

/// In-memory document store implementation for testing.
///
/// Documents and outbox share a single lock, so a save is atomic with
/// respect to every other operation on the store.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }

    /// Returns every outbox message, published or not, in insertion order.
    pub async fn outbox(&self) -> Vec<OutboxMessage> {
        self.state.read().await.outbox.clone()
    }

    /// Returns the number of outbox messages not yet published.
    pub async fn pending_count(&self) -> usize {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .filter(|m| !m.is_published())
            .count()
    }

    /// Clears all documents and outbox messages.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.documents.clear();
        state.outbox.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, mut document: Document) -> Result<Version> {
        let key = (document.collection.clone(), document.id.clone());
        let mut state = self.state.write().await;

        if state.documents.contains_key(&key) {
            return Err(DocumentStoreError::AlreadyExists {
                collection: key.0,
                id: key.1,
            });
        }

        document.version = Version::first();
        document.updated_at = Utc::now();
        state.documents.insert(key, document);

        Ok(Version::first())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn save(
        &self,
        mut document: Document,
        options: SaveOptions,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        validate_outbox_for_save(&document, &outbox)?;

        let key = (document.collection.clone(), document.id.clone());
        let mut state = self.state.write().await;

        let current_version = match state.documents.get(&key) {
            Some(existing) => existing.version,
            None => {
                return Err(DocumentStoreError::NotFound {
                    collection: key.0,
                    id: key.1,
                });
            }
        };

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(DocumentStoreError::ConcurrencyConflict {
                collection: key.0,
                id: key.1,
                expected,
                actual: current_version,
            });
        }

        let new_version = current_version.next();
        document.version = new_version;
        document.updated_at = Utc::now();
        state.documents.insert(key, document);
        metrics::counter!("outbox_messages_written_total").increment(outbox.len() as u64);
        state.outbox.extend(outbox);

        Ok(new_version)
    }

    async fn pending_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxMessage>> {
        let state = self.state.read().await;
        let mut messages: Vec<_> = state
            .outbox
            .iter()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();

        messages.sort_by_key(|m| m.created_at);

        if let Some(limit) = query.limit {
            messages.truncate(limit);
        }

        Ok(messages)
    }

    async fn mark_published(&self, id: OutboxId) -> Result<()> {
        let mut state = self.state.write().await;
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(DocumentStoreError::OutboxMessageNotFound(id))?;

        if message.published_at.is_none() {
            message.published_at = Some(Utc::now());
        }
        Ok(())
    }
}
