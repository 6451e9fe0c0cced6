use chrono::{DateTime, Utc};

use crate::OutboxMessage;

/// Builder for selecting unpublished outbox messages.
///
/// Results are always ordered oldest first.
#[derive(Debug, Clone, Default)]
pub struct OutboxQuery {
    /// Only messages produced by documents in this collection.
    pub collection: Option<String>,

    /// Only messages recorded strictly before this timestamp.
    pub created_before: Option<DateTime<Utc>>,

    /// Maximum number of messages to return.
    pub limit: Option<usize>,
}

impl OutboxQuery {
    /// Creates a query matching every unpublished message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by collection.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Filters to messages recorded before this timestamp.
    pub fn created_before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.created_before = Some(timestamp);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if an unpublished message satisfies the filters.
    ///
    /// The limit is not considered.
    pub fn matches(&self, message: &OutboxMessage) -> bool {
        if message.is_published() {
            return false;
        }
        if let Some(ref collection) = self.collection
            && &message.collection != collection
        {
            return false;
        }
        if let Some(before) = self.created_before
            && message.created_at >= before
        {
            return false;
        }
        true
    }
}
