use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{Delivery, Envelope, Result};

/// What a consumer tells the broker after handling a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The message is consumed.
    Ack,

    /// The message was not handled. With `requeue` the broker may deliver it
    /// again; without, it goes straight to the dead-letter queue.
    Reject { requeue: bool },
}

impl HandlerOutcome {
    /// Reject and ask for redelivery.
    pub fn retry() -> Self {
        HandlerOutcome::Reject { requeue: true }
    }

    /// Reject without redelivery.
    pub fn dead_letter() -> Self {
        HandlerOutcome::Reject { requeue: false }
    }

    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerOutcome::Ack => "ack",
            HandlerOutcome::Reject { requeue: true } => "requeue",
            HandlerOutcome::Reject { requeue: false } => "dead_letter",
        }
    }
}

/// A queue consumer.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Handles one delivery. Never fails; failures are expressed in the outcome.
    async fn handle(&self, delivery: Delivery) -> HandlerOutcome;
}

/// Interface to the message broker.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an envelope to a channel, routed by the channel name.
    async fn publish(&self, channel: &str, envelope: &Envelope) -> Result<()>;

    /// Consumes a queue until `shutdown` turns true.
    ///
    /// Each delivery is handled in its own task. In-flight handlers are
    /// awaited before this returns.
    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>;
}

#[async_trait]
impl<T: EventBus + ?Sized> EventBus for Arc<T> {
    async fn publish(&self, channel: &str, envelope: &Envelope) -> Result<()> {
        (**self).publish(channel, envelope).await
    }

    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        (**self).subscribe(queue, handler, shutdown).await
    }
}
