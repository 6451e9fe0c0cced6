use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinSet;

use crate::{BusError, Delivery, DeliveryHandler, Envelope, EventBus, HandlerOutcome, Result};

/// Default number of redeliveries before a requeued message is dead-lettered.
pub const DEFAULT_MAX_REDELIVERIES: u32 = 3;

/// A message accepted by [`InMemoryEventBus::publish`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub channel: String,
    pub envelope: Envelope,
}

/// A message the broker gave up on.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub queue: String,
    pub delivery: Delivery,
    pub reason: &'static str,
}

struct Queue {
    sender: mpsc::UnboundedSender<Delivery>,
    /// Taken by the active consumer.
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

#[derive(Default)]
struct BusState {
    /// Routing key to bound queue names.
    bindings: HashMap<String, Vec<String>>,
    queues: HashMap<String, Queue>,
    published: Vec<PublishedMessage>,
    dead_letters: Vec<DeadLetter>,
    acked: usize,
}

impl BusState {
    fn declare_queue(&mut self, name: &str) -> &mut Queue {
        self.queues.entry(name.to_string()).or_insert_with(Queue::new)
    }
}

struct Shared {
    state: Mutex<BusState>,
    /// Deliveries enqueued but not yet acked or dead-lettered.
    in_flight: AtomicUsize,
    idle: Notify,
    fail_publishes: AtomicBool,
    max_redeliveries: u32,
}

/// In-memory broker with routing-key bindings, redelivery and dead-lettering.
///
/// Mirrors a topic exchange: publishing to a channel delivers a copy to every
/// queue bound to that channel name, with the channel as routing key. Every
/// publish is also recorded for inspection.
#[derive(Clone)]
pub struct InMemoryEventBus {
    shared: Arc<Shared>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    /// Creates a broker with the default redelivery limit.
    pub fn new() -> Self {
        Self::with_max_redeliveries(DEFAULT_MAX_REDELIVERIES)
    }

    /// Creates a broker that redelivers a requeued message at most `max` times.
    pub fn with_max_redeliveries(max: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BusState::default()),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                fail_publishes: AtomicBool::new(false),
                max_redeliveries: max,
            }),
        }
    }

    /// Binds a queue to a routing key, declaring the queue if needed.
    pub async fn bind(&self, queue: &str, routing_key: &str) {
        let mut state = self.shared.state.lock().await;
        state.declare_queue(queue);
        let bound = state.bindings.entry(routing_key.to_string()).or_default();
        if !bound.iter().any(|q| q == queue) {
            bound.push(queue.to_string());
        }
    }

    /// Puts a delivery straight onto a queue, bypassing routing.
    pub async fn deliver(&self, queue: &str, delivery: Delivery) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        let sender = state.declare_queue(queue).sender.clone();
        self.enqueue(&sender, delivery)
    }

    /// Makes every subsequent publish fail (or succeed again).
    pub fn set_fail_publishes(&self, fail: bool) {
        self.shared.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Returns every accepted publish, in order.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.shared.state.lock().await.published.clone()
    }

    /// Returns the envelopes accepted on one channel, in order.
    pub async fn published_on(&self, channel: &str) -> Vec<Envelope> {
        self.shared
            .state
            .lock()
            .await
            .published
            .iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.envelope.clone())
            .collect()
    }

    /// Returns the dead-lettered messages.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.shared.state.lock().await.dead_letters.clone()
    }

    /// Returns the number of acknowledged deliveries.
    pub async fn acked_count(&self) -> usize {
        self.shared.state.lock().await.acked
    }

    /// Returns the number of deliveries not yet settled.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until every delivery is acked or dead-lettered.
    ///
    /// Returns false if that does not happen within `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.shared.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    fn enqueue(&self, sender: &mpsc::UnboundedSender<Delivery>, delivery: Delivery) -> Result<()> {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        if sender.send(delivery).is_err() {
            self.finish_one();
            return Err(BusError::Closed);
        }
        Ok(())
    }

    fn finish_one(&self) {
        if self.shared.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.idle.notify_waiters();
        }
    }

    async fn settle(
        &self,
        queue: &str,
        sender: &mpsc::UnboundedSender<Delivery>,
        mut delivery: Delivery,
        outcome: HandlerOutcome,
    ) {
        match outcome {
            HandlerOutcome::Ack => {
                self.shared.state.lock().await.acked += 1;
                self.finish_one();
            }
            HandlerOutcome::Reject { requeue: true }
                if delivery.attempt <= self.shared.max_redeliveries =>
            {
                delivery.attempt += 1;
                tracing::debug!(
                    queue,
                    routing_key = %delivery.routing_key,
                    attempt = delivery.attempt,
                    "redelivering"
                );
                // Still in flight; the count carries over to the redelivery
                if let Err(mpsc::error::SendError(delivery)) = sender.send(delivery) {
                    self.dead_letter(queue, delivery, "queue closed").await;
                }
            }
            HandlerOutcome::Reject { requeue } => {
                let reason = if requeue {
                    "redeliveries exhausted"
                } else {
                    "rejected"
                };
                self.dead_letter(queue, delivery, reason).await;
            }
        }
    }

    async fn dead_letter(&self, queue: &str, delivery: Delivery, reason: &'static str) {
        tracing::warn!(
            queue,
            routing_key = %delivery.routing_key,
            attempt = delivery.attempt,
            reason,
            "message dead-lettered"
        );
        self.shared.state.lock().await.dead_letters.push(DeadLetter {
            queue: queue.to_string(),
            delivery,
            reason,
        });
        self.finish_one();
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, channel: &str, envelope: &Envelope) -> Result<()> {
        if self.shared.fail_publishes.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                channel: channel.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        let delivery = Delivery::from_envelope(channel, envelope)?;
        let mut state = self.shared.state.lock().await;

        state.published.push(PublishedMessage {
            channel: channel.to_string(),
            envelope: envelope.clone(),
        });

        let queues = state.bindings.get(channel).cloned().unwrap_or_default();
        for queue in queues {
            let sender = state.declare_queue(&queue).sender.clone();
            self.enqueue(&sender, delivery.clone())?;
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let (sender, mut receiver) = {
            let mut state = self.shared.state.lock().await;
            let declared = state.declare_queue(queue);
            let receiver = declared
                .receiver
                .take()
                .ok_or_else(|| BusError::AlreadySubscribed(queue.to_string()))?;
            (declared.sender.clone(), receiver)
        };

        tracing::info!(queue, "consumer started");
        let mut tasks = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(delivery) = receiver.recv() => {
                    let bus = self.clone();
                    let handler = handler.clone();
                    let sender = sender.clone();
                    let queue = queue.to_string();
                    tasks.spawn(async move {
                        let outcome = handler.handle(delivery.clone()).await;
                        bus.settle(&queue, &sender, delivery, outcome).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(queue, error = %e, "delivery task failed");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(queue, error = %e, "delivery task failed");
            }
        }

        // Hand the queue back so it can be consumed again
        if let Some(declared) = self.shared.state.lock().await.queues.get_mut(queue) {
            declared.receiver = Some(receiver);
        }

        tracing::info!(queue, "consumer stopped");
        Ok(())
    }
}
