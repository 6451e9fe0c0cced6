//! Outbox relay.
//!
//! Publishes outbox messages the dispatcher could not publish itself, for
//! example because the broker was down or the process died between the
//! write and the publish.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use document_store::{DocumentStore, OutboxQuery};
use domain::{Aggregate, Trip};
use messaging::EventBus;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::{Result, SagaError};
use crate::outbound::publish_outbox_message;

/// Default pause between relay passes.
pub const DEFAULT_RELAY_INTERVAL: Duration = Duration::from_secs(1);

/// Default age a message must reach before the relay touches it.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Default number of messages handled per pass.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Drains pending trip outbox messages onto the bus.
pub struct OutboxRelay<S: DocumentStore, B: EventBus> {
    store: S,
    bus: B,
    interval: Duration,
    grace_period: Duration,
    batch_size: usize,
}

impl<S: DocumentStore, B: EventBus> OutboxRelay<S, B> {
    /// Creates a relay with default timings.
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            interval: DEFAULT_RELAY_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the pause between passes.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how old a message must be before the relay publishes it.
    ///
    /// Younger messages are normally still being published by the dispatcher.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Sets the maximum number of messages per pass.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Publishes one batch of pending messages, oldest first.
    ///
    /// Returns how many were published. Messages that cannot be decoded are
    /// logged and skipped; any other failure ends the pass.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize> {
        let grace = TimeDelta::from_std(self.grace_period).unwrap_or(TimeDelta::zero());
        let query = OutboxQuery::new()
            .collection(Trip::aggregate_type())
            .created_before(Utc::now() - grace)
            .limit(self.batch_size);

        let pending = self.store.pending_outbox(query).await?;
        let mut relayed = 0;

        for message in &pending {
            match publish_outbox_message(&self.store, &self.bus, message).await {
                Ok(channel) => {
                    relayed += 1;
                    tracing::info!(
                        outbox_id = %message.id,
                        trip_id = %message.document_id,
                        channel,
                        "relayed outbox message"
                    );
                }
                Err(e @ (SagaError::Decode(_) | SagaError::UnroutableEvent(_))) => {
                    tracing::error!(
                        outbox_id = %message.id,
                        event_type = %message.event_type,
                        error = %e,
                        "skipping undeliverable outbox message"
                    );
                }
                Err(e) => {
                    metrics::counter!("outbox_relayed_total").increment(relayed as u64);
                    return Err(e);
                }
            }
        }

        metrics::counter!("outbox_relayed_total").increment(relayed as u64);
        Ok(relayed)
    }

    /// Runs passes on the configured interval until `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, grace = ?self.grace_period, "outbox relay started");

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
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!(error = %e, "outbox relay pass failed");
                    }
                }
            }
        }

        tracing::info!("outbox relay stopped");
    }
}
