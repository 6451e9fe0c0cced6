//! Driver-response dispatcher.
//!
//! Consumes the driver-response queue, routes each delivery by its routing
//! key to one trip service operation, and publishes the event that operation
//! recorded. Failures are mapped onto broker outcomes by
//! [`SagaError::disposition`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use document_store::{DocumentStore, OutboxMessage};
use domain::{AcceptOutcome, ApplyAccept, ApplyCompletion, RecordDecline, TripService};
use futures_util::future::BoxFuture;
use messaging::{Delivery, DeliveryHandler, EventBus, HandlerOutcome};

use crate::contracts::{
    DRIVER_CMD_TRIP_ACCEPT, DRIVER_CMD_TRIP_COMPLETE, DRIVER_CMD_TRIP_DECLINE, DriverResponseData,
};
use crate::error::{Result, SagaError};
use crate::outbound::publish_outbox_message;

/// Default deadline for handling one delivery.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// A routed handler. Returns the outbox message the operation recorded, if any.
type Route<S, B> = for<'a> fn(
    &'a DriverResponseDispatcher<S, B>,
    DriverResponseData,
) -> BoxFuture<'a, Result<Option<OutboxMessage>>>;

/// Applies driver responses to trips.
pub struct DriverResponseDispatcher<S: DocumentStore, B: EventBus> {
    service: Arc<TripService<S>>,
    bus: B,
    handler_timeout: Duration,
    routes: HashMap<&'static str, Route<S, B>>,
}

impl<S, B> DriverResponseDispatcher<S, B>
where
    S: DocumentStore,
    B: EventBus,
{
    /// Creates a dispatcher with the standard routing table.
    pub fn new(service: Arc<TripService<S>>, bus: B) -> Self {
        let mut routes: HashMap<&'static str, Route<S, B>> = HashMap::new();
        routes.insert(DRIVER_CMD_TRIP_ACCEPT, route_accept::<S, B>);
        routes.insert(DRIVER_CMD_TRIP_DECLINE, route_decline::<S, B>);
        routes.insert(DRIVER_CMD_TRIP_COMPLETE, route_complete::<S, B>);

        Self {
            service,
            bus,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            routes,
        }
    }

    /// Sets the deadline for handling one delivery.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Returns the registered routing keys, sorted.
    pub fn routes(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.routes.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Returns the trip service the dispatcher drives.
    pub fn service(&self) -> &TripService<S> {
        &self.service
    }

    /// Handles one delivery to completion, without the deadline.
    ///
    /// Unknown routing keys are logged and succeed.
    pub async fn dispatch(&self, delivery: &Delivery) -> Result<()> {
        let tag = delivery.routing_key.as_str();
        let Some(route) = self.routes.get(tag) else {
            tracing::warn!(tag, "unknown driver response, acknowledging");
            return Ok(());
        };

        let envelope = delivery.envelope()?;
        let data: DriverResponseData = envelope.decode_data()?;

        tracing::debug!(
            tag,
            trip_id = %data.trip_id,
            attempt = delivery.attempt,
            "driver response received"
        );

        if let Some(message) = route(self, data).await? {
            self.publish_now(&message).await;
        }

        Ok(())
    }

    /// Publishes a freshly recorded outbox message.
    ///
    /// The state change is already durable, so a failure here only delays
    /// the event until the relay picks it up.
    async fn publish_now(&self, message: &OutboxMessage) {
        if let Err(e) = publish_outbox_message(self.service.store(), &self.bus, message).await {
            tracing::warn!(
                outbox_id = %message.id,
                trip_id = %message.document_id,
                error = %e,
                "immediate publish failed, leaving message for the outbox relay"
            );
        }
    }

    #[tracing::instrument(skip(self, data), fields(trip_id = %data.trip_id))]
    async fn apply_accept(&self, mut data: DriverResponseData) -> Result<Option<OutboxMessage>> {
        let driver = data.require_driver(DRIVER_CMD_TRIP_ACCEPT)?;
        let driver_id = driver.id.clone();

        let result = self
            .service
            .apply_accept(ApplyAccept::new(data.trip_id, driver))
            .await?;

        match result.output {
            AcceptOutcome::Assigned => {
                tracing::info!(driver_id = %driver_id, "driver assigned");
            }
            AcceptOutcome::AlreadyAssigned => {
                tracing::info!(
                    driver_id = %driver_id,
                    assigned = ?result.aggregate.assigned_driver().map(|d| d.id.as_str()),
                    "trip already assigned, ignoring accept"
                );
            }
        }

        Ok(result.outbox)
    }

    #[tracing::instrument(skip(self, data), fields(trip_id = %data.trip_id))]
    async fn record_decline(&self, mut data: DriverResponseData) -> Result<Option<OutboxMessage>> {
        let driver = data.require_driver(DRIVER_CMD_TRIP_DECLINE)?;

        let result = self
            .service
            .record_decline(RecordDecline::new(data.trip_id, driver.id.clone()))
            .await?;

        if result.output.is_recorded() {
            tracing::info!(
                driver_id = %driver.id,
                declined = result.output.declined_driver_ids().len(),
                "driver declined"
            );
        } else {
            tracing::debug!(driver_id = %driver.id, "duplicate decline ignored");
        }

        Ok(result.outbox)
    }

    #[tracing::instrument(skip(self, data), fields(trip_id = %data.trip_id))]
    async fn apply_completion(&self, data: DriverResponseData) -> Result<Option<OutboxMessage>> {
        let result = self
            .service
            .apply_completion(ApplyCompletion::new(data.trip_id))
            .await?;

        tracing::info!(
            driver_id = ?data.driver.as_ref().map(|d| d.id.as_str()),
            "trip completed"
        );

        Ok(result.outbox)
    }

    fn settle(&self, tag: &str, error: &SagaError) -> HandlerOutcome {
        let outcome = error.disposition();
        if error.is_transient() {
            tracing::error!(tag, error = %error, outcome = outcome.as_str(), "driver response failed");
        } else {
            tracing::warn!(tag, error = %error, outcome = outcome.as_str(), "driver response rejected");
        }
        outcome
    }

    fn tag_label(&self, tag: &str) -> &'static str {
        self.routes
            .get_key_value(tag)
            .map(|(k, _)| *k)
            .unwrap_or("unknown")
    }
}

fn route_accept<S: DocumentStore, B: EventBus>(
    dispatcher: &DriverResponseDispatcher<S, B>,
    data: DriverResponseData,
) -> BoxFuture<'_, Result<Option<OutboxMessage>>> {
    Box::pin(dispatcher.apply_accept(data))
}

fn route_decline<S: DocumentStore, B: EventBus>(
    dispatcher: &DriverResponseDispatcher<S, B>,
    data: DriverResponseData,
) -> BoxFuture<'_, Result<Option<OutboxMessage>>> {
    Box::pin(dispatcher.record_decline(data))
}

fn route_complete<S: DocumentStore, B: EventBus>(
    dispatcher: &DriverResponseDispatcher<S, B>,
    data: DriverResponseData,
) -> BoxFuture<'_, Result<Option<OutboxMessage>>> {
    Box::pin(dispatcher.apply_completion(data))
}

#[async_trait]
impl<S, B> DeliveryHandler for DriverResponseDispatcher<S, B>
where
    S: DocumentStore,
    B: EventBus,
{
    async fn handle(&self, delivery: Delivery) -> HandlerOutcome {
        let start = Instant::now();
        let tag = self.tag_label(&delivery.routing_key);

        let outcome = match tokio::time::timeout(self.handler_timeout, self.dispatch(&delivery)).await
        {
            Ok(Ok(())) => HandlerOutcome::Ack,
            Ok(Err(e)) => self.settle(&delivery.routing_key, &e),
            Err(_) => self.settle(
                &delivery.routing_key,
                &SagaError::Timeout(self.handler_timeout),
            ),
        };

        metrics::counter!(
            "driver_responses_total",
            "tag" => tag,
            "outcome" => outcome.as_str()
        )
        .increment(1);
        metrics::histogram!("driver_response_duration_seconds", "tag" => tag)
            .record(start.elapsed().as_secs_f64());

        outcome
    }
}
