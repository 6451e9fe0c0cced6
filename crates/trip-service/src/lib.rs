//! Trip saga service.
//!
//! Wires the trip store, the broker, the driver-response dispatcher, the
//! payment consumer and the outbox relay together, and serves health and
//! Prometheus metrics over HTTP.

pub mod config;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use document_store::DocumentStore;
use domain::TripService;
use messaging::{DeliveryHandler, EventBus, InMemoryEventBus};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::contracts::{
    DRIVER_CMD_TRIP_ACCEPT, DRIVER_CMD_TRIP_COMPLETE, DRIVER_CMD_TRIP_DECLINE,
    PAYMENT_CMD_CREATE_SESSION,
};
use saga::{DriverResponseDispatcher, OutboxRelay, PaymentProcessor, PaymentSessionConsumer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Trip store shared by the dispatcher and the relay.
pub type SharedStore = Arc<dyn DocumentStore>;

/// State behind the HTTP routes.
pub struct AppState {
    /// Which document store backend is in use.
    pub store_backend: &'static str,
    pub bus: InMemoryEventBus,
}

/// Creates the Axum application router.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Registers descriptions for the metrics the service records.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "driver_responses_total",
        "Driver responses handled, by tag and broker outcome"
    );
    metrics::describe_histogram!(
        "driver_response_duration_seconds",
        "Time spent handling one driver response"
    );
    metrics::describe_counter!(
        "trip_store_conflicts_total",
        "Trip writes rejected by the version guard"
    );
    metrics::describe_counter!(
        "outbox_messages_written_total",
        "Outbox messages committed alongside trip writes"
    );
    metrics::describe_counter!(
        "outbox_relayed_total",
        "Outbox messages published by the relay"
    );
    metrics::describe_counter!(
        "payment_sessions_created_total",
        "Payment sessions opened for completed trips"
    );
}

/// Binds the consumer queues to the routing keys they serve.
pub async fn bind_queues(bus: &InMemoryEventBus, config: &Config) {
    for tag in [
        DRIVER_CMD_TRIP_ACCEPT,
        DRIVER_CMD_TRIP_DECLINE,
        DRIVER_CMD_TRIP_COMPLETE,
    ] {
        bus.bind(&config.driver_response_queue, tag).await;
    }
    bus.bind(&config.payment_queue, PAYMENT_CMD_CREATE_SESSION)
        .await;
}

/// Background consumers and the relay, sharing one shutdown signal.
pub struct Workers {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Starts the driver-response consumer, the payment consumer and the
    /// outbox relay.
    pub fn spawn<P>(config: &Config, store: SharedStore, bus: InMemoryEventBus, processor: P) -> Self
    where
        P: PaymentProcessor + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let service =
            Arc::new(TripService::new(store.clone()).with_max_attempts(config.max_conflict_attempts));
        let dispatcher: Arc<dyn DeliveryHandler> = Arc::new(
            DriverResponseDispatcher::new(service, bus.clone())
                .with_handler_timeout(config.handler_timeout),
        );
        let payments: Arc<dyn DeliveryHandler> = Arc::new(PaymentSessionConsumer::new(processor));
        let relay = OutboxRelay::new(store, bus.clone())
            .with_interval(config.outbox_relay_interval)
            .with_grace_period(config.outbox_grace_period);

        let mut handles = Vec::new();
        for (queue, handler) in [
            (config.driver_response_queue.clone(), dispatcher),
            (config.payment_queue.clone(), payments),
        ] {
            let bus = bus.clone();
            let shutdown_rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = bus.subscribe(&queue, handler, shutdown_rx).await {
                    tracing::error!(queue = %queue, error = %e, "consumer failed");
                }
            }));
        }

        handles.push(tokio::spawn(async move { relay.run(shutdown_rx).await }));

        Self { shutdown, handles }
    }

    /// Signals shutdown and waits for in-flight work to finish.
    pub async fn stop(self) {
        // Receivers may already be gone if every worker exited
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "worker task panicked");
            }
        }
    }
}
