//! Payment processor trait, in-memory implementation, and the queue consumer
//! that turns completed trips into payment sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DriverId, RiderId, TripId};
use domain::{Money, TripSnapshot, TripStatus};
use messaging::{Delivery, DeliveryHandler, HandlerOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};

/// Currency every fare is charged in.
pub const DEFAULT_CURRENCY: &str = "usd";

/// What the processor is asked to charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSessionRequest {
    pub trip_id: TripId,
    pub rider_id: RiderId,
    pub driver_id: Option<DriverId>,
    pub amount: Money,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

impl PaymentSessionRequest {
    /// Builds a request for a completed trip.
    pub fn for_trip(trip: &TripSnapshot, currency: impl Into<String>) -> Result<Self> {
        if trip.status != TripStatus::Completed {
            return Err(SagaError::InvalidPaymentRequest(format!(
                "trip {} is {}, expected completed",
                trip.id, trip.status
            )));
        }
        if !trip.fare.total_price.is_positive() {
            return Err(SagaError::InvalidPaymentRequest(format!(
                "trip {} has no fare to charge",
                trip.id
            )));
        }

        let driver_id = trip.assigned_driver.as_ref().map(|d| d.id.clone());

        let mut metadata = HashMap::new();
        metadata.insert("trip_id".to_string(), trip.id.to_string());
        metadata.insert("rider_id".to_string(), trip.rider_id.to_string());
        if let Some(ref driver_id) = driver_id {
            metadata.insert("driver_id".to_string(), driver_id.to_string());
        }

        Ok(Self {
            trip_id: trip.id.clone(),
            rider_id: trip.rider_id.clone(),
            driver_id,
            amount: trip.fare.total_price,
            currency: currency.into(),
            metadata,
        })
    }
}

/// A checkout session opened with a processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// The session ID assigned by the processor.
    pub session_id: String,
    pub trip_id: TripId,
    pub amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// A payment processor backend.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Opens a checkout session. Repeating a request for the same trip must
    /// return the session opened the first time.
    async fn create_payment_session(&self, request: &PaymentSessionRequest)
    -> Result<PaymentSession>;
}

#[async_trait]
impl<T: PaymentProcessor + ?Sized> PaymentProcessor for Arc<T> {
    async fn create_payment_session(
        &self,
        request: &PaymentSessionRequest,
    ) -> Result<PaymentSession> {
        (**self).create_payment_session(request).await
    }
}

#[derive(Debug, Default)]
struct InMemoryProcessorState {
    sessions: HashMap<TripId, PaymentSession>,
    next_id: u32,
    fail: bool,
}

/// In-memory payment processor for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryProcessorState>>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new in-memory processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent session requests fail (or succeed again).
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    /// Returns the number of sessions opened.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Returns the session opened for a trip, if any.
    pub async fn session_for(&self, trip_id: &TripId) -> Option<PaymentSession> {
        self.state.read().await.sessions.get(trip_id).cloned()
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn create_payment_session(
        &self,
        request: &PaymentSessionRequest,
    ) -> Result<PaymentSession> {
        let mut state = self.state.write().await;

        if state.fail {
            return Err(SagaError::Payment("processor unavailable".to_string()));
        }

        if let Some(existing) = state.sessions.get(&request.trip_id) {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let session = PaymentSession {
            session_id: format!("SESS-{:04}", state.next_id),
            trip_id: request.trip_id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            created_at: Utc::now(),
        };
        state
            .sessions
            .insert(request.trip_id.clone(), session.clone());

        Ok(session)
    }
}

/// Consumes payment-session requests and opens sessions with a processor.
pub struct PaymentSessionConsumer<P: PaymentProcessor> {
    processor: P,
    currency: String,
}

impl<P: PaymentProcessor> PaymentSessionConsumer<P> {
    /// Creates a consumer charging in the default currency.
    pub fn new(processor: P) -> Self {
        Self {
            processor,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Sets the currency sessions are opened in.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Opens a session for one delivered trip snapshot.
    pub async fn process(&self, delivery: &Delivery) -> Result<PaymentSession> {
        let envelope = delivery.envelope()?;
        let trip: TripSnapshot = envelope.decode_data()?;
        let request = PaymentSessionRequest::for_trip(&trip, self.currency.as_str())?;

        let session = self.processor.create_payment_session(&request).await?;
        tracing::info!(
            trip_id = %trip.id,
            session_id = %session.session_id,
            amount = %session.amount,
            "payment session created"
        );
        Ok(session)
    }
}

#[async_trait]
impl<P: PaymentProcessor> DeliveryHandler for PaymentSessionConsumer<P> {
    async fn handle(&self, delivery: Delivery) -> HandlerOutcome {
        match self.process(&delivery).await {
            Ok(_) => {
                metrics::counter!("payment_sessions_created_total").increment(1);
                HandlerOutcome::Ack
            }
            Err(e) => {
                let outcome = e.disposition();
                tracing::warn!(
                    routing_key = %delivery.routing_key,
                    error = %e,
                    outcome = outcome.as_str(),
                    "payment session request failed"
                );
                outcome
            }
        }
    }
}
