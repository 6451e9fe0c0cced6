//! Choreographed trip saga.
//!
//! Driver responses arrive on a queue in no particular order, possibly
//! duplicated and possibly racing each other. This crate applies them to
//! trips and emits the event that drives the next step:
//!
//! 1. `driver-decline` records the driver as excluded and asks dispatch to
//!    try someone else (`driver-not-interested`)
//! 2. `driver-accept` assigns the first accepting driver and tells the rider
//!    (`driver-assigned`); later accepts are ignored
//! 3. `driver-complete` finishes the trip and requests a payment session
//!    (`payment-session-requested`)
//!
//! Events are recorded in the trip's outbox in the same write as the state
//! change and published right after it; the [`OutboxRelay`] publishes
//! anything left behind.

pub mod contracts;
pub mod dispatcher;
pub mod error;
pub mod outbound;
pub mod relay;
pub mod services;

pub use contracts::DriverResponseData;
pub use dispatcher::{DEFAULT_HANDLER_TIMEOUT, DriverResponseDispatcher};
pub use error::SagaError;
pub use outbound::{OutboundMessage, channel_for, outbound_for, publish_outbox_message};
pub use relay::OutboxRelay;
pub use services::{
    InMemoryPaymentProcessor, PaymentProcessor, PaymentSession, PaymentSessionConsumer,
    PaymentSessionRequest,
};
