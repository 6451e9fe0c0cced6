//! Event bus port for the trip saga.
//!
//! Services publish [`Envelope`]s to named channels and consume
//! [`Delivery`]s from named queues through a [`DeliveryHandler`]. The
//! handler's [`HandlerOutcome`] tells the broker whether to drop, retry or
//! dead-letter the message.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod memory;

pub use bus::{DeliveryHandler, EventBus, HandlerOutcome};
pub use envelope::{Delivery, Envelope};
pub use error::{BusError, Result};
pub use memory::{DeadLetter, InMemoryEventBus, PublishedMessage};
