//! External service capabilities driven by trip events.

pub mod payment;

pub use payment::{
    DEFAULT_CURRENCY, InMemoryPaymentProcessor, PaymentProcessor, PaymentSession,
    PaymentSessionConsumer, PaymentSessionRequest,
};
