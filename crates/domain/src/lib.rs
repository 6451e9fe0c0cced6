//! Domain layer for the trip saga.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for document-backed entities
//! - DomainEvent trait for events recorded in the outbox
//! - CommandHandler for guarded read-modify-write cycles
//! - Trip aggregate with its state machine and orchestration service

pub mod aggregate;
pub mod command;
pub mod error;
pub mod trip;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult, DEFAULT_MAX_ATTEMPTS, Decision};
pub use error::DomainError;
pub use trip::{
    AcceptOutcome, ApplyAccept, ApplyCompletion, CancelTrip, CreateTrip, DeclineOutcome,
    DeclinedData, Driver, Fare, Money, RecordDecline, Trip, TripError, TripEvent, TripService,
    TripSnapshot, TripStatus,
};
