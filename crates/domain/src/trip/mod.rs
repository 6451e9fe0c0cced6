//! Trip aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::{AcceptOutcome, DeclineOutcome, Trip, TripSnapshot};
pub use commands::*;
pub use events::{DeclinedData, TripEvent};
pub use service::TripService;
pub use state::TripStatus;
pub use value_objects::{Driver, Fare, Money};

use thiserror::Error;

/// Errors that can occur during trip operations.
#[derive(Debug, Error)]
pub enum TripError {
    /// The trip is not in a status that allows the action.
    #[error("Invalid transition: cannot {action} a {current_status} trip")]
    InvalidTransition {
        current_status: TripStatus,
        action: &'static str,
    },
}
