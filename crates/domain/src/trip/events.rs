//! Trip domain events.
//!
//! Each event is recorded in the outbox with the state change that caused
//! it, and carries everything its downstream consumer needs.

use common::{DriverId, TripId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Trip, TripSnapshot};

/// Events that can occur on a trip aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TripEvent {
    /// A driver was assigned to the trip.
    DriverAssigned(TripSnapshot),

    /// A driver declined the trip.
    DriverDeclined(DeclinedData),

    /// The trip was completed and is ready to be paid.
    TripCompleted(TripSnapshot),
}

impl DomainEvent for TripEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TripEvent::DriverAssigned(_) => "DriverAssigned",
            TripEvent::DriverDeclined(_) => "DriverDeclined",
            TripEvent::TripCompleted(_) => "TripCompleted",
        }
    }
}

/// Data for DriverDeclined event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclinedData {
    /// The trip as it stands after the decline.
    pub trip: TripSnapshot,

    /// Every driver who declined so far, in order.
    #[serde(rename = "declinedDriverIDs")]
    pub declined_driver_ids: Vec<DriverId>,
}

impl TripEvent {
    /// Creates a DriverAssigned event from the trip's current state.
    pub fn driver_assigned(trip: &Trip) -> Self {
        TripEvent::DriverAssigned(trip.snapshot())
    }

    /// Creates a DriverDeclined event from the trip's current state.
    pub fn driver_declined(trip: &Trip) -> Self {
        TripEvent::DriverDeclined(DeclinedData {
            trip: trip.snapshot(),
            declined_driver_ids: trip.candidate_driver_ids().to_vec(),
        })
    }

    /// Creates a TripCompleted event from the trip's current state.
    pub fn trip_completed(trip: &Trip) -> Self {
        TripEvent::TripCompleted(trip.snapshot())
    }

    /// Returns the trip the event belongs to.
    pub fn trip_id(&self) -> &TripId {
        match self {
            TripEvent::DriverAssigned(snapshot) | TripEvent::TripCompleted(snapshot) => {
                &snapshot.id
            }
            TripEvent::DriverDeclined(data) => &data.trip.id,
        }
    }
}
