//! Trip commands.

use common::{DriverId, RiderId, TripId};

use crate::command::Command;

use super::{Driver, Fare, Trip};

/// Command to create a new trip in `requested` status.
#[derive(Debug, Clone)]
pub struct CreateTrip {
    pub trip_id: TripId,
    pub rider_id: RiderId,
    pub fare: Fare,
}

impl CreateTrip {
    /// Creates a new CreateTrip command.
    pub fn new(trip_id: TripId, rider_id: RiderId, fare: Fare) -> Self {
        Self {
            trip_id,
            rider_id,
            fare,
        }
    }

    /// Creates a new CreateTrip command with a generated trip ID.
    pub fn for_rider(rider_id: RiderId, fare: Fare) -> Self {
        Self::new(TripId::generate(), rider_id, fare)
    }
}

impl Command for CreateTrip {
    type Aggregate = Trip;

    fn aggregate_id(&self) -> &str {
        self.trip_id.as_str()
    }
}

/// Command to record that a driver declined a trip.
#[derive(Debug, Clone)]
pub struct RecordDecline {
    pub trip_id: TripId,
    pub driver_id: DriverId,
}

impl RecordDecline {
    /// Creates a new RecordDecline command.
    pub fn new(trip_id: TripId, driver_id: DriverId) -> Self {
        Self { trip_id, driver_id }
    }
}

impl Command for RecordDecline {
    type Aggregate = Trip;

    fn aggregate_id(&self) -> &str {
        self.trip_id.as_str()
    }
}

/// Command to apply a driver's acceptance.
#[derive(Debug, Clone)]
pub struct ApplyAccept {
    pub trip_id: TripId,
    pub driver: Driver,
}

impl ApplyAccept {
    /// Creates a new ApplyAccept command.
    pub fn new(trip_id: TripId, driver: Driver) -> Self {
        Self { trip_id, driver }
    }
}

impl Command for ApplyAccept {
    type Aggregate = Trip;

    fn aggregate_id(&self) -> &str {
        self.trip_id.as_str()
    }
}

/// Command to complete an accepted trip.
#[derive(Debug, Clone)]
pub struct ApplyCompletion {
    pub trip_id: TripId,
}

impl ApplyCompletion {
    /// Creates a new ApplyCompletion command.
    pub fn new(trip_id: TripId) -> Self {
        Self { trip_id }
    }
}

impl Command for ApplyCompletion {
    type Aggregate = Trip;

    fn aggregate_id(&self) -> &str {
        self.trip_id.as_str()
    }
}

/// Command to cancel a trip.
#[derive(Debug, Clone)]
pub struct CancelTrip {
    pub trip_id: TripId,
}

impl CancelTrip {
    /// Creates a new CancelTrip command.
    pub fn new(trip_id: TripId) -> Self {
        Self { trip_id }
    }
}

impl Command for CancelTrip {
    type Aggregate = Trip;

    fn aggregate_id(&self) -> &str {
        self.trip_id.as_str()
    }
}
