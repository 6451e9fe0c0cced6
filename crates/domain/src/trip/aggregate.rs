//! Trip aggregate implementation.

use common::{DriverId, RiderId, TripId};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{Driver, Fare, TripError, TripEvent, TripStatus};

/// Trip aggregate root.
///
/// One ride request from creation to completion or cancellation. The
/// serialized form is the persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    id: TripId,

    #[serde(rename = "riderID")]
    rider_id: RiderId,

    status: TripStatus,

    fare: Fare,

    /// Set at most once, by the first accept.
    #[serde(rename = "assignedDriver")]
    assigned_driver: Option<Driver>,

    /// Drivers who declined, in order. Append-only, no duplicates.
    #[serde(rename = "candidateDriverIDs", default)]
    candidate_driver_ids: Vec<DriverId>,
}

/// The outbound projection of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub id: TripId,
    #[serde(rename = "riderID")]
    pub rider_id: RiderId,
    pub status: TripStatus,
    pub fare: Fare,
    #[serde(rename = "assignedDriver")]
    pub assigned_driver: Option<Driver>,
}

/// Result of applying an accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The driver was assigned by this call.
    Assigned,

    /// A driver was already assigned; nothing changed.
    AlreadyAssigned,
}

/// Result of recording a decline, with the resulting exclusion list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineOutcome {
    /// The driver was appended to the list.
    Recorded(Vec<DriverId>),

    /// The driver had already declined; nothing changed.
    AlreadyDeclined(Vec<DriverId>),
}

impl DeclineOutcome {
    /// Returns true if the list changed.
    pub fn is_recorded(&self) -> bool {
        matches!(self, DeclineOutcome::Recorded(_))
    }

    /// Returns the exclusion list after the decline.
    pub fn declined_driver_ids(&self) -> &[DriverId] {
        match self {
            DeclineOutcome::Recorded(ids) | DeclineOutcome::AlreadyDeclined(ids) => ids,
        }
    }
}

impl Aggregate for Trip {
    type Event = TripEvent;
    type Error = TripError;

    fn aggregate_type() -> &'static str {
        "trips"
    }

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

// Query methods
impl Trip {
    /// Creates a trip waiting for a driver.
    pub fn request(id: TripId, rider_id: RiderId, fare: Fare) -> Self {
        Self {
            id,
            rider_id,
            status: TripStatus::Requested,
            fare,
            assigned_driver: None,
            candidate_driver_ids: Vec::new(),
        }
    }

    /// Returns the trip ID.
    pub fn trip_id(&self) -> &TripId {
        &self.id
    }

    /// Returns the rider ID.
    pub fn rider_id(&self) -> &RiderId {
        &self.rider_id
    }

    /// Returns the current status.
    pub fn status(&self) -> TripStatus {
        self.status
    }

    /// Returns the fare quote.
    pub fn fare(&self) -> &Fare {
        &self.fare
    }

    /// Returns the assigned driver, if any.
    pub fn assigned_driver(&self) -> Option<&Driver> {
        self.assigned_driver.as_ref()
    }

    /// Returns the drivers who declined this trip, in order.
    pub fn candidate_driver_ids(&self) -> &[DriverId] {
        &self.candidate_driver_ids
    }

    /// Returns true if the driver already declined this trip.
    pub fn has_declined(&self, driver_id: &DriverId) -> bool {
        self.candidate_driver_ids.contains(driver_id)
    }

    /// Returns true if the trip is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Projects the trip for outbound events.
    pub fn snapshot(&self) -> TripSnapshot {
        TripSnapshot {
            id: self.id.clone(),
            rider_id: self.rider_id.clone(),
            status: self.status,
            fare: self.fare.clone(),
            assigned_driver: self.assigned_driver.clone(),
        }
    }
}

// Command methods
impl Trip {
    /// Assigns a driver if none is assigned yet.
    ///
    /// Once any driver holds the trip, further accepts are ignored. A
    /// cancelled trip that never had a driver rejects the accept.
    pub fn accept(&mut self, driver: Driver) -> Result<AcceptOutcome, TripError> {
        if self.assigned_driver.is_some() {
            return Ok(AcceptOutcome::AlreadyAssigned);
        }

        if !self.status.can_accept() {
            return Err(TripError::InvalidTransition {
                current_status: self.status,
                action: "accept",
            });
        }

        self.assigned_driver = Some(driver);
        self.status = TripStatus::Accepted;
        Ok(AcceptOutcome::Assigned)
    }

    /// Adds a driver to the exclusion list unless it is already there.
    ///
    /// The status is never changed.
    pub fn decline(&mut self, driver_id: DriverId) -> DeclineOutcome {
        if self.has_declined(&driver_id) {
            return DeclineOutcome::AlreadyDeclined(self.candidate_driver_ids.clone());
        }

        self.candidate_driver_ids.push(driver_id);
        DeclineOutcome::Recorded(self.candidate_driver_ids.clone())
    }

    /// Finishes an accepted trip.
    pub fn complete(&mut self) -> Result<(), TripError> {
        if !self.status.can_complete() || self.assigned_driver.is_none() {
            return Err(TripError::InvalidTransition {
                current_status: self.status,
                action: "complete",
            });
        }

        self.status = TripStatus::Completed;
        Ok(())
    }

    /// Cancels a trip that has not finished.
    ///
    /// An assigned driver stays on record.
    pub fn cancel(&mut self) -> Result<(), TripError> {
        if !self.status.can_cancel() {
            return Err(TripError::InvalidTransition {
                current_status: self.status,
                action: "cancel",
            });
        }

        self.status = TripStatus::Cancelled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::Money;

    fn requested_trip() -> Trip {
        Trip::request(
            TripId::new("T1"),
            RiderId::new("R1"),
            Fare::new("F1", "sedan", Money::from_cents(2500)),
        )
    }

    fn accepted_trip() -> Trip {
        let mut trip = requested_trip();
        trip.accept(Driver::new("D1")).unwrap();
        trip
    }

    #[test]
    fn request_starts_without_driver() {
        let trip = requested_trip();
        assert_eq!(trip.status(), TripStatus::Requested);
        assert!(trip.assigned_driver().is_none());
        assert!(trip.candidate_driver_ids().is_empty());
        assert_eq!(Trip::aggregate_type(), "trips");
        assert_eq!(trip.id(), "T1");
    }

    #[test]
    fn first_accept_wins() {
        let mut trip = requested_trip();

        assert_eq!(
            trip.accept(Driver::new("A")).unwrap(),
            AcceptOutcome::Assigned
        );
        assert_eq!(
            trip.accept(Driver::new("B")).unwrap(),
            AcceptOutcome::AlreadyAssigned
        );

        assert_eq!(trip.status(), TripStatus::Accepted);
        assert_eq!(trip.assigned_driver().unwrap().id.as_str(), "A");
    }

    #[test]
    fn accept_after_completion_is_ignored() {
        let mut trip = accepted_trip();
        trip.complete().unwrap();

        assert_eq!(
            trip.accept(Driver::new("D9")).unwrap(),
            AcceptOutcome::AlreadyAssigned
        );
        assert_eq!(trip.status(), TripStatus::Completed);
        assert_eq!(trip.assigned_driver().unwrap().id.as_str(), "D1");
    }

    #[test]
    fn accept_on_cancelled_trip_without_driver_fails() {
        let mut trip = requested_trip();
        trip.cancel().unwrap();

        let err = trip.accept(Driver::new("D1")).unwrap_err();
        assert!(matches!(
            err,
            TripError::InvalidTransition {
                current_status: TripStatus::Cancelled,
                action: "accept"
            }
        ));
        assert!(trip.assigned_driver().is_none());
    }

    #[test]
    fn decline_accumulates_without_duplicates() {
        let mut trip = requested_trip();

        let first = trip.decline(DriverId::new("D1"));
        assert!(first.is_recorded());
        let second = trip.decline(DriverId::new("D2"));
        assert_eq!(
            second.declined_driver_ids(),
            &[DriverId::new("D1"), DriverId::new("D2")]
        );

        let repeat = trip.decline(DriverId::new("D1"));
        assert!(!repeat.is_recorded());
        assert_eq!(
            trip.candidate_driver_ids(),
            &[DriverId::new("D1"), DriverId::new("D2")]
        );
        assert_eq!(trip.status(), TripStatus::Requested);
    }

    #[test]
    fn complete_requires_accepted() {
        let mut trip = requested_trip();
        assert!(trip.complete().is_err());

        let mut trip = accepted_trip();
        trip.complete().unwrap();
        assert_eq!(trip.status(), TripStatus::Completed);
        assert!(trip.assigned_driver().is_some());

        let err = trip.complete().unwrap_err();
        assert!(matches!(
            err,
            TripError::InvalidTransition {
                current_status: TripStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn cancel_keeps_assigned_driver() {
        let mut trip = accepted_trip();
        trip.cancel().unwrap();

        assert_eq!(trip.status(), TripStatus::Cancelled);
        assert_eq!(trip.assigned_driver().unwrap().id.as_str(), "D1");
        assert!(trip.cancel().is_err());
        assert!(trip.complete().is_err());
    }

    #[test]
    fn persisted_record_shape() {
        let mut trip = accepted_trip();
        trip.decline(DriverId::new("D0"));

        let json = serde_json::to_value(&trip).unwrap();
        assert_eq!(json["id"], "T1");
        assert_eq!(json["riderID"], "R1");
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["fare"]["totalPriceInCents"], 2500);
        assert_eq!(json["assignedDriver"]["id"], "D1");
        assert_eq!(json["candidateDriverIDs"], serde_json::json!(["D0"]));

        let restored: Trip = serde_json::from_value(json).unwrap();
        assert_eq!(restored, trip);
    }

    #[test]
    fn snapshot_omits_candidate_list() {
        let mut trip = requested_trip();
        trip.decline(DriverId::new("D0"));

        let json = serde_json::to_value(trip.snapshot()).unwrap();
        assert_eq!(json["status"], "requested");
        assert!(json["assignedDriver"].is_null());
        assert!(json.get("candidateDriverIDs").is_none());
    }
}
