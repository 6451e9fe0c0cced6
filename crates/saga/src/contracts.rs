//! Wire contracts shared with the driver and payment services.

use common::{RiderId, TripId};
use domain::Driver;
use messaging::{Delivery, Envelope};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};

/// A driver accepted a trip offer.
pub const DRIVER_CMD_TRIP_ACCEPT: &str = "driver-accept";

/// A driver declined a trip offer.
pub const DRIVER_CMD_TRIP_DECLINE: &str = "driver-decline";

/// A driver finished a trip.
pub const DRIVER_CMD_TRIP_COMPLETE: &str = "driver-complete";

/// Tells the rider a driver is on the way.
pub const TRIP_EVENT_DRIVER_ASSIGNED: &str = "driver-assigned";

/// Asks dispatch to offer the trip to someone not yet excluded.
pub const TRIP_EVENT_DRIVER_NOT_INTERESTED: &str = "driver-not-interested";

/// Asks the payment service to open a checkout session.
pub const PAYMENT_CMD_CREATE_SESSION: &str = "payment-session-requested";

/// Inbound queue carrying driver responses.
pub const DRIVER_TRIP_RESPONSE_QUEUE: &str = "driver-trip-response";

/// Queue the payment consumer reads session requests from.
pub const PAYMENT_TRIP_RESPONSE_QUEUE: &str = "payment-trip-response";

/// Payload of every driver response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverResponseData {
    #[serde(rename = "tripID")]
    pub trip_id: TripId,

    #[serde(rename = "riderID")]
    pub rider_id: RiderId,

    /// Absent on some completions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
}

impl DriverResponseData {
    /// Creates a response payload.
    pub fn new(trip_id: TripId, rider_id: RiderId, driver: Option<Driver>) -> Self {
        Self {
            trip_id,
            rider_id,
            driver,
        }
    }

    /// Takes the driver, failing if the message did not carry one.
    pub fn require_driver(&mut self, tag: &'static str) -> Result<Driver> {
        self.driver.take().ok_or(SagaError::MissingDriver { tag })
    }

    /// Wraps the payload in an envelope owned by the rider, ready to deliver
    /// under `tag`.
    pub fn to_delivery(&self, tag: &str) -> Result<Delivery> {
        let envelope = Envelope::from_payload(self.rider_id.as_str(), self)?;
        Ok(Delivery::from_envelope(tag, &envelope)?)
    }
}
