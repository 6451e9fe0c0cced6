//! Shared identifier types used across the trip saga crates.

mod types;

pub use types::{DriverId, RiderId, TripId};
