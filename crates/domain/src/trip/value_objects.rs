//! Value objects for the trip domain.

use common::DriverId;
use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
///
/// Serialized as a bare integer number of cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

/// The fare quote a trip was requested with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fare {
    /// Identifier of the quote.
    pub id: String,

    /// The ride package the quote was computed for (e.g. "sedan").
    pub package_slug: String,

    /// Total price of the ride.
    #[serde(rename = "totalPriceInCents")]
    pub total_price: Money,
}

impl Fare {
    /// Creates a new fare quote.
    pub fn new(id: impl Into<String>, package_slug: impl Into<String>, total_price: Money) -> Self {
        Self {
            id: id.into(),
            package_slug: package_slug.into(),
            total_price,
        }
    }
}

/// A driver as described in driver responses and trip snapshots.
///
/// Only `id` is required on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub car_plate: String,
    #[serde(default)]
    pub package_slug: String,
}

impl Driver {
    /// Creates a driver known only by its identifier.
    pub fn new(id: impl Into<DriverId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            profile_picture: String::new(),
            car_plate: String::new(),
            package_slug: String::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the licence plate.
    pub fn with_car_plate(mut self, car_plate: impl Into<String>) -> Self {
        self.car_plate = car_plate.into();
        self
    }

    /// Sets the package the driver serves.
    pub fn with_package(mut self, package_slug: impl Into<String>) -> Self {
        self.package_slug = package_slug.into();
        self
    }
}
