//! Trip state machine.

use serde::{Deserialize, Serialize};

/// The status of a trip in its lifecycle.
///
/// State transitions:
/// ```text
/// Requested ──► Accepted ──► Completed
///     │             │
///     └─────────────┴──► Cancelled
/// ```
///
/// Progression is forward only; no transition returns to an earlier status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    /// Waiting for a driver to accept.
    #[default]
    Requested,

    /// A driver has been assigned.
    Accepted,

    /// The ride has finished (terminal state).
    Completed,

    /// The trip was called off (terminal state).
    Cancelled,
}

impl TripStatus {
    /// Returns true if a driver can be assigned in this status.
    pub fn can_accept(&self) -> bool {
        matches!(self, TripStatus::Requested)
    }

    /// Returns true if the trip can be completed in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, TripStatus::Accepted)
    }

    /// Returns true if the trip can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, TripStatus::Requested | TripStatus::Accepted)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Requested => "requested",
            TripStatus::Accepted => "accepted",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
