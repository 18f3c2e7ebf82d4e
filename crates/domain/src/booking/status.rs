//! Booking status lifecycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of a booking.
///
/// ```text
/// Pending ──► Confirmed ──► InProgress ──► Completed ──► Paid
///    │            │             │
///    └────────────┴─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created by the booking saga, waiting for the center to confirm.
    #[default]
    Pending,
    Confirmed,
    /// A technician is working on the vehicle.
    InProgress,
    /// Work finished, awaiting payment.
    Completed,
    /// Terminal.
    Paid,
    /// Terminal.
    Cancelled,
}

/// Every legal move, keyed by source status.
///
/// This table is the only place the lifecycle is defined. Every code path that
/// changes a status consults it through [`BookingStatus::can_transition_to`].
const TRANSITIONS: &[(BookingStatus, &[BookingStatus])] = &[
    (
        BookingStatus::Pending,
        &[BookingStatus::Confirmed, BookingStatus::Cancelled],
    ),
    (
        BookingStatus::Confirmed,
        &[BookingStatus::InProgress, BookingStatus::Cancelled],
    ),
    (
        BookingStatus::InProgress,
        &[BookingStatus::Completed, BookingStatus::Cancelled],
    ),
    (BookingStatus::Completed, &[BookingStatus::Paid]),
    (BookingStatus::Paid, &[]),
    (BookingStatus::Cancelled, &[]),
];

impl BookingStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Paid,
        BookingStatus::Cancelled,
    ];

    /// Returns the statuses reachable in one step.
    pub fn allowed_targets(&self) -> &'static [BookingStatus] {
        TRANSITIONS
            .iter()
            .find(|(source, _)| source == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    /// Returns true if `target` is reachable in one step.
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Returns true if the booking can be cancelled from this status.
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(BookingStatus::Cancelled)
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Paid => "PAID",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when parsing a status name that is not in the lifecycle.
#[derive(Debug, Clone, Error)]
#[error("Unknown booking status '{0}'")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Who asked for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Technician,
    Admin,
    PaymentCallback,
    #[default]
    System,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Customer => "customer",
            Actor::Technician => "technician",
            Actor::Admin => "admin",
            Actor::PaymentCallback => "payment_callback",
            Actor::System => "system",
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
