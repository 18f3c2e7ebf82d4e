//! Saga error types.

use common::BookingId;
use domain::{DomainError, SlotKey};
use event_store::EventStoreError;
use thiserror::Error;

use crate::state::SagaState;

/// Failures of the remote services and of the saga's own bookkeeping.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Saga is in an invalid state for the requested operation.
    #[error("Invalid saga state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: SagaState },

    /// A remote service call failed.
    #[error("{service} service error: {reason}")]
    Service {
        service: &'static str,
        reason: String,
    },

    /// The slot authority reports a live hold by someone else.
    #[error("Slot {slot} is held by another customer")]
    SlotHeld { slot: SlotKey },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Event store error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Shorthand for a failed remote call.
    pub fn service(service: &'static str, reason: impl Into<String>) -> Self {
        SagaError::Service {
            service,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

/// The customer could not be resolved.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Missing contact fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// Every creation strategy failed. Holds one reason per attempt.
    #[error("Could not resolve customer: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// The vehicle could not be resolved.
#[derive(Debug, Error)]
pub enum VehicleResolutionError {
    #[error("License plate is empty")]
    EmptyPlate,

    /// Lookup found nothing and creation failed.
    #[error("Could not resolve vehicle {plate}: {}", .attempts.join("; "))]
    Exhausted { plate: String, attempts: Vec<String> },
}

/// A promotion could not be applied. Never fatal to a booking.
#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("Promotion code is empty")]
    EmptyCode,

    #[error("A promotion code was given without an order amount")]
    MissingAmount,

    /// The validator refused the code.
    #[error("Promotion '{code}' is not valid: {reason}")]
    Invalid { code: String, reason: String },

    /// The booking already carries a live discount.
    #[error("Booking {booking_id} already has promotion '{existing}'")]
    AlreadyApplied {
        booking_id: BookingId,
        existing: String,
    },

    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),

    /// A remote call failed.
    #[error(transparent)]
    Remote(SagaError),

    /// The local record refused the application.
    #[error("Could not record promotion: {0}")]
    Record(DomainError),
}

/// Slot hold failures.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Someone else holds the slot ("đang được giữ bởi người khác").
    #[error("Slot {slot} is being held by someone else")]
    Conflict { slot: SlotKey },

    #[error("Holder token is empty")]
    EmptyHolder,

    #[error("Slot authority error: {0}")]
    Authority(SagaError),
}

/// Categorized outcome of a failed booking saga.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The request is incomplete. Lists every missing field.
    #[error("Booking request is missing: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    VehicleResolution(#[from] VehicleResolutionError),

    /// Retryable: pick another slot or try again later.
    #[error("Slot {slot} is being held by someone else, pick another slot or retry later")]
    SlotConflict { slot: SlotKey },

    /// The slot could not be held for a reason other than a conflict.
    #[error("Could not hold slot: {0}")]
    Reservation(ReservationError),

    /// Creation failed after the hold; the hold has been released.
    #[error("Booking creation failed: {reason}")]
    BookingCreation { reason: String },

    /// The saga could not record its own progress.
    #[error("Saga bookkeeping failed: {0}")]
    Saga(#[from] SagaError),
}

impl From<ReservationError> for BookingError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::Conflict { slot } => BookingError::SlotConflict { slot },
            other => BookingError::Reservation(other),
        }
    }
}

impl BookingError {
    /// Stable category name, used for metrics labels and API error codes.
    pub fn category(&self) -> &'static str {
        match self {
            BookingError::Validation { .. } => "validation",
            BookingError::Identity(_) => "identity",
            BookingError::VehicleResolution(_) => "vehicle_resolution",
            BookingError::SlotConflict { .. } => "slot_conflict",
            BookingError::Reservation(_) => "reservation",
            BookingError::BookingCreation { .. } => "booking_creation",
            BookingError::Saga(_) => "saga",
        }
    }

    /// True if the user can recover by choosing another slot or retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::SlotConflict { .. })
    }
}

impl From<EventStoreError> for BookingError {
    fn from(e: EventStoreError) -> Self {
        BookingError::Saga(SagaError::EventStore(e))
    }
}
