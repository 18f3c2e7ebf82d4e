//! Booking aggregate and its lifecycle.

mod aggregate;
mod commands;
mod events;
mod gateway;
mod service;
mod status;
mod transition;
mod value_objects;

pub use aggregate::{Booking, PromotionApplication};
pub use commands::{RecordPromotion, RegisterBooking, RetractPromotion};
pub use events::{
    BookingEvent, BookingRegisteredData, PromotionAppliedData, PromotionRetractedData,
    StatusChangedData,
};
pub use gateway::{BookingStatusGateway, InMemoryBookingStatusGateway, StatusGatewayError};
pub use service::BookingService;
pub use status::{Actor, BookingStatus, UnknownStatus};
pub use transition::{StatusTransitionEngine, TransitionError, TransitionReceipt};
pub use value_objects::{LicensePlate, Money, SlotKey};

use common::BookingId;
use thiserror::Error;

/// Rules a booking command can break.
#[derive(Debug, Error)]
pub enum BookingRecordError {
    /// The booking stream already holds a registration.
    #[error("Booking {0} is already registered")]
    AlreadyRegistered(BookingId),

    /// No booking has been registered in this stream.
    #[error("Booking is not registered")]
    NotRegistered,

    /// The target status is not reachable from the current one.
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// The booking moved on since the caller read it.
    #[error("Booking status is {actual}, expected {expected}")]
    StatusMismatch {
        expected: BookingStatus,
        actual: BookingStatus,
    },

    /// A discount is already live on this booking.
    #[error("Promotion '{code}' is already applied to this booking")]
    PromotionAlreadyApplied { code: String },

    /// The booking is in a state that accepts no new promotion.
    #[error("Cannot apply a promotion to a {status} booking")]
    PromotionClosed { status: BookingStatus },

    /// There is no live promotion to retract.
    #[error("No promotion is applied to this booking")]
    NoPromotion,

    /// Paid bookings keep their discount.
    #[error("Promotion '{code}' cannot be retracted from a paid booking")]
    PromotionLocked { code: String },
}
