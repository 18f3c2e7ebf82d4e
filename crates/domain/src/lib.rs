//! Domain layer of the booking core.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler for load → decide → append with optimistic concurrency
//! - The Booking aggregate and its declarative status transition table
//! - StatusTransitionEngine, the only component allowed to change a booking's status

pub mod aggregate;
pub mod booking;
pub mod command;
pub mod error;

pub use aggregate::{Aggregate, DomainEvent};
pub use booking::{
    Actor, Booking, BookingEvent, BookingRecordError, BookingService, BookingStatus,
    BookingStatusGateway, InMemoryBookingStatusGateway, LicensePlate, Money,
    PromotionApplication, RecordPromotion, RegisterBooking, RetractPromotion, SlotKey,
    StatusGatewayError, StatusTransitionEngine, TransitionError, TransitionReceipt,
};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
