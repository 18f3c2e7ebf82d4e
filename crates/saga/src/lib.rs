//! Booking creation saga.
//!
//! This crate orchestrates the steps that turn a booking wizard submission
//! into a booking:
//! 1. Resolve the customer (signed-in account or guest)
//! 2. Resolve the vehicle by license plate
//! 3. Hold the slot
//! 4. Create the booking, releasing the hold if that fails
//! 5. Apply the promotion code, if any, without ever undoing the booking
//!
//! Remote capabilities are traits in [`services`], each with an in-memory
//! implementation.

pub mod aggregate;
pub mod booking_flow;
pub mod checkout;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod identity;
pub mod promotion;
pub mod request;
pub mod reservation;
pub mod services;
pub mod state;
pub mod vehicle;

pub use aggregate::BookingSaga;
pub use checkout::{BookingCheckout, CheckoutSubmission};
pub use coordinator::{BookingOutcome, BookingSagaCoordinator, parse_booking_id};
pub use error::{
    BookingError, IdentityError, PromotionError, ReservationError, SagaError,
    VehicleResolutionError,
};
pub use events::SagaEvent;
pub use identity::{CustomerMode, GuestContact, IdentityResolver, LoginContext};
pub use promotion::{PromotionApplier, PromotionOutcome};
pub use request::{BookingRequest, BookingRequestBuilder, ValidatedBooking};
pub use reservation::{HoldStatus, HoldToken, SlotReservationManager};
pub use services::{
    BookingGateway, BookingPayload, CustomerDirectory, CustomerProfile, InMemoryBookingGateway,
    InMemoryCustomerDirectory, InMemoryPromotionGateway, InMemorySlotAuthority,
    InMemoryVehicleRegistry, PromotionGateway, PromotionQuote, ResponseShape, SlotAuthority,
    VehicleRegistry,
};
pub use state::SagaState;
pub use vehicle::{VehicleHints, VehicleResolver};
