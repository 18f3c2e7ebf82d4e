//! Remote service traits and in-memory implementations for the booking flow.

pub mod booking;
pub mod customer;
pub mod promotion;
pub mod slot;
pub mod vehicle;

pub use booking::{BookingGateway, BookingPayload, InMemoryBookingGateway, ResponseShape};
pub use customer::{Customer, CustomerDirectory, CustomerProfile, InMemoryCustomerDirectory};
pub use promotion::{InMemoryPromotionGateway, PromotionGateway, PromotionQuote};
pub use slot::{InMemorySlotAuthority, SlotAuthority};
pub use vehicle::{InMemoryVehicleRegistry, NewVehicle, Vehicle, VehicleRegistry};
