//! Identifier types shared by every crate in the booking core.

pub mod ids;
pub mod types;

pub use ids::{
    BookingId, CenterId, CustomerId, ModelId, ServiceId, TechnicianId, TechnicianSlotId, VehicleId,
};
pub use types::AggregateId;
