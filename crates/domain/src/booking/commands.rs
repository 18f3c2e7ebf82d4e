//! Booking commands.
//!
//! Status changes have no public command: they go through
//! [`StatusTransitionEngine`](super::StatusTransitionEngine).

use common::{AggregateId, BookingId, CustomerId, ServiceId, VehicleId};

use super::{Money, SlotKey};

/// Command to record a booking the backend has created.
#[derive(Debug, Clone)]
pub struct RegisterBooking {
    pub booking_id: BookingId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub slot: SlotKey,
    pub service_id: ServiceId,
    pub notes: Option<String>,
}

impl RegisterBooking {
    pub fn new(
        booking_id: BookingId,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        slot: SlotKey,
        service_id: ServiceId,
    ) -> Self {
        Self {
            booking_id,
            customer_id,
            vehicle_id,
            slot,
            service_id,
            notes: None,
        }
    }

    /// Attaches customer notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn aggregate_id(&self) -> AggregateId {
        AggregateId::for_booking(self.booking_id)
    }
}

/// Command to attach a validated discount to a booking.
#[derive(Debug, Clone)]
pub struct RecordPromotion {
    pub booking_id: BookingId,
    pub code: String,
    pub discount_amount: Money,
    pub final_amount: Money,
}

impl RecordPromotion {
    /// Creates the command. The code is trimmed and uppercased.
    pub fn new(
        booking_id: BookingId,
        code: &str,
        discount_amount: Money,
        final_amount: Money,
    ) -> Self {
        Self {
            booking_id,
            code: code.trim().to_uppercase(),
            discount_amount,
            final_amount,
        }
    }

    pub fn aggregate_id(&self) -> AggregateId {
        AggregateId::for_booking(self.booking_id)
    }
}

/// Command to withdraw a booking's live discount.
#[derive(Debug, Clone)]
pub struct RetractPromotion {
    pub booking_id: BookingId,
    pub reason: String,
}

impl RetractPromotion {
    pub fn new(booking_id: BookingId, reason: impl Into<String>) -> Self {
        Self {
            booking_id,
            reason: reason.into(),
        }
    }

    pub fn aggregate_id(&self) -> AggregateId {
        AggregateId::for_booking(self.booking_id)
    }
}
