//! Booking domain events.

use chrono::{DateTime, Utc};
use common::{BookingId, CustomerId, ServiceId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Actor, BookingStatus, Money, SlotKey};

/// Events that can occur on a booking aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// The backend accepted the booking and assigned it an id.
    BookingRegistered(BookingRegisteredData),

    /// The booking moved to a new lifecycle status.
    StatusChanged(StatusChangedData),

    /// A discount code was attached to the booking.
    PromotionApplied(PromotionAppliedData),

    /// A previously attached discount was withdrawn.
    PromotionRetracted(PromotionRetractedData),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingRegistered(_) => "BookingRegistered",
            BookingEvent::StatusChanged(_) => "StatusChanged",
            BookingEvent::PromotionApplied(_) => "PromotionApplied",
            BookingEvent::PromotionRetracted(_) => "PromotionRetracted",
        }
    }
}

/// Data for BookingRegistered event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRegisteredData {
    pub booking_id: BookingId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub slot: SlotKey,
    pub service_id: ServiceId,

    /// Free-text notes from the customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Data for StatusChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: Actor,
    pub changed_at: DateTime<Utc>,
}

/// Data for PromotionApplied event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionAppliedData {
    /// Normalized promotion code.
    pub code: String,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub applied_at: DateTime<Utc>,
}

/// Data for PromotionRetracted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRetractedData {
    pub code: String,

    /// Why the discount was withdrawn.
    pub reason: String,
    pub retracted_at: DateTime<Utc>,
}

// Convenience constructors
impl BookingEvent {
    pub fn booking_registered(
        booking_id: BookingId,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        slot: SlotKey,
        service_id: ServiceId,
        notes: Option<String>,
    ) -> Self {
        BookingEvent::BookingRegistered(BookingRegisteredData {
            booking_id,
            customer_id,
            vehicle_id,
            slot,
            service_id,
            notes,
            created_at: Utc::now(),
        })
    }

    pub fn status_changed(from: BookingStatus, to: BookingStatus, actor: Actor) -> Self {
        BookingEvent::StatusChanged(StatusChangedData {
            from,
            to,
            actor,
            changed_at: Utc::now(),
        })
    }

    pub fn promotion_applied(
        code: impl Into<String>,
        discount_amount: Money,
        final_amount: Money,
    ) -> Self {
        BookingEvent::PromotionApplied(PromotionAppliedData {
            code: code.into(),
            discount_amount,
            final_amount,
            applied_at: Utc::now(),
        })
    }

    pub fn promotion_retracted(code: impl Into<String>, reason: impl Into<String>) -> Self {
        BookingEvent::PromotionRetracted(PromotionRetractedData {
            code: code.into(),
            reason: reason.into(),
            retracted_at: Utc::now(),
        })
    }
}
