//! Booking wizard submission: identity, vehicle, then the saga.

use chrono::NaiveDate;
use common::{CenterId, ServiceId, TechnicianId, TechnicianSlotId};
use domain::Money;
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::coordinator::{BookingOutcome, BookingSagaCoordinator};
use crate::error::BookingError;
use crate::identity::{CustomerMode, IdentityResolver};
use crate::request::BookingRequest;
use crate::services::{
    BookingGateway, CustomerDirectory, PromotionGateway, SlotAuthority, VehicleRegistry,
};
use crate::vehicle::{VehicleHints, VehicleResolver};

/// What the booking wizard collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSubmission {
    pub customer: CustomerMode,
    /// Identifies one checkout attempt. Resubmitting with the same token
    /// reuses the customer resolved the first time and the same slot hold.
    #[serde(default)]
    pub session_token: Option<String>,
    pub license_plate: String,
    #[serde(default)]
    pub vehicle: VehicleHints,
    pub center_id: Option<CenterId>,
    pub technician_id: Option<TechnicianId>,
    pub technician_slot_id: Option<TechnicianSlotId>,
    pub date: Option<NaiveDate>,
    pub service_id: Option<ServiceId>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub promotion_code: Option<String>,
    #[serde(default)]
    pub order_amount: Option<Money>,
}

/// Runs a wizard submission end to end.
pub struct BookingCheckout<D, R, S, A, B, P>
where
    D: CustomerDirectory,
    R: VehicleRegistry,
    S: EventStore,
    A: SlotAuthority,
    B: BookingGateway,
    P: PromotionGateway,
{
    identity: IdentityResolver<D>,
    vehicles: VehicleResolver<R>,
    coordinator: BookingSagaCoordinator<S, A, B, P>,
}

impl<D, R, S, A, B, P> BookingCheckout<D, R, S, A, B, P>
where
    D: CustomerDirectory,
    R: VehicleRegistry,
    S: EventStore + Clone,
    A: SlotAuthority,
    B: BookingGateway,
    P: PromotionGateway,
{
    pub fn new(
        identity: IdentityResolver<D>,
        vehicles: VehicleResolver<R>,
        coordinator: BookingSagaCoordinator<S, A, B, P>,
    ) -> Self {
        Self {
            identity,
            vehicles,
            coordinator,
        }
    }

    pub fn identity(&self) -> &IdentityResolver<D> {
        &self.identity
    }

    pub fn vehicles(&self) -> &VehicleResolver<R> {
        &self.vehicles
    }

    pub fn coordinator(&self) -> &BookingSagaCoordinator<S, A, B, P> {
        &self.coordinator
    }

    /// Resolves the customer and the vehicle, then creates the booking.
    ///
    /// Identity and vehicle failures stop the submission before any slot is
    /// held, so they need no compensation.
    #[tracing::instrument(skip_all)]
    pub async fn submit(
        &self,
        submission: CheckoutSubmission,
    ) -> Result<BookingOutcome, BookingError> {
        let session_token = submission.session_token.as_deref();

        let customer_id = self
            .identity
            .resolve_customer(&submission.customer, session_token)
            .await?;

        let vehicle_id = self
            .vehicles
            .resolve_vehicle(customer_id, &submission.license_plate, &submission.vehicle)
            .await?;

        let mut builder = BookingRequest::builder()
            .customer_id(customer_id)
            .vehicle_id(vehicle_id);
        if let Some(center_id) = submission.center_id {
            builder = builder.center_id(center_id);
        }
        if let Some(technician_id) = submission.technician_id {
            builder = builder.technician_id(technician_id);
        }
        if let Some(technician_slot_id) = submission.technician_slot_id {
            builder = builder.technician_slot_id(technician_slot_id);
        }
        if let Some(date) = submission.date {
            builder = builder.date(date);
        }
        if let Some(service_id) = submission.service_id {
            builder = builder.service_id(service_id);
        }
        if let Some(notes) = submission.notes {
            builder = builder.notes(notes);
        }
        if let Some(code) = submission.promotion_code {
            builder = builder.promotion_code(code);
        }
        if let Some(amount) = submission.order_amount {
            builder = builder.order_amount(amount);
        }
        if let Some(token) = session_token {
            builder = builder.holder_token(token);
        }

        self.coordinator.create_booking(builder.build()).await
    }
}
