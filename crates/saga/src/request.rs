//! Booking request value and its builder.

use chrono::NaiveDate;
use common::{CenterId, CustomerId, ServiceId, TechnicianId, TechnicianSlotId, VehicleId};
use domain::{Money, SlotKey};
use serde::{Deserialize, Serialize};

use crate::error::BookingError;

/// Everything the saga needs, collected once and never changed.
///
/// Built with [`BookingRequest::builder`]; the required fields are only
/// checked by [`validate`](BookingRequest::validate) so that one call can
/// report every missing field at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    customer_id: Option<CustomerId>,
    vehicle_id: Option<VehicleId>,
    center_id: Option<CenterId>,
    technician_id: Option<TechnicianId>,
    technician_slot_id: Option<TechnicianSlotId>,
    date: Option<NaiveDate>,
    service_id: Option<ServiceId>,
    notes: Option<String>,
    promotion_code: Option<String>,
    order_amount: Option<Money>,
    holder_token: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub slot: SlotKey,
    pub service_id: ServiceId,
    pub notes: Option<String>,
    pub promotion_code: Option<String>,
    pub order_amount: Option<Money>,
    pub holder: String,
}

impl BookingRequest {
    pub fn builder() -> BookingRequestBuilder {
        BookingRequestBuilder::default()
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn promotion_code(&self) -> Option<&str> {
        self.promotion_code.as_deref()
    }

    /// Checks the required fields, naming every one that is missing.
    pub fn validate(&self) -> Result<ValidatedBooking, BookingError> {
        let mut missing = Vec::new();
        macro_rules! require {
            ($field:ident, $name:literal) => {{
                if self.$field.is_none() {
                    missing.push($name);
                }
                self.$field
            }};
        }

        let customer_id = require!(customer_id, "customerId");
        let vehicle_id = require!(vehicle_id, "vehicleId");
        let center_id = require!(center_id, "centerId");
        let technician_id = require!(technician_id, "technicianId");
        let technician_slot_id = require!(technician_slot_id, "technicianSlotId");
        let date = require!(date, "date");
        let service_id = require!(service_id, "serviceId");

        let (
            Some(customer_id),
            Some(vehicle_id),
            Some(center_id),
            Some(technician_id),
            Some(technician_slot_id),
            Some(date),
            Some(service_id),
        ) = (
            customer_id,
            vehicle_id,
            center_id,
            technician_id,
            technician_slot_id,
            date,
            service_id,
        )
        else {
            return Err(BookingError::Validation { missing });
        };

        let holder = self
            .holder_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("customer-{customer_id}"));

        Ok(ValidatedBooking {
            customer_id,
            vehicle_id,
            slot: SlotKey::new(center_id, technician_id, date, technician_slot_id),
            service_id,
            notes: non_blank(self.notes.as_deref()),
            promotion_code: non_blank(self.promotion_code.as_deref()),
            order_amount: self.order_amount,
            holder,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Builder for [`BookingRequest`].
#[derive(Debug, Clone, Default)]
pub struct BookingRequestBuilder {
    request: BookingRequest,
}

impl BookingRequestBuilder {
    pub fn customer_id(mut self, customer_id: CustomerId) -> Self {
        self.request.customer_id = Some(customer_id);
        self
    }

    pub fn vehicle_id(mut self, vehicle_id: VehicleId) -> Self {
        self.request.vehicle_id = Some(vehicle_id);
        self
    }

    /// Sets the center, technician, date and technician slot in one go.
    pub fn slot(mut self, slot: SlotKey) -> Self {
        self.request.center_id = Some(slot.center_id);
        self.request.technician_id = Some(slot.technician_id);
        self.request.date = Some(slot.date);
        self.request.technician_slot_id = Some(slot.technician_slot_id);
        self
    }

    pub fn center_id(mut self, center_id: CenterId) -> Self {
        self.request.center_id = Some(center_id);
        self
    }

    pub fn technician_id(mut self, technician_id: TechnicianId) -> Self {
        self.request.technician_id = Some(technician_id);
        self
    }

    pub fn technician_slot_id(mut self, technician_slot_id: TechnicianSlotId) -> Self {
        self.request.technician_slot_id = Some(technician_slot_id);
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.request.date = Some(date);
        self
    }

    pub fn service_id(mut self, service_id: ServiceId) -> Self {
        self.request.service_id = Some(service_id);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.request.notes = Some(notes.into());
        self
    }

    pub fn promotion_code(mut self, code: impl Into<String>) -> Self {
        self.request.promotion_code = Some(code.into());
        self
    }

    pub fn order_amount(mut self, amount: Money) -> Self {
        self.request.order_amount = Some(amount);
        self
    }

    /// Identifies the hold owner. Defaults to `customer-{customerId}`.
    pub fn holder_token(mut self, token: impl Into<String>) -> Self {
        self.request.holder_token = Some(token.into());
        self
    }

    pub fn build(self) -> BookingRequest {
        self.request
    }
}
