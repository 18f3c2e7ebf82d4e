//! Booking creation gateway trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, CenterId, CustomerId, ServiceId, TechnicianId, TechnicianSlotId, VehicleId};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::SagaError;

const SERVICE: &str = "booking";

/// Body of a `CreateBooking` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub center_id: CenterId,
    pub technician_id: TechnicianId,
    pub technician_slot_id: TechnicianSlotId,
    pub date: NaiveDate,
    pub service_id: ServiceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The backend's booking creation endpoint.
///
/// Returns the raw response body: the backend has answered in several shapes
/// over time, and parsing is the caller's job.
#[async_trait]
pub trait BookingGateway: Send + Sync {
    async fn create_booking(&self, payload: &BookingPayload) -> Result<Value, SagaError>;
}

/// Response body shapes the in-memory gateway can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    /// `{"data": {"bookingId": 1001, ...}}`
    #[default]
    Nested,
    /// `{"id": 1001, ...}`
    TopLevel,
    /// `{"data": {"bookingId": "1001"}}`
    StringId,
    /// `{"success": true}` with no id.
    WithoutId,
}

#[derive(Debug)]
struct InMemoryBookingState {
    created: Vec<(BookingId, BookingPayload)>,
    next_id: u64,
    shape: ResponseShape,
    fail: bool,
}

impl Default for InMemoryBookingState {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            next_id: 1000,
            shape: ResponseShape::default(),
            fail: false,
        }
    }
}

/// In-memory booking gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingGateway {
    state: Arc<RwLock<InMemoryBookingState>>,
}

impl InMemoryBookingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail = fail;
    }

    pub fn set_response_shape(&self, shape: ResponseShape) {
        self.write().shape = shape;
    }

    /// Returns the number of bookings the backend holds.
    pub fn booking_count(&self) -> usize {
        self.read().created.len()
    }

    pub fn created(&self) -> Vec<(BookingId, BookingPayload)> {
        self.read().created.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryBookingState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryBookingState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BookingGateway for InMemoryBookingGateway {
    async fn create_booking(&self, payload: &BookingPayload) -> Result<Value, SagaError> {
        let mut state = self.write();
        if state.fail {
            return Err(SagaError::service(SERVICE, "upstream returned 503"));
        }

        state.next_id += 1;
        let booking_id = BookingId::new(state.next_id);
        state.created.push((booking_id, payload.clone()));

        let id = booking_id.get();
        Ok(match state.shape {
            ResponseShape::Nested => json!({
                "success": true,
                "data": { "bookingId": id, "status": "PENDING" }
            }),
            ResponseShape::TopLevel => json!({ "id": id, "status": "PENDING" }),
            ResponseShape::StringId => json!({ "data": { "bookingId": id.to_string() } }),
            ResponseShape::WithoutId => json!({ "success": true }),
        })
    }
}
