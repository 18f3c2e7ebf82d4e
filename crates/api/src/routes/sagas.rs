//! Saga run inspection endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{AggregateId, BookingId, CustomerId, VehicleId};
use domain::SlotKey;
use event_store::EventStore;
use saga::SagaState;
use serde::Serialize;

use super::bookings::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaStatusResponse {
    pub saga_id: AggregateId,
    pub saga_type: String,
    pub state: SagaState,
    pub customer_id: Option<CustomerId>,
    pub vehicle_id: Option<VehicleId>,
    pub slot: Option<SlotKey>,
    pub completed_steps: Vec<String>,
    pub compensated_steps: Vec<String>,
    pub hold_id: Option<uuid::Uuid>,
    pub booking_id: Option<BookingId>,
    pub warnings: Vec<String>,
    pub failure_reason: Option<String>,
}

/// GET /sagas/{id}: Get the recorded state of a booking saga run.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let saga_id = uuid::Uuid::parse_str(&id)
        .map(AggregateId::from)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;

    let saga = state
        .checkout
        .coordinator()
        .get_saga(saga_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))?;

    Ok(Json(SagaStatusResponse {
        saga_id,
        saga_type: saga.saga_type().to_string(),
        state: saga.state(),
        customer_id: saga.customer_id(),
        vehicle_id: saga.vehicle_id(),
        slot: saga.slot(),
        completed_steps: saga.completed_steps().to_vec(),
        compensated_steps: saga.compensated_steps().to_vec(),
        hold_id: saga.hold_id(),
        booking_id: saga.booking_id(),
        warnings: saga.warnings().to_vec(),
        failure_reason: saga.failure_reason().map(String::from),
    }))
}
