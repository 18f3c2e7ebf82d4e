//! Booking checkout, lookup and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{BookingId, CustomerId, ServiceId, VehicleId};
use domain::{
    Actor, Aggregate, BookingStatus, InMemoryBookingStatusGateway, PromotionApplication, SlotKey,
    StatusTransitionEngine, TransitionReceipt,
};
use event_store::EventStore;
use saga::{
    BookingCheckout, BookingOutcome, CheckoutSubmission, InMemoryBookingGateway,
    InMemoryCustomerDirectory, InMemoryPromotionGateway, InMemorySlotAuthority,
    InMemoryVehicleRegistry,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// The checkout flow wired to the in-memory backend.
pub type Checkout<S> = BookingCheckout<
    InMemoryCustomerDirectory,
    InMemoryVehicleRegistry,
    S,
    InMemorySlotAuthority,
    InMemoryBookingGateway,
    InMemoryPromotionGateway,
>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub checkout: Checkout<S>,
    pub transitions: StatusTransitionEngine<S, InMemoryBookingStatusGateway>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
    #[serde(default)]
    pub actor: Actor,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub booking_id: BookingId,
    pub customer_id: Option<CustomerId>,
    pub vehicle_id: Option<VehicleId>,
    pub slot: Option<SlotKey>,
    pub service_id: Option<ServiceId>,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub allowed_transitions: Vec<BookingStatus>,
    pub promotion: Option<PromotionApplication>,
    pub created_at: Option<DateTime<Utc>>,
    pub version: i64,
}

/// Response type for event envelope data.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub timestamp: String,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /bookings: Run a booking wizard submission.
///
/// 201 when the booking was created, 202 when the backend accepted it but it
/// could not be confirmed.
#[tracing::instrument(skip_all)]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(submission): Json<CheckoutSubmission>,
) -> Result<(StatusCode, Json<BookingOutcome>), ApiError> {
    let outcome = state.checkout.submit(submission).await?;
    let status = if outcome.is_degraded() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

/// GET /bookings/{id}: Load a booking.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let booking = state
        .transitions
        .bookings()
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Booking {id} not found")))?;

    Ok(Json(BookingResponse {
        booking_id,
        customer_id: booking.customer_id(),
        vehicle_id: booking.vehicle_id(),
        slot: booking.slot(),
        service_id: booking.service_id(),
        notes: booking.notes().map(String::from),
        status: booking.status(),
        allowed_transitions: booking.status().allowed_targets().to_vec(),
        promotion: booking.promotion().cloned(),
        created_at: booking.created_at(),
        version: booking.version().as_i64(),
    }))
}

/// POST /bookings/{id}/status: Move a booking to another status.
#[tracing::instrument(skip(state, req))]
pub async fn change_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<TransitionReceipt>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let target: BookingStatus = req
        .status
        .parse()
        .map_err(|e: domain::booking::UnknownStatus| ApiError::BadRequest(e.to_string()))?;

    let receipt = state
        .transitions
        .transition_by(booking_id, target, req.actor)
        .await?;
    Ok(Json(receipt))
}

/// GET /bookings/{id}/events: List the booking's event stream.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let envelopes = state.transitions.bookings().events(booking_id).await?;
    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Booking {id} not found")));
    }

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            actor: e.metadata_str("actor").map(String::from),
            event_type: e.event_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

fn parse_booking_id(id: &str) -> Result<BookingId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid booking id '{id}': {e}")))
}
