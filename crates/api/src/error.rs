//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, TransitionError};
use saga::{BookingError, SagaError};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// The booking saga refused or failed.
    #[error(transparent)]
    Booking(#[from] BookingError),
    /// A status change was refused.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Saga bookkeeping error.
    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl ApiError {
    fn status_and_category(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Booking(err) => (booking_status(err), err.category()),
            ApiError::Transition(err) => transition_status(err),
            ApiError::Domain(err) if err.is_conflict() => (StatusCode::CONFLICT, "conflict"),
            ApiError::Domain(_) | ApiError::Saga(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Booking(err) => err.is_retryable(),
            ApiError::Transition(err) => matches!(
                err,
                TransitionError::AlreadyTransitioning(_) | TransitionError::Conflict(_)
            ),
            _ => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, category) = self.status_and_category();
        if status.is_server_error() {
            tracing::error!(error = %self, category, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "category": category,
            "retryable": self.is_retryable(),
        });
        (status, axum::Json(body)).into_response()
    }
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::Validation { .. } => StatusCode::BAD_REQUEST,
        BookingError::SlotConflict { .. } => StatusCode::CONFLICT,
        BookingError::Identity(_) | BookingError::VehicleResolution(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BookingError::BookingCreation { .. } | BookingError::Reservation(_) => {
            StatusCode::BAD_GATEWAY
        }
        BookingError::Saga(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn transition_status(err: &TransitionError) -> (StatusCode, &'static str) {
    match err {
        TransitionError::IllegalTransition { .. } => (StatusCode::CONFLICT, "illegal_transition"),
        TransitionError::AlreadyTransitioning(_) => (StatusCode::CONFLICT, "already_transitioning"),
        TransitionError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        TransitionError::RemoteRejected { .. } => (StatusCode::CONFLICT, "remote_rejected"),
        TransitionError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        TransitionError::Gateway(_) => (StatusCode::BAD_GATEWAY, "gateway"),
        TransitionError::Domain(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}
