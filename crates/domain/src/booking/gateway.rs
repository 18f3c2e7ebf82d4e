//! Remote status propagation: trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::BookingId;
use thiserror::Error;

use super::BookingStatus;

/// Failures reported by the remote booking backend when changing a status.
#[derive(Debug, Clone, Error)]
pub enum StatusGatewayError {
    /// The backend holds a different status than the one we moved from.
    #[error("Backend refused the status change for booking {booking_id}: {reason}")]
    Conflict { booking_id: BookingId, reason: String },

    /// The backend could not be reached or failed.
    #[error("Booking backend unavailable: {0}")]
    Unavailable(String),
}

/// The backend's status endpoints.
#[async_trait]
pub trait BookingStatusGateway: Send + Sync {
    /// `UpdateBookingStatus(bookingId, targetStatus)`.
    async fn update_status(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
    ) -> Result<(), StatusGatewayError>;

    /// `CancelBooking(bookingId)`.
    async fn cancel(&self, booking_id: BookingId) -> Result<(), StatusGatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    calls: Vec<(BookingId, BookingStatus)>,
    fail: bool,
    conflict: bool,
    latency: Duration,
}

/// In-memory status gateway for testing and the demo server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStatusGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryBookingStatusGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail as unavailable.
    pub fn set_fail(&self, fail: bool) {
        self.write().fail = fail;
    }

    /// Makes every following call report a conflict.
    pub fn set_conflict(&self, conflict: bool) {
        self.write().conflict = conflict;
    }

    /// Delays every call, widening the window for concurrent requests.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = latency;
    }

    /// Returns the accepted calls in order. Cancellations appear as `CANCELLED`.
    pub fn calls(&self) -> Vec<(BookingId, BookingStatus)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .clone()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryGatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn record(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
    ) -> Result<(), StatusGatewayError> {
        let latency = self.write().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.write();
        if state.fail {
            return Err(StatusGatewayError::Unavailable(
                "connection reset by peer".to_string(),
            ));
        }
        if state.conflict {
            return Err(StatusGatewayError::Conflict {
                booking_id,
                reason: "status was changed by another client".to_string(),
            });
        }
        state.calls.push((booking_id, target));
        Ok(())
    }
}

#[async_trait]
impl BookingStatusGateway for InMemoryBookingStatusGateway {
    async fn update_status(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
    ) -> Result<(), StatusGatewayError> {
        self.record(booking_id, target).await
    }

    async fn cancel(&self, booking_id: BookingId) -> Result<(), StatusGatewayError> {
        self.record(booking_id, BookingStatus::Cancelled).await
    }
}
