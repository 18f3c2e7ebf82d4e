//! The status transition engine.
//!
//! Every status change goes through [`StatusTransitionEngine::transition`]:
//!
//! 1. Claim the booking in the in-flight set, or reject the request if another
//!    transition for the same booking is still running.
//! 2. Load the booking and check the move against the transition table.
//! 3. Propagate to the backend (`CancelBooking` for cancellations,
//!    `UpdateBookingStatus` for everything else).
//! 4. Append `StatusChanged`, conditional on the status read in step 2 and on
//!    the stream version, so a writer in another process cannot interleave.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use common::BookingId;
use event_store::EventStore;
use serde::Serialize;
use thiserror::Error;

use crate::error::DomainError;

use super::{
    Actor, BookingRecordError, BookingService, BookingStatus, BookingStatusGateway,
    StatusGatewayError,
};

/// Why a transition request was refused.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The move is not in the transition table.
    #[error("Illegal transition for booking {booking_id}: {from} -> {to}")]
    IllegalTransition {
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Another transition for this booking is in flight.
    #[error("Booking {0} is already transitioning")]
    AlreadyTransitioning(BookingId),

    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),

    /// The stored status moved between read and write.
    #[error("Booking {0} was changed concurrently")]
    Conflict(BookingId),

    /// The backend refused the change.
    #[error("Backend rejected transition for booking {booking_id}: {reason}")]
    RemoteRejected { booking_id: BookingId, reason: String },

    /// The backend could not be reached. Nothing was written.
    #[error("Status gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Domain(DomainError),
}

impl TransitionError {
    /// True for the rejections callers see as an illegal transition: a move
    /// outside the table, or a request racing one already in flight.
    pub fn is_illegal(&self) -> bool {
        matches!(
            self,
            TransitionError::IllegalTransition { .. } | TransitionError::AlreadyTransitioning(_)
        )
    }

    fn reason(&self) -> &'static str {
        match self {
            TransitionError::IllegalTransition { .. } => "illegal",
            TransitionError::AlreadyTransitioning(_) => "in_flight",
            TransitionError::BookingNotFound(_) => "not_found",
            TransitionError::Conflict(_) => "conflict",
            TransitionError::RemoteRejected { .. } => "remote_rejected",
            TransitionError::Gateway(_) => "gateway",
            TransitionError::Domain(_) => "domain",
        }
    }
}

/// Proof of an applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReceipt {
    pub booking_id: BookingId,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: Actor,
    /// Stream version after the change.
    pub version: i64,
}

type InFlight = Arc<Mutex<HashSet<BookingId>>>;

/// Membership in the in-flight set, released on drop.
struct InFlightGuard {
    in_flight: InFlight,
    booking_id: BookingId,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, booking_id: BookingId) -> Option<Self> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(booking_id);
        inserted.then(|| Self {
            in_flight: Arc::clone(in_flight),
            booking_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.booking_id);
    }
}

/// The only writer of booking status.
///
/// Status events cannot be produced from outside this crate:
///
/// ```compile_fail
/// use domain::{Actor, Booking, BookingStatus};
///
/// let booking = Booking::default();
/// let _ = booking.change_status(BookingStatus::Pending, BookingStatus::Confirmed, Actor::System);
/// ```
///
/// and the booking service hands out no command handler to go around it:
///
/// ```compile_fail
/// use domain::BookingService;
/// use event_store::InMemoryEventStore;
///
/// let service = BookingService::new(InMemoryEventStore::new());
/// let _ = service.handler();
/// ```
pub struct StatusTransitionEngine<S, G>
where
    S: EventStore,
    G: BookingStatusGateway,
{
    bookings: BookingService<S>,
    gateway: G,
    in_flight: InFlight,
}

impl<S, G> StatusTransitionEngine<S, G>
where
    S: EventStore,
    G: BookingStatusGateway,
{
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            bookings: BookingService::new(store),
            gateway,
            in_flight: InFlight::default(),
        }
    }

    /// Read access to bookings for callers that need the current state.
    pub fn bookings(&self) -> &BookingService<S> {
        &self.bookings
    }

    /// Returns true while a transition for the booking is running.
    pub fn is_in_flight(&self, booking_id: BookingId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&booking_id)
    }

    /// Moves a booking to `target` on behalf of the system.
    pub async fn transition(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
    ) -> Result<TransitionReceipt, TransitionError> {
        self.transition_by(booking_id, target, Actor::System).await
    }

    /// Moves a booking to `target` on behalf of `actor`.
    #[tracing::instrument(skip_all, fields(%booking_id, %target, %actor))]
    pub async fn transition_by(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
        actor: Actor,
    ) -> Result<TransitionReceipt, TransitionError> {
        let result = self.run(booking_id, target, actor).await;

        match &result {
            Ok(receipt) => {
                metrics::counter!(
                    "booking_status_transitions_total",
                    "from" => receipt.from.as_str(),
                    "to" => receipt.to.as_str()
                )
                .increment(1);
                tracing::info!(from = %receipt.from, version = receipt.version, "status changed");
            }
            Err(e) => {
                metrics::counter!(
                    "booking_status_rejections_total",
                    "reason" => e.reason()
                )
                .increment(1);
                tracing::warn!(error = %e, "status change rejected");
            }
        }

        result
    }

    async fn run(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
        actor: Actor,
    ) -> Result<TransitionReceipt, TransitionError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, booking_id)
            .ok_or(TransitionError::AlreadyTransitioning(booking_id))?;

        let booking = self
            .bookings
            .get_booking(booking_id)
            .await
            .map_err(TransitionError::Domain)?
            .ok_or(TransitionError::BookingNotFound(booking_id))?;

        let from = booking.status();
        if !from.can_transition_to(target) {
            return Err(TransitionError::IllegalTransition {
                booking_id,
                from,
                to: target,
            });
        }

        self.propagate(booking_id, target).await?;

        let result = self
            .bookings
            .change_status(booking_id, from, target, actor)
            .await
            .map_err(|e| into_transition_error(booking_id, e))?;

        Ok(TransitionReceipt {
            booking_id,
            from,
            to: target,
            actor,
            version: result.new_version.as_i64(),
        })
    }

    async fn propagate(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
    ) -> Result<(), TransitionError> {
        let remote = match target {
            BookingStatus::Cancelled => self.gateway.cancel(booking_id).await,
            _ => self.gateway.update_status(booking_id, target).await,
        };

        remote.map_err(|e| match e {
            StatusGatewayError::Conflict { reason, .. } => {
                TransitionError::RemoteRejected { booking_id, reason }
            }
            StatusGatewayError::Unavailable(reason) => TransitionError::Gateway(reason),
        })
    }
}

fn into_transition_error(booking_id: BookingId, error: DomainError) -> TransitionError {
    match error {
        DomainError::Booking(BookingRecordError::IllegalTransition { from, to }) => {
            TransitionError::IllegalTransition {
                booking_id,
                from,
                to,
            }
        }
        DomainError::Booking(BookingRecordError::StatusMismatch { .. }) => {
            TransitionError::Conflict(booking_id)
        }
        e if e.is_conflict() => TransitionError::Conflict(booking_id),
        e => {
            // The backend already accepted the change; the local record lags.
            tracing::error!(%booking_id, error = %e, "status accepted remotely but not recorded");
            TransitionError::Domain(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{InMemoryBookingStatusGateway, RegisterBooking, SlotKey};
    use chrono::NaiveDate;
    use common::{CenterId, CustomerId, ServiceId, TechnicianId, TechnicianSlotId, VehicleId};
    use event_store::InMemoryEventStore;

    async fn engine_with_booking(
        id: u64,
    ) -> StatusTransitionEngine<InMemoryEventStore, InMemoryBookingStatusGateway> {
        let engine = StatusTransitionEngine::new(
            InMemoryEventStore::new(),
            InMemoryBookingStatusGateway::new(),
        );
        engine
            .bookings()
            .register(RegisterBooking::new(
                BookingId::new(id),
                CustomerId::new(5),
                VehicleId::new(9),
                SlotKey::new(
                    CenterId::new(1),
                    TechnicianId::new(7),
                    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                    TechnicianSlotId::new(42),
                ),
                ServiceId::new(3),
            ))
            .await
            .unwrap();
        engine
    }

    async fn status(
        engine: &StatusTransitionEngine<InMemoryEventStore, InMemoryBookingStatusGateway>,
        id: u64,
    ) -> BookingStatus {
        engine
            .bookings()
            .get_booking(BookingId::new(id))
            .await
            .unwrap()
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_legal_transition_returns_receipt() {
        let engine = engine_with_booking(1).await;
        let receipt = engine
            .transition_by(BookingId::new(1), BookingStatus::Confirmed, Actor::Admin)
            .await
            .unwrap();

        assert_eq!(receipt.from, BookingStatus::Pending);
        assert_eq!(receipt.to, BookingStatus::Confirmed);
        assert_eq!(receipt.actor, Actor::Admin);
        assert_eq!(receipt.version, 2);
        assert_eq!(status(&engine, 1).await, BookingStatus::Confirmed);
        assert!(!engine.is_in_flight(BookingId::new(1)));
    }

    #[tokio::test]
    async fn test_illegal_transition_leaves_status_unchanged() {
        let engine = engine_with_booking(1).await;
        let err = engine
            .transition(BookingId::new(1), BookingStatus::Completed)
            .await
            .unwrap_err();

        assert!(err.is_illegal());
        assert_eq!(status(&engine, 1).await, BookingStatus::Pending);
        assert!(!engine.is_in_flight(BookingId::new(1)));
    }

    #[tokio::test]
    async fn test_unknown_booking() {
        let engine = engine_with_booking(1).await;
        let err = engine
            .transition(BookingId::new(2), BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn test_remote_conflict_is_rejected() {
        let engine = engine_with_booking(1).await;
        engine.gateway.set_conflict(true);

        let err = engine
            .transition(BookingId::new(1), BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::RemoteRejected { .. }));
        assert_eq!(status(&engine, 1).await, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_gateway_outage_writes_nothing() {
        let engine = engine_with_booking(1).await;
        engine.gateway.set_fail(true);

        let err = engine
            .transition(BookingId::new(1), BookingStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::Gateway(_)));
        assert_eq!(status(&engine, 1).await, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_uses_cancel_endpoint() {
        let engine = engine_with_booking(1).await;
        engine
            .transition(BookingId::new(1), BookingStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(
            engine.gateway.calls(),
            vec![(BookingId::new(1), BookingStatus::Cancelled)]
        );
    }

    #[tokio::test]
    async fn test_second_claim_is_refused_while_first_is_held() {
        let engine = engine_with_booking(1).await;
        let guard = InFlightGuard::acquire(&engine.in_flight, BookingId::new(1)).unwrap();

        let err = engine
            .transition(BookingId::new(1), BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyTransitioning(_)));

        drop(guard);
        assert!(
            engine
                .transition(BookingId::new(1), BookingStatus::Confirmed)
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_receipt_serializes_camel_case() {
        let receipt = TransitionReceipt {
            booking_id: BookingId::new(9),
            from: BookingStatus::Completed,
            to: BookingStatus::Paid,
            actor: Actor::PaymentCallback,
            version: 5,
        };
        let json = serde_json::to_value(receipt).unwrap();
        assert_eq!(json["bookingId"], 9);
        assert_eq!(json["to"], "PAID");
        assert_eq!(json["actor"], "payment_callback");
    }
}
