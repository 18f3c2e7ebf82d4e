//! Booking service providing a simplified API for booking operations.

use common::{AggregateId, BookingId};
use event_store::{EventEnvelope, EventStore};

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    Actor, Booking, BookingStatus, RecordPromotion, RegisterBooking, RetractPromotion,
};

/// Service for managing bookings.
///
/// Exposes registration and promotion records. Status changes are
/// crate-private and reached only through the transition engine.
pub struct BookingService<S: EventStore> {
    handler: CommandHandler<S, Booking>,
}

impl<S: EventStore> BookingService<S> {
    /// Creates a new booking service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Records a booking the backend has created.
    #[tracing::instrument(skip(self), fields(booking_id = %cmd.booking_id))]
    pub async fn register(
        &self,
        cmd: RegisterBooking,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let aggregate_id = cmd.aggregate_id();
        let RegisterBooking {
            booking_id,
            customer_id,
            vehicle_id,
            slot,
            service_id,
            notes,
        } = cmd;

        self.handler
            .execute(aggregate_id, &[], |booking| {
                booking.register(booking_id, customer_id, vehicle_id, slot, service_id, notes)
            })
            .await
    }

    /// Attaches a discount to a booking.
    #[tracing::instrument(skip(self), fields(booking_id = %cmd.booking_id, code = %cmd.code))]
    pub async fn record_promotion(
        &self,
        cmd: RecordPromotion,
    ) -> Result<CommandResult<Booking>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &[], |booking| {
                booking.apply_promotion(&cmd.code, cmd.discount_amount, cmd.final_amount)
            })
            .await
    }

    /// Withdraws a booking's live discount.
    #[tracing::instrument(skip(self), fields(booking_id = %cmd.booking_id))]
    pub async fn retract_promotion(
        &self,
        cmd: RetractPromotion,
    ) -> Result<CommandResult<Booking>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &[], |booking| {
                booking.retract_promotion(&cmd.reason)
            })
            .await
    }

    /// Writes a status change, conditional on the status the caller read.
    pub(crate) async fn change_status(
        &self,
        booking_id: BookingId,
        expected: BookingStatus,
        target: BookingStatus,
        actor: Actor,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let metadata = [("actor", serde_json::Value::from(actor.as_str()))];
        self.handler
            .execute(AggregateId::for_booking(booking_id), &metadata, |booking| {
                booking.change_status(expected, target, actor)
            })
            .await
    }

    /// Loads a booking, returning None if it was never registered.
    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>, DomainError> {
        self.handler
            .load_existing(AggregateId::for_booking(booking_id))
            .await
    }

    /// Returns the raw event stream of a booking.
    pub async fn events(&self, booking_id: BookingId) -> Result<Vec<EventEnvelope>, DomainError> {
        Ok(self
            .handler
            .store()
            .get_events_for_aggregate(AggregateId::for_booking(booking_id))
            .await?)
    }
}
