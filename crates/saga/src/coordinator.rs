//! Saga coordinator for booking creation.

use std::time::Instant;

use chrono::Duration;
use common::{AggregateId, BookingId};
use domain::{Aggregate, BookingService, BookingStatus, DomainEvent, RegisterBooking};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use serde::Serialize;
use serde_json::Value;

use crate::aggregate::BookingSaga;
use crate::booking_flow;
use crate::error::{BookingError, PromotionError, SagaError};
use crate::events::SagaEvent;
use crate::promotion::{PromotionApplier, PromotionOutcome};
use crate::request::{BookingRequest, ValidatedBooking};
use crate::reservation::{HoldToken, SlotReservationManager};
use crate::services::{BookingGateway, BookingPayload, PromotionGateway, SlotAuthority};

/// How a booking saga run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BookingOutcome {
    /// The booking exists remotely and is recorded locally as `PENDING`.
    Created {
        saga_id: AggregateId,
        booking_id: BookingId,
        status: BookingStatus,
        promotion: Option<PromotionOutcome>,
        warnings: Vec<String>,
    },
    /// The backend accepted the booking but it could not be confirmed: the
    /// response carried no usable id, or the local record failed.
    Degraded {
        saga_id: AggregateId,
        booking_id: Option<BookingId>,
        reason: String,
        warnings: Vec<String>,
    },
}

impl BookingOutcome {
    pub fn saga_id(&self) -> AggregateId {
        match self {
            BookingOutcome::Created { saga_id, .. } | BookingOutcome::Degraded { saga_id, .. } => {
                *saga_id
            }
        }
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        match self {
            BookingOutcome::Created { booking_id, .. } => Some(*booking_id),
            BookingOutcome::Degraded { booking_id, .. } => *booking_id,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BookingOutcome::Degraded { .. })
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            BookingOutcome::Created { warnings, .. } | BookingOutcome::Degraded { warnings, .. } => {
                warnings
            }
        }
    }
}

/// Orchestrates booking creation.
///
/// Steps run strictly in order: hold the slot, create the booking, apply the
/// promotion. A failed create releases the hold; a failed promotion is only a
/// warning. Every run is recorded as an event-sourced [`BookingSaga`].
pub struct BookingSagaCoordinator<S, A, B, P>
where
    S: EventStore,
    A: SlotAuthority,
    B: BookingGateway,
    P: PromotionGateway,
{
    store: S,
    bookings: BookingService<S>,
    reservations: SlotReservationManager<A>,
    gateway: B,
    promotions: PromotionApplier<S, P>,
}

/// A saga run in progress: its id and the state rebuilt from what it has
/// recorded so far.
struct Run {
    saga_id: AggregateId,
    saga: BookingSaga,
    started: Instant,
}

impl<S, A, B, P> BookingSagaCoordinator<S, A, B, P>
where
    S: EventStore + Clone,
    A: SlotAuthority,
    B: BookingGateway,
    P: PromotionGateway,
{
    /// Creates a coordinator whose holds last `hold_ttl`.
    pub fn new(store: S, authority: A, gateway: B, promotions: P, hold_ttl: Duration) -> Self {
        Self {
            bookings: BookingService::new(store.clone()),
            reservations: SlotReservationManager::new(authority, hold_ttl),
            promotions: PromotionApplier::new(store.clone(), promotions),
            store,
            gateway,
        }
    }

    pub fn bookings(&self) -> &BookingService<S> {
        &self.bookings
    }

    pub fn reservations(&self) -> &SlotReservationManager<A> {
        &self.reservations
    }

    pub fn gateway(&self) -> &B {
        &self.gateway
    }

    pub fn promotions(&self) -> &PromotionApplier<S, P> {
        &self.promotions
    }

    /// Runs the booking saga for a request.
    #[tracing::instrument(skip_all, fields(saga_type = booking_flow::SAGA_TYPE))]
    pub async fn create_booking(
        &self,
        request: BookingRequest,
    ) -> Result<BookingOutcome, BookingError> {
        let plan = request.validate().inspect_err(|e| {
            metrics::counter!("booking_saga_failed_total", "reason" => e.category()).increment(1);
        })?;
        metrics::counter!("booking_saga_started_total").increment(1);

        let saga_id = AggregateId::new();
        let mut run = Run {
            saga_id,
            saga: BookingSaga::default(),
            started: Instant::now(),
        };
        self.record(
            &mut run,
            SagaEvent::saga_started(
                saga_id,
                booking_flow::SAGA_TYPE,
                plan.customer_id,
                plan.vehicle_id,
                plan.slot,
                plan.service_id,
            ),
        )
        .await?;
        tracing::info!(%saga_id, slot = %plan.slot, "booking saga started");

        // 1. Hold the slot. A conflict ends the run with nothing to undo.
        self.record(&mut run, SagaEvent::step_started(booking_flow::STEP_HOLD_SLOT))
            .await?;
        let token = match self.reservations.hold(plan.slot, &plan.holder).await {
            Ok(token) => token,
            Err(e) => {
                let error = BookingError::from(e);
                self.record(
                    &mut run,
                    SagaEvent::step_failed(booking_flow::STEP_HOLD_SLOT, error.to_string()),
                )
                .await?;
                self.fail(&mut run, &error).await?;
                return Err(error);
            }
        };

        // Any error from here on must not leave the hold behind. A consumed
        // hold is ignored by release.
        match self.run_with_hold(&mut run, &plan, &token).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                if let Err(e) = self.reservations.release(&token).await {
                    tracing::warn!(%saga_id, error = %e, "hold left to expire");
                }
                Err(error)
            }
        }
    }

    /// Steps 2 and 3: create the booking, then apply the promotion.
    async fn run_with_hold(
        &self,
        run: &mut Run,
        plan: &ValidatedBooking,
        token: &HoldToken,
    ) -> Result<BookingOutcome, BookingError> {
        self.record(
            run,
            SagaEvent::step_completed(booking_flow::STEP_HOLD_SLOT, Some(token.hold_id), None),
        )
        .await?;

        // 2. Create the booking. A failure releases the hold.
        self.record(run, SagaEvent::step_started(booking_flow::STEP_CREATE_BOOKING))
            .await?;
        let body = match self.gateway.create_booking(&payload(plan)).await {
            Ok(body) => body,
            Err(e) => {
                let error = BookingError::BookingCreation {
                    reason: e.to_string(),
                };
                self.record(
                    run,
                    SagaEvent::step_failed(booking_flow::STEP_CREATE_BOOKING, e.to_string()),
                )
                .await?;
                self.compensate(run, booking_flow::STEP_CREATE_BOOKING, token)
                    .await?;
                self.fail(run, &error).await?;
                return Err(error);
            }
        };

        // The backend holds a booking from here on, so the slot stays taken.
        self.consume_hold(run, token).await?;

        let Some(booking_id) = parse_booking_id(&body) else {
            return self
                .degrade(run, None, "booking response carried no booking id")
                .await;
        };

        let mut register = RegisterBooking::new(
            booking_id,
            plan.customer_id,
            plan.vehicle_id,
            plan.slot,
            plan.service_id,
        );
        if let Some(notes) = &plan.notes {
            register = register.with_notes(notes.clone());
        }
        if let Err(e) = self.bookings.register(register).await {
            tracing::error!(%booking_id, error = %e, "booking created remotely but not recorded");
            return self
                .degrade(
                    run,
                    Some(booking_id),
                    &format!("booking {booking_id} could not be recorded: {e}"),
                )
                .await;
        }
        self.record(
            run,
            SagaEvent::step_completed(booking_flow::STEP_CREATE_BOOKING, None, Some(booking_id)),
        )
        .await?;

        // 3. Promotion. Never undoes the booking.
        let promotion = match &plan.promotion_code {
            Some(code) => self.apply_promotion(run, booking_id, code, plan).await?,
            None => None,
        };

        self.record(run, SagaEvent::saga_completed(booking_id)).await?;

        let duration = run.started.elapsed().as_secs_f64();
        metrics::histogram!("booking_saga_duration_seconds").record(duration);
        metrics::counter!("booking_saga_completed_total").increment(1);
        tracing::info!(saga_id = %run.saga_id, %booking_id, duration, "booking saga completed");

        Ok(BookingOutcome::Created {
            saga_id: run.saga_id,
            booking_id,
            status: BookingStatus::Pending,
            promotion,
            warnings: run.saga.warnings().to_vec(),
        })
    }

    async fn apply_promotion(
        &self,
        run: &mut Run,
        booking_id: BookingId,
        code: &str,
        plan: &ValidatedBooking,
    ) -> Result<Option<PromotionOutcome>, SagaError> {
        self.record(run, SagaEvent::step_started(booking_flow::STEP_APPLY_PROMOTION))
            .await?;

        let result = match plan.order_amount {
            Some(amount) => self.promotions.apply(booking_id, code, amount).await,
            None => Err(PromotionError::MissingAmount),
        };

        match result {
            Ok(outcome) => {
                self.record(
                    run,
                    SagaEvent::step_completed(booking_flow::STEP_APPLY_PROMOTION, None, None),
                )
                .await?;
                Ok(Some(outcome))
            }
            Err(e) => {
                self.record(
                    run,
                    SagaEvent::step_warning(booking_flow::STEP_APPLY_PROMOTION, e.to_string()),
                )
                .await?;
                Ok(None)
            }
        }
    }

    /// Turns the hold into the booking's slot. A failure is a warning: the
    /// booking exists either way.
    async fn consume_hold(&self, run: &mut Run, token: &HoldToken) -> Result<(), SagaError> {
        if let Err(e) = self.reservations.consume(token).await {
            self.record(
                run,
                SagaEvent::step_warning(booking_flow::STEP_HOLD_SLOT, e.to_string()),
            )
            .await?;
        }
        Ok(())
    }

    /// Undoes completed steps in reverse order, after `failed_step` failed.
    #[tracing::instrument(skip_all, fields(saga_id = %run.saga_id, failed_step = failed_step))]
    async fn compensate(
        &self,
        run: &mut Run,
        failed_step: &str,
        token: &HoldToken,
    ) -> Result<(), SagaError> {
        self.record(run, SagaEvent::compensation_started(failed_step))
            .await?;

        let completed: Vec<String> = run.saga.completed_steps().to_vec();
        for step in completed.iter().rev() {
            if step == booking_flow::STEP_HOLD_SLOT {
                let event = match self.reservations.release(token).await {
                    Ok(()) => SagaEvent::compensation_step_completed(step),
                    Err(e) => SagaEvent::compensation_step_failed(step, e.to_string()),
                };
                self.record(run, event).await?;
            }
        }
        Ok(())
    }

    async fn fail(&self, run: &mut Run, error: &BookingError) -> Result<(), SagaError> {
        let reason = run
            .saga
            .failure_reason()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        self.record(run, SagaEvent::saga_failed(reason)).await?;

        metrics::histogram!("booking_saga_duration_seconds")
            .record(run.started.elapsed().as_secs_f64());
        metrics::counter!("booking_saga_failed_total", "reason" => error.category()).increment(1);
        tracing::warn!(saga_id = %run.saga_id, category = error.category(), error = %error, "booking saga failed");
        Ok(())
    }

    async fn degrade(
        &self,
        run: &mut Run,
        booking_id: Option<BookingId>,
        reason: &str,
    ) -> Result<BookingOutcome, BookingError> {
        self.record(run, SagaEvent::saga_degraded(booking_id, reason))
            .await?;

        metrics::histogram!("booking_saga_duration_seconds")
            .record(run.started.elapsed().as_secs_f64());
        metrics::counter!("booking_saga_degraded_total").increment(1);
        tracing::warn!(saga_id = %run.saga_id, ?booking_id, reason, "booking saga degraded");

        Ok(BookingOutcome::Degraded {
            saga_id: run.saga_id,
            booking_id,
            reason: reason.to_string(),
            warnings: run.saga.warnings().to_vec(),
        })
    }

    /// Loads a saga run by ID from the event store.
    pub async fn get_saga(&self, saga_id: AggregateId) -> Result<Option<BookingSaga>, SagaError> {
        let events = self.store.get_events_for_aggregate(saga_id).await?;

        if events.is_empty() {
            return Ok(None);
        }

        let mut saga = BookingSaga::default();
        for envelope in events {
            let event: SagaEvent = serde_json::from_value(envelope.payload)?;
            saga.apply(event);
            saga.set_version(envelope.version);
        }
        Ok(Some(saga))
    }

    /// Appends an event to the run's stream and applies it to its state.
    async fn record(&self, run: &mut Run, event: SagaEvent) -> Result<(), SagaError> {
        let version = self
            .append_saga_event(run.saga_id, run.saga.version(), &event)
            .await?;
        run.saga.apply(event);
        run.saga.set_version(version);
        Ok(())
    }

    /// Appends a single saga event to the event store.
    async fn append_saga_event(
        &self,
        saga_id: AggregateId,
        current_version: Version,
        event: &SagaEvent,
    ) -> Result<Version, SagaError> {
        let envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(saga_id)
            .aggregate_type(BookingSaga::aggregate_type())
            .version(current_version.next())
            .payload(event)?
            .build()?;

        let new_version = self
            .store
            .append(
                vec![envelope],
                AppendOptions::expect_version(current_version),
            )
            .await?;

        Ok(new_version)
    }
}

fn payload(plan: &ValidatedBooking) -> BookingPayload {
    BookingPayload {
        customer_id: plan.customer_id,
        vehicle_id: plan.vehicle_id,
        center_id: plan.slot.center_id,
        technician_id: plan.slot.technician_id,
        technician_slot_id: plan.slot.technician_slot_id,
        date: plan.slot.date,
        service_id: plan.service_id,
        notes: plan.notes.clone(),
    }
}

/// Extracts the booking id from a create response.
///
/// Accepts `bookingId` or `id`, under `data` or at the top level, as a
/// positive number or a numeric string. `data` wins over the top level and
/// `bookingId` wins over `id`.
pub fn parse_booking_id(body: &Value) -> Option<BookingId> {
    [body.get("data"), Some(body)]
        .into_iter()
        .flatten()
        .flat_map(|scope| [scope.get("bookingId"), scope.get("id")])
        .flatten()
        .find_map(|value| {
            let id = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            id.filter(|id| *id > 0).map(BookingId::new)
        })
}
