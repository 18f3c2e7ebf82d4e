//! Booking saga aggregate.

use common::{AggregateId, BookingId, CustomerId, ServiceId, VehicleId};
use domain::{Aggregate, SlotKey};
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::state::SagaState;

/// One recorded run of the booking saga.
///
/// Rebuilt from its events, so a run can be inspected after the fact: which
/// steps finished, which hold it took, which booking it produced and what
/// went wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingSaga {
    id: Option<AggregateId>,
    version: Version,
    saga_type: String,
    state: SagaState,
    customer_id: Option<CustomerId>,
    vehicle_id: Option<VehicleId>,
    slot: Option<SlotKey>,
    service_id: Option<ServiceId>,
    current_step: usize,
    completed_steps: Vec<String>,
    hold_id: Option<Uuid>,
    booking_id: Option<BookingId>,
    warnings: Vec<String>,
    compensated_steps: Vec<String>,
    failure_reason: Option<String>,
}

impl Aggregate for BookingSaga {
    type Event = SagaEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "BookingSaga"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.saga_type = data.saga_type;
                self.customer_id = Some(data.customer_id);
                self.vehicle_id = Some(data.vehicle_id);
                self.slot = Some(data.slot);
                self.service_id = Some(data.service_id);
                self.state = SagaState::Running;
            }
            SagaEvent::StepStarted(_) => {
                self.current_step += 1;
            }
            SagaEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step_name);
                if let Some(hold_id) = data.hold_id {
                    self.hold_id = Some(hold_id);
                }
                if let Some(booking_id) = data.booking_id {
                    self.booking_id = Some(booking_id);
                }
            }
            SagaEvent::StepFailed(data) => {
                self.failure_reason = Some(format!("{}: {}", data.step_name, data.error));
            }
            SagaEvent::StepWarning(data) => {
                self.warnings.push(format!("{}: {}", data.step_name, data.error));
            }
            SagaEvent::CompensationStarted(_) => {
                self.state = SagaState::Compensating;
            }
            SagaEvent::CompensationStepCompleted(data) => {
                self.compensated_steps.push(data.step_name);
            }
            SagaEvent::CompensationStepFailed(data) => {
                // Release is best-effort; the hold will expire on its own.
                self.warnings
                    .push(format!("compensate {}: {}", data.step_name, data.error));
            }
            SagaEvent::SagaCompleted(data) => {
                self.booking_id = Some(data.booking_id);
                self.state = SagaState::Completed;
            }
            SagaEvent::SagaDegraded(data) => {
                if data.booking_id.is_some() {
                    self.booking_id = data.booking_id;
                }
                self.failure_reason = Some(data.reason);
                self.state = SagaState::Degraded;
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl BookingSaga {
    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn vehicle_id(&self) -> Option<VehicleId> {
        self.vehicle_id
    }

    pub fn slot(&self) -> Option<SlotKey> {
        self.slot
    }

    pub fn service_id(&self) -> Option<ServiceId> {
        self.service_id
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Steps whose effects were undone, in the order they were undone.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    pub fn hold_id(&self) -> Option<Uuid> {
        self.hold_id
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}
