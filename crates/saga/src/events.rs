//! Saga domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, BookingId, CustomerId, ServiceId, VehicleId};
use domain::{DomainEvent, SlotKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events recorded while a booking saga runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A saga step started execution.
    StepStarted(StepData),

    /// A saga step completed successfully.
    StepCompleted(StepCompletedData),

    /// A saga step failed.
    StepFailed(StepFailedData),

    /// A step went wrong without failing the saga.
    StepWarning(StepFailedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    /// A compensation step completed successfully.
    CompensationStepCompleted(StepData),

    /// A compensation step failed (logged, compensation continues).
    CompensationStepFailed(StepFailedData),

    /// Booking created and registered.
    SagaCompleted(SagaCompletedData),

    /// Booking probably created but not confirmed.
    SagaDegraded(SagaDegradedData),

    /// No booking was created.
    SagaFailed(SagaFailedData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::StepWarning(_) => "StepWarning",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaDegraded(_) => "SagaDegraded",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: AggregateId,
    pub saga_type: String,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub slot: SlotKey,
    pub service_id: ServiceId,
    pub started_at: DateTime<Utc>,
}

/// Data for step events that carry only the step name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    pub step_name: String,
}

/// Data for StepCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub step_name: String,
    /// Hold id (set after hold_slot).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_id: Option<Uuid>,
    /// Booking id (set after create_booking).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
}

/// Data for StepFailed, StepWarning and CompensationStepFailed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,
    pub error: String,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

/// Data for SagaCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompletedData {
    pub booking_id: BookingId,
    pub completed_at: DateTime<Utc>,
}

/// Data for SagaDegraded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaDegradedData {
    /// Known when the backend answered with an id but the local record failed.
    pub booking_id: Option<BookingId>,
    pub reason: String,
    pub degraded_at: DateTime<Utc>,
}

/// Data for SagaFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(
        saga_id: AggregateId,
        saga_type: impl Into<String>,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        slot: SlotKey,
        service_id: ServiceId,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            saga_type: saga_type.into(),
            customer_id,
            vehicle_id,
            slot,
            service_id,
            started_at: Utc::now(),
        })
    }

    pub fn step_started(step_name: impl Into<String>) -> Self {
        SagaEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn step_completed(
        step_name: impl Into<String>,
        hold_id: Option<Uuid>,
        booking_id: Option<BookingId>,
    ) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            hold_id,
            booking_id,
        })
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn step_warning(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepWarning(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        SagaEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn saga_completed(booking_id: BookingId) -> Self {
        SagaEvent::SagaCompleted(SagaCompletedData {
            booking_id,
            completed_at: Utc::now(),
        })
    }

    pub fn saga_degraded(booking_id: Option<BookingId>, reason: impl Into<String>) -> Self {
        SagaEvent::SagaDegraded(SagaDegradedData {
            booking_id,
            reason: reason.into(),
            degraded_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking_flow;

    #[test]
    fn test_event_type() {
        assert_eq!(
            SagaEvent::step_started(booking_flow::STEP_HOLD_SLOT).event_type(),
            "StepStarted"
        );
        assert_eq!(
            SagaEvent::step_warning(booking_flow::STEP_APPLY_PROMOTION, "network error")
                .event_type(),
            "StepWarning"
        );
        assert_eq!(
            SagaEvent::saga_degraded(None, "no id in response").event_type(),
            "SagaDegraded"
        );
        assert_eq!(
            SagaEvent::saga_completed(BookingId::new(1)).event_type(),
            "SagaCompleted"
        );
    }

    #[test]
    fn test_step_completed_omits_empty_ids() {
        let event = SagaEvent::step_completed(
            booking_flow::STEP_CREATE_BOOKING,
            None,
            Some(BookingId::new(1001)),
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["data"]["booking_id"], 1001);
        assert!(json["data"].get("hold_id").is_none());

        let back: SagaEvent = serde_json::from_value(json).unwrap();
        match back {
            SagaEvent::StepCompleted(data) => {
                assert_eq!(data.booking_id, Some(BookingId::new(1001)));
                assert!(data.hold_id.is_none());
            }
            other => panic!("Expected StepCompleted, got {}", other.event_type()),
        }
    }
}
