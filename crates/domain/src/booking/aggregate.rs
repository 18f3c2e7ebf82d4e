//! Booking aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, BookingId, CustomerId, ServiceId, VehicleId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    Actor, BookingEvent, BookingRecordError, BookingStatus, Money, SlotKey,
    events::{BookingRegisteredData, PromotionAppliedData},
};

/// A discount attached to a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionApplication {
    pub booking_id: BookingId,
    pub code: String,
    pub discount_amount: Money,
    pub final_amount: Money,
}

/// Booking aggregate root.
///
/// Registered once after the backend creates the booking, then mutated only
/// through status changes and promotion records. The stream id is derived from
/// the backend's booking id, so there is exactly one stream per booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Booking {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    booking_id: Option<BookingId>,
    customer_id: Option<CustomerId>,
    vehicle_id: Option<VehicleId>,
    slot: Option<SlotKey>,
    service_id: Option<ServiceId>,
    notes: Option<String>,
    status: BookingStatus,
    created_at: Option<DateTime<Utc>>,

    /// The live discount, if any. At most one at a time.
    promotion: Option<PromotionApplication>,
}

impl Aggregate for Booking {
    type Event = BookingEvent;
    type Error = BookingRecordError;

    fn aggregate_type() -> &'static str {
        "Booking"
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
            BookingEvent::BookingRegistered(data) => self.apply_registered(data),
            BookingEvent::StatusChanged(data) => {
                self.status = data.to;
            }
            BookingEvent::PromotionApplied(data) => self.apply_promotion_applied(data),
            BookingEvent::PromotionRetracted(_) => {
                self.promotion = None;
            }
        }
    }
}

// Query methods
impl Booking {
    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
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

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn promotion(&self) -> Option<&PromotionApplication> {
        self.promotion.as_ref()
    }

    /// Returns true once the registration event has been applied.
    pub fn is_registered(&self) -> bool {
        self.booking_id.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods (return events)
impl Booking {
    /// Registers a booking the backend has just created. Starts in `PENDING`.
    pub fn register(
        &self,
        booking_id: BookingId,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        slot: SlotKey,
        service_id: ServiceId,
        notes: Option<String>,
    ) -> Result<Vec<BookingEvent>, BookingRecordError> {
        if let Some(existing) = self.booking_id {
            return Err(BookingRecordError::AlreadyRegistered(existing));
        }

        Ok(vec![BookingEvent::booking_registered(
            booking_id,
            customer_id,
            vehicle_id,
            slot,
            service_id,
            notes,
        )])
    }

    /// Moves the booking from `expected` to `target`.
    ///
    /// `expected` is the status the caller based its decision on. If the
    /// booking has moved since, the command is refused rather than applied
    /// on top of a status the caller never saw.
    pub(crate) fn change_status(
        &self,
        expected: BookingStatus,
        target: BookingStatus,
        actor: Actor,
    ) -> Result<Vec<BookingEvent>, BookingRecordError> {
        self.ensure_registered()?;

        if self.status != expected {
            return Err(BookingRecordError::StatusMismatch {
                expected,
                actual: self.status,
            });
        }

        if !self.status.can_transition_to(target) {
            return Err(BookingRecordError::IllegalTransition {
                from: self.status,
                to: target,
            });
        }

        Ok(vec![BookingEvent::status_changed(self.status, target, actor)])
    }

    /// Records a discount. Refused if one is already live.
    pub fn apply_promotion(
        &self,
        code: &str,
        discount_amount: Money,
        final_amount: Money,
    ) -> Result<Vec<BookingEvent>, BookingRecordError> {
        self.ensure_registered()?;

        if matches!(self.status, BookingStatus::Paid | BookingStatus::Cancelled) {
            return Err(BookingRecordError::PromotionClosed {
                status: self.status,
            });
        }

        if let Some(live) = &self.promotion {
            return Err(BookingRecordError::PromotionAlreadyApplied {
                code: live.code.clone(),
            });
        }

        Ok(vec![BookingEvent::promotion_applied(
            code,
            discount_amount,
            final_amount,
        )])
    }

    /// Withdraws the live discount.
    pub fn retract_promotion(&self, reason: &str) -> Result<Vec<BookingEvent>, BookingRecordError> {
        self.ensure_registered()?;

        let live = self.promotion.as_ref().ok_or(BookingRecordError::NoPromotion)?;

        if self.status == BookingStatus::Paid {
            return Err(BookingRecordError::PromotionLocked {
                code: live.code.clone(),
            });
        }

        Ok(vec![BookingEvent::promotion_retracted(&live.code, reason)])
    }

    fn ensure_registered(&self) -> Result<(), BookingRecordError> {
        if self.is_registered() {
            Ok(())
        } else {
            Err(BookingRecordError::NotRegistered)
        }
    }
}

// Event application
impl Booking {
    fn apply_registered(&mut self, data: BookingRegisteredData) {
        self.id = Some(AggregateId::for_booking(data.booking_id));
        self.booking_id = Some(data.booking_id);
        self.customer_id = Some(data.customer_id);
        self.vehicle_id = Some(data.vehicle_id);
        self.slot = Some(data.slot);
        self.service_id = Some(data.service_id);
        self.notes = data.notes;
        self.status = BookingStatus::Pending;
        self.created_at = Some(data.created_at);
    }

    fn apply_promotion_applied(&mut self, data: PromotionAppliedData) {
        // Registration always precedes a promotion in the stream.
        let Some(booking_id) = self.booking_id else {
            return;
        };
        self.promotion = Some(PromotionApplication {
            booking_id,
            code: data.code,
            discount_amount: data.discount_amount,
            final_amount: data.final_amount,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::{CenterId, TechnicianId, TechnicianSlotId};

    fn slot() -> SlotKey {
        SlotKey::new(
            CenterId::new(1),
            TechnicianId::new(7),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            TechnicianSlotId::new(42),
        )
    }

    fn registered() -> Booking {
        let mut booking = Booking::default();
        let events = booking
            .register(
                BookingId::new(1001),
                CustomerId::new(5),
                VehicleId::new(9),
                slot(),
                ServiceId::new(3),
                Some("oil change".to_string()),
            )
            .unwrap();
        booking.apply_events(events);
        booking
    }

    fn move_to(booking: &mut Booking, target: BookingStatus) {
        let events = booking
            .change_status(booking.status(), target, Actor::System)
            .unwrap();
        booking.apply_events(events);
    }

    #[test]
    fn test_register_starts_pending() {
        let booking = registered();

        assert_eq!(booking.status(), BookingStatus::Pending);
        assert_eq!(booking.booking_id(), Some(BookingId::new(1001)));
        assert_eq!(booking.id(), Some(AggregateId::for_booking(BookingId::new(1001))));
        assert_eq!(booking.notes(), Some("oil change"));
        assert!(booking.created_at().is_some());
    }

    #[test]
    fn test_register_twice_fails() {
        let booking = registered();
        let result = booking.register(
            BookingId::new(1002),
            CustomerId::new(5),
            VehicleId::new(9),
            slot(),
            ServiceId::new(3),
            None,
        );
        assert!(matches!(result, Err(BookingRecordError::AlreadyRegistered(_))));
    }

    #[test]
    fn test_unregistered_booking_rejects_commands() {
        let booking = Booking::default();
        assert!(matches!(
            booking.change_status(BookingStatus::Pending, BookingStatus::Confirmed, Actor::Admin),
            Err(BookingRecordError::NotRegistered)
        ));
        assert!(matches!(
            booking.apply_promotion("X", Money::new(1), Money::new(1)),
            Err(BookingRecordError::NotRegistered)
        ));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut booking = registered();
        move_to(&mut booking, BookingStatus::Confirmed);
        move_to(&mut booking, BookingStatus::InProgress);
        move_to(&mut booking, BookingStatus::Completed);
        move_to(&mut booking, BookingStatus::Paid);
        assert!(booking.is_terminal());
    }

    #[test]
    fn test_skipping_states_is_illegal() {
        let mut booking = registered();
        move_to(&mut booking, BookingStatus::Confirmed);

        let result = booking.change_status(
            BookingStatus::Confirmed,
            BookingStatus::Paid,
            Actor::PaymentCallback,
        );
        assert!(matches!(
            result,
            Err(BookingRecordError::IllegalTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Paid
            })
        ));
    }

    #[test]
    fn test_stale_expected_status_is_refused() {
        let mut booking = registered();
        move_to(&mut booking, BookingStatus::Confirmed);

        let result =
            booking.change_status(BookingStatus::Pending, BookingStatus::Cancelled, Actor::Customer);
        assert!(matches!(
            result,
            Err(BookingRecordError::StatusMismatch {
                expected: BookingStatus::Pending,
                actual: BookingStatus::Confirmed
            })
        ));
    }

    #[test]
    fn test_promotion_at_most_once() {
        let mut booking = registered();
        let events = booking
            .apply_promotion("SUMMER10", Money::new(50_000), Money::new(450_000))
            .unwrap();
        booking.apply_events(events);

        let promo = booking.promotion().unwrap();
        assert_eq!(promo.code, "SUMMER10");
        assert_eq!(promo.final_amount, Money::new(450_000));

        let second = booking.apply_promotion("WINTER20", Money::new(100_000), Money::new(400_000));
        assert!(matches!(
            second,
            Err(BookingRecordError::PromotionAlreadyApplied { code }) if code == "SUMMER10"
        ));
    }

    #[test]
    fn test_retracted_promotion_frees_the_slot_for_another() {
        let mut booking = registered();
        let events = booking
            .apply_promotion("SUMMER10", Money::new(50_000), Money::new(450_000))
            .unwrap();
        booking.apply_events(events);
        let events = booking.retract_promotion("remote apply failed").unwrap();
        booking.apply_events(events);

        assert!(booking.promotion().is_none());
        assert!(
            booking
                .apply_promotion("WINTER20", Money::new(100_000), Money::new(400_000))
                .is_ok()
        );
    }

    #[test]
    fn test_paid_booking_locks_promotion() {
        let mut booking = registered();
        let events = booking
            .apply_promotion("SUMMER10", Money::new(50_000), Money::new(450_000))
            .unwrap();
        booking.apply_events(events);
        move_to(&mut booking, BookingStatus::Confirmed);
        move_to(&mut booking, BookingStatus::InProgress);
        move_to(&mut booking, BookingStatus::Completed);
        move_to(&mut booking, BookingStatus::Paid);

        assert!(matches!(
            booking.retract_promotion("refund"),
            Err(BookingRecordError::PromotionLocked { .. })
        ));
    }

    #[test]
    fn test_cancelled_booking_accepts_no_promotion() {
        let mut booking = registered();
        move_to(&mut booking, BookingStatus::Cancelled);

        assert!(matches!(
            booking.apply_promotion("SUMMER10", Money::new(1), Money::new(1)),
            Err(BookingRecordError::PromotionClosed {
                status: BookingStatus::Cancelled
            })
        ));
    }

    #[test]
    fn test_retract_without_promotion() {
        let booking = registered();
        assert!(matches!(
            booking.retract_promotion("nothing"),
            Err(BookingRecordError::NoPromotion)
        ));
    }
}
