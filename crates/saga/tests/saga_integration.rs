//! Integration tests for the booking saga.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use common::{
    AggregateId, CenterId, CustomerId, ServiceId, TechnicianId, TechnicianSlotId, VehicleId,
};
use domain::{Aggregate, BookingStatus, Money, SlotKey};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, InMemoryEventStore, Version,
};
use saga::{
    BookingCheckout, BookingError, BookingOutcome, BookingRequest, BookingSagaCoordinator,
    CheckoutSubmission, CustomerMode, GuestContact, HoldStatus, IdentityResolver,
    InMemoryBookingGateway, InMemoryCustomerDirectory, InMemoryPromotionGateway,
    InMemorySlotAuthority, InMemoryVehicleRegistry, ResponseShape, SagaState, SlotAuthority,
    VehicleHints, VehicleResolver,
};
use tokio::sync::Barrier;
use uuid::Uuid;

type TestCoordinator = BookingSagaCoordinator<
    InMemoryEventStore,
    InMemorySlotAuthority,
    InMemoryBookingGateway,
    InMemoryPromotionGateway,
>;

struct TestHarness {
    coordinator: TestCoordinator,
    authority: InMemorySlotAuthority,
    backend: InMemoryBookingGateway,
    promotions: InMemoryPromotionGateway,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryEventStore::new();
        let authority = InMemorySlotAuthority::new();
        let backend = InMemoryBookingGateway::new();
        let promotions = InMemoryPromotionGateway::new();
        promotions.add_percentage_code("SUMMER10", 10, Money::new(200_000), 100);

        let coordinator = BookingSagaCoordinator::new(
            store,
            authority.clone(),
            backend.clone(),
            promotions.clone(),
            Duration::minutes(15),
        );

        Self {
            coordinator,
            authority,
            backend,
            promotions,
        }
    }
}

fn slot() -> SlotKey {
    SlotKey::new(
        CenterId::new(1),
        TechnicianId::new(7),
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        TechnicianSlotId::new(42),
    )
}

fn request(customer: u64) -> BookingRequest {
    BookingRequest::builder()
        .customer_id(CustomerId::new(customer))
        .vehicle_id(VehicleId::new(customer + 100))
        .slot(slot())
        .service_id(ServiceId::new(3))
        .build()
}

#[tokio::test]
async fn test_happy_path_creates_pending_booking_and_consumes_hold() {
    let h = TestHarness::new();

    let outcome = h.coordinator.create_booking(request(5)).await.unwrap();
    let BookingOutcome::Created {
        saga_id,
        booking_id,
        status,
        promotion,
        warnings,
    } = outcome
    else {
        panic!("expected a created booking");
    };
    assert_eq!(status, BookingStatus::Pending);
    assert!(promotion.is_none());
    assert!(warnings.is_empty());

    let booking = h
        .coordinator
        .bookings()
        .get_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.status(), BookingStatus::Pending);
    assert_eq!(booking.slot(), Some(slot()));

    // The hold became the booking's slot and cannot be released any more.
    assert_eq!(h.authority.committed_to(&slot()).await.as_deref(), Some("customer-5"));

    let saga = h.coordinator.get_saga(saga_id).await.unwrap().unwrap();
    assert_eq!(saga.id(), Some(saga_id));
    assert_eq!(saga.state(), SagaState::Completed);
    assert_eq!(saga.completed_steps(), &["hold_slot", "create_booking"]);
    assert_eq!(saga.booking_id(), Some(booking_id));
    assert!(saga.hold_id().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_holds_on_one_slot_admit_exactly_one() {
    const CONTENDERS: usize = 8;
    let authority = InMemorySlotAuthority::new();
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    let tasks: Vec<_> = (0..CONTENDERS)
        .map(|i| {
            let authority = authority.clone();
            let barrier = Arc::clone(&barrier);
            // Half the contenders share one holder string.
            let holder = if i % 2 == 0 {
                "customer-5".to_string()
            } else {
                format!("guest-{i}")
            };
            tokio::spawn(async move {
                barrier.wait().await;
                authority
                    .hold(slot(), Uuid::new_v4(), &holder, Duration::minutes(15))
                    .await
            })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
    assert!(authority.live_holder(&slot()).await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sagas_book_one_slot_once() {
    const RUNS: usize = 6;
    let h = TestHarness::new();
    let coordinator = Arc::new(h.coordinator);
    let barrier = Arc::new(Barrier::new(RUNS));

    let tasks: Vec<_> = (0..RUNS)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            // Double submits from one customer race alongside other customers.
            let customer = if i < 3 { 5 } else { 10 + i as u64 };
            tokio::spawn(async move {
                barrier.wait().await;
                coordinator.create_booking(request(customer)).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(BookingError::SlotConflict { .. })))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, RUNS - 1);
    assert_eq!(h.backend.booking_count(), 1);

    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(loser.is_retryable());
}

#[tokio::test]
async fn test_slot_conflict_records_failure_without_compensation() {
    let h = TestHarness::new();
    h.coordinator
        .reservations()
        .hold(slot(), "someone-else")
        .await
        .unwrap();

    let err = h.coordinator.create_booking(request(5)).await.unwrap_err();
    assert!(matches!(err, BookingError::SlotConflict { .. }));
    assert_eq!(h.backend.booking_count(), 0);
    assert_eq!(
        h.authority.live_holder(&slot()).await.as_deref(),
        Some("someone-else")
    );
}

#[tokio::test]
async fn test_create_failure_releases_hold() {
    let h = TestHarness::new();
    h.backend.set_fail_on_create(true);

    let err = h.coordinator.create_booking(request(5)).await.unwrap_err();
    assert!(matches!(err, BookingError::BookingCreation { .. }));
    assert_eq!(err.category(), "booking_creation");

    assert!(h.authority.live_holder(&slot()).await.is_none());
    assert!(h.authority.committed_to(&slot()).await.is_none());

    // Someone else can take the slot straight away.
    h.backend.set_fail_on_create(false);
    assert!(h.coordinator.create_booking(request(6)).await.is_ok());
}

#[tokio::test]
async fn test_failed_release_leaves_hold_to_expire() {
    let h = TestHarness::new();
    h.backend.set_fail_on_create(true);
    h.authority.set_fail_on_release(true).await;

    let err = h.coordinator.create_booking(request(5)).await.unwrap_err();
    assert!(matches!(err, BookingError::BookingCreation { .. }));

    // The hold outlives the run until it expires.
    assert_eq!(
        h.authority.live_holder(&slot()).await.as_deref(),
        Some("customer-5")
    );
}

#[tokio::test]
async fn test_promotion_applied_after_creation() {
    let h = TestHarness::new();
    let request = BookingRequest::builder()
        .customer_id(CustomerId::new(5))
        .vehicle_id(VehicleId::new(9))
        .slot(slot())
        .service_id(ServiceId::new(3))
        .promotion_code("summer10")
        .order_amount(Money::new(500_000))
        .build();

    let outcome = h.coordinator.create_booking(request).await.unwrap();
    let BookingOutcome::Created {
        booking_id,
        promotion: Some(promotion),
        ..
    } = outcome
    else {
        panic!("expected an applied promotion");
    };
    assert_eq!(promotion.final_amount, Money::new(450_000));

    let booking = h
        .coordinator
        .bookings()
        .get_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.promotion().unwrap().code, "SUMMER10");
}

#[tokio::test]
async fn test_promotion_network_failure_keeps_booking() {
    let h = TestHarness::new();
    h.promotions.set_fail_on_apply(true);
    let request = BookingRequest::builder()
        .customer_id(CustomerId::new(5))
        .vehicle_id(VehicleId::new(9))
        .slot(slot())
        .service_id(ServiceId::new(3))
        .promotion_code("SUMMER10")
        .order_amount(Money::new(500_000))
        .build();

    let outcome = h.coordinator.create_booking(request).await.unwrap();
    assert!(!outcome.is_degraded());
    assert_eq!(outcome.warnings().len(), 1);
    assert!(outcome.warnings()[0].contains("network error"));

    let booking_id = outcome.booking_id().unwrap();
    let booking = h
        .coordinator
        .bookings()
        .get_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.status(), BookingStatus::Pending);
    assert!(booking.promotion().is_none());

    let saga = h.coordinator.get_saga(outcome.saga_id()).await.unwrap().unwrap();
    assert_eq!(saga.state(), SagaState::Completed);
}

#[tokio::test]
async fn test_promotion_without_amount_is_a_warning() {
    let h = TestHarness::new();
    let request = BookingRequest::builder()
        .customer_id(CustomerId::new(5))
        .vehicle_id(VehicleId::new(9))
        .slot(slot())
        .service_id(ServiceId::new(3))
        .promotion_code("SUMMER10")
        .build();

    let outcome = h.coordinator.create_booking(request).await.unwrap();
    assert!(outcome.booking_id().is_some());
    assert_eq!(outcome.warnings().len(), 1);
    assert!(h.promotions.applied().is_empty());
}

#[tokio::test]
async fn test_response_without_id_is_degraded_success() {
    let h = TestHarness::new();
    h.backend.set_response_shape(ResponseShape::WithoutId);

    let outcome = h.coordinator.create_booking(request(5)).await.unwrap();
    assert!(outcome.is_degraded());
    assert_eq!(outcome.booking_id(), None);

    let saga = h.coordinator.get_saga(outcome.saga_id()).await.unwrap().unwrap();
    assert_eq!(saga.state(), SagaState::Degraded);

    // The backend has the booking, so the slot stays taken.
    assert!(h.authority.committed_to(&slot()).await.is_some());
}

#[tokio::test]
async fn test_alternate_response_shapes_are_parsed() {
    for shape in [ResponseShape::TopLevel, ResponseShape::StringId] {
        let h = TestHarness::new();
        h.backend.set_response_shape(shape);

        let outcome = h.coordinator.create_booking(request(5)).await.unwrap();
        assert!(!outcome.is_degraded(), "{shape:?} should be parsed");
        assert_eq!(outcome.booking_id().map(|id| id.get()), Some(1001));
    }
}

#[tokio::test]
async fn test_validation_fails_before_anything_happens() {
    let h = TestHarness::new();
    let request = BookingRequest::builder()
        .customer_id(CustomerId::new(5))
        .service_id(ServiceId::new(3))
        .build();

    let err = h.coordinator.create_booking(request).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::Validation { ref missing } if missing.len() == 5
    ));
    assert!(h.authority.live_holder(&slot()).await.is_none());
    assert_eq!(h.backend.booking_count(), 0);
}

#[tokio::test]
async fn test_second_run_by_same_holder_conflicts() {
    let h = TestHarness::new();
    // An earlier run by the same customer still holds the slot.
    let earlier = h
        .coordinator
        .reservations()
        .hold(slot(), "customer-5")
        .await
        .unwrap();

    let err = h.coordinator.create_booking(request(5)).await.unwrap_err();
    assert!(matches!(err, BookingError::SlotConflict { .. }));
    assert_eq!(h.backend.booking_count(), 0);

    // The losing run did not free the earlier run's hold.
    assert_eq!(
        h.coordinator.reservations().status(&earlier).await,
        Some(HoldStatus::Live)
    );
    assert_eq!(
        h.authority.live_holder(&slot()).await.as_deref(),
        Some("customer-5")
    );
}

#[tokio::test]
async fn test_guest_checkout_end_to_end() {
    let directory = InMemoryCustomerDirectory::new();
    let registry = InMemoryVehicleRegistry::new();
    let h = TestHarness::new();
    let checkout = BookingCheckout::new(
        IdentityResolver::new(directory.clone()),
        VehicleResolver::new(registry.clone()),
        h.coordinator,
    );

    let submission = CheckoutSubmission {
        customer: CustomerMode::Guest(GuestContact {
            full_name: "Nguyễn Văn A".to_string(),
            phone: "0901234567".to_string(),
            email: None,
        }),
        session_token: Some("chk-1".to_string()),
        license_plate: "51a-123.45".to_string(),
        vehicle: VehicleHints::default(),
        center_id: Some(CenterId::new(1)),
        technician_id: Some(TechnicianId::new(7)),
        technician_slot_id: Some(TechnicianSlotId::new(42)),
        date: NaiveDate::from_ymd_opt(2024, 5, 1),
        service_id: Some(ServiceId::new(3)),
        notes: Some("brakes squeak".to_string()),
        promotion_code: None,
        order_amount: None,
    };

    let outcome = checkout.submit(submission.clone()).await.unwrap();
    let booking_id = outcome.booking_id().unwrap();
    assert_eq!(directory.customer_count(), 1);
    assert_eq!(registry.vehicle_count(), 1);

    let booking = checkout
        .coordinator()
        .bookings()
        .get_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.notes(), Some("brakes squeak"));

    // A resubmission reuses the guest and runs into the booked slot.
    let err = checkout.submit(submission).await.unwrap_err();
    assert!(matches!(err, BookingError::SlotConflict { .. }));
    assert_eq!(directory.customer_count(), 1);
}

#[tokio::test]
async fn test_checkout_identity_failure_holds_nothing() {
    let directory = InMemoryCustomerDirectory::new();
    directory.set_fail_on_quick_create(true);
    directory.set_fail_on_create(true);
    let h = TestHarness::new();
    let authority = h.authority.clone();
    let checkout = BookingCheckout::new(
        IdentityResolver::new(directory),
        VehicleResolver::new(InMemoryVehicleRegistry::new()),
        h.coordinator,
    );

    let submission = CheckoutSubmission {
        customer: CustomerMode::Guest(GuestContact {
            full_name: "Nguyễn Văn A".to_string(),
            phone: "0901234567".to_string(),
            email: Some("a@example.com".to_string()),
        }),
        session_token: None,
        license_plate: "51A-123.45".to_string(),
        vehicle: VehicleHints::default(),
        center_id: Some(CenterId::new(1)),
        technician_id: Some(TechnicianId::new(7)),
        technician_slot_id: Some(TechnicianSlotId::new(42)),
        date: NaiveDate::from_ymd_opt(2024, 5, 1),
        service_id: Some(ServiceId::new(3)),
        notes: None,
        promotion_code: None,
        order_amount: None,
    };

    let err = checkout.submit(submission).await.unwrap_err();
    assert_eq!(err.category(), "identity");
    assert!(authority.live_holder(&slot()).await.is_none());
}

/// Event store that refuses appends of one event type.
#[derive(Clone, Default)]
struct RefusingStore {
    inner: InMemoryEventStore,
    refused: Arc<Mutex<Option<&'static str>>>,
}

impl RefusingStore {
    fn refuse(&self, event_type: &'static str) {
        *self.refused.lock().unwrap() = Some(event_type);
    }
}

#[async_trait]
impl EventStore for RefusingStore {
    async fn append(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> event_store::Result<Version> {
        let refused = *self.refused.lock().unwrap();
        if let Some(event_type) = refused
            && events.iter().any(|e| e.event_type == event_type)
        {
            return Err(EventStoreError::InvalidAppend("disk full".to_string()));
        }
        self.inner.append(events, options).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.get_events_for_aggregate(aggregate_id).await
    }

    async fn get_events_by_type(&self, event_type: &str) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.get_events_by_type(event_type).await
    }

    async fn get_aggregate_version(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Option<Version>> {
        self.inner.get_aggregate_version(aggregate_id).await
    }
}

fn refusing_coordinator(
    store: RefusingStore,
    authority: InMemorySlotAuthority,
    backend: InMemoryBookingGateway,
) -> BookingSagaCoordinator<
    RefusingStore,
    InMemorySlotAuthority,
    InMemoryBookingGateway,
    InMemoryPromotionGateway,
> {
    BookingSagaCoordinator::new(
        store,
        authority,
        backend,
        InMemoryPromotionGateway::new(),
        Duration::minutes(15),
    )
}

#[tokio::test]
async fn test_bookkeeping_failure_after_hold_releases_slot() {
    let store = RefusingStore::default();
    let authority = InMemorySlotAuthority::new();
    let backend = InMemoryBookingGateway::new();
    store.refuse("StepCompleted");
    let coordinator = refusing_coordinator(store, authority.clone(), backend.clone());

    let err = coordinator.create_booking(request(5)).await.unwrap_err();
    assert!(matches!(err, BookingError::Saga(_)));
    assert_eq!(backend.booking_count(), 0);
    assert!(authority.live_holder(&slot()).await.is_none());
    assert!(authority.committed_to(&slot()).await.is_none());
}

#[tokio::test]
async fn test_bookkeeping_failure_after_creation_keeps_slot_booked() {
    let store = RefusingStore::default();
    let authority = InMemorySlotAuthority::new();
    let backend = InMemoryBookingGateway::new();
    store.refuse("SagaCompleted");
    let coordinator = refusing_coordinator(store, authority.clone(), backend.clone());

    let err = coordinator.create_booking(request(5)).await.unwrap_err();
    assert!(matches!(err, BookingError::Saga(_)));

    // The backend has the booking, so its slot is not handed back.
    assert_eq!(backend.booking_count(), 1);
    assert_eq!(
        authority.committed_to(&slot()).await.as_deref(),
        Some("customer-5")
    );
}
