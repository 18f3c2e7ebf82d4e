//! Integration tests for the API server.

use std::sync::OnceLock;

use api::InMemoryBackend;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::ResponseShape;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| api::routes::metrics::install().expect("failed to install Prometheus recorder"))
        .clone()
}

fn setup() -> (axum::Router, InMemoryBackend) {
    let backend = InMemoryBackend::with_demo_data();
    let state = api::create_state(InMemoryEventStore::new(), &backend, Duration::minutes(15));
    let app = api::create_app(state, get_metrics_handle());
    (app, backend)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn guest_submission(phone: &str, session: &str) -> Value {
    json!({
        "customer": {
            "mode": "guest",
            "fullName": "Nguyễn Văn A",
            "phone": phone
        },
        "sessionToken": session,
        "licensePlate": "51A-123.45",
        "vehicle": { "mileage": 12000 },
        "centerId": 1,
        "technicianId": 7,
        "technicianSlotId": 42,
        "date": "2024-05-01",
        "serviceId": 3,
        "notes": "oil change"
    })
}

async fn create_booking(app: &axum::Router) -> u64 {
    let (status, body) = send(app, "POST", "/bookings", Some(guest_submission("0901234567", "chk-1"))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["bookingId"].as_u64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "booking-core");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();
    create_booking(&app).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("booking_saga_completed_total"));
}

#[tokio::test]
async fn test_guest_checkout_creates_pending_booking() {
    let (app, backend) = setup();

    let (status, body) = send(&app, "POST", "/bookings", Some(guest_submission("0901234567", "chk-1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["outcome"], "created");
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["bookingId"], 1001);
    assert!(body["sagaId"].is_string());

    assert_eq!(backend.customers.customer_count(), 1);
    assert_eq!(backend.vehicles.vehicle_count(), 1);

    let (status, booking) = send(&app, "GET", "/bookings/1001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "PENDING");
    assert_eq!(booking["notes"], "oil change");
    assert_eq!(booking["slot"]["technicianSlotId"], 42);
    assert_eq!(booking["allowedTransitions"], json!(["CONFIRMED", "CANCELLED"]));
}

#[tokio::test]
async fn test_checkout_with_promotion() {
    let (app, _) = setup();
    let mut submission = guest_submission("0901234567", "chk-1");
    submission["promotionCode"] = json!("welcome10");
    submission["orderAmount"] = json!(500_000);

    let (status, body) = send(&app, "POST", "/bookings", Some(submission)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["promotion"]["code"], "WELCOME10");
    assert_eq!(body["promotion"]["finalAmount"], 450_000);

    let (_, booking) = send(&app, "GET", "/bookings/1001", None).await;
    assert_eq!(booking["promotion"]["discountAmount"], 50_000);
}

#[tokio::test]
async fn test_missing_fields_are_listed() {
    let (app, _) = setup();
    let mut submission = guest_submission("0901234567", "chk-1");
    submission.as_object_mut().unwrap().remove("date");
    submission.as_object_mut().unwrap().remove("serviceId");

    let (status, body) = send(&app, "POST", "/bookings", Some(submission)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");
    assert_eq!(body["error"], "Booking request is missing: date, serviceId");
}

#[tokio::test]
async fn test_guest_without_phone_is_unprocessable() {
    let (app, _) = setup();

    let (status, body) = send(&app, "POST", "/bookings", Some(guest_submission(" ", "chk-1"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["category"], "identity");
}

#[tokio::test]
async fn test_second_guest_on_same_slot_gets_conflict() {
    let (app, _) = setup();
    create_booking(&app).await;

    let (status, body) = send(&app, "POST", "/bookings", Some(guest_submission("0912345678", "chk-2"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["category"], "slot_conflict");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_backend_failure_is_bad_gateway_and_frees_slot() {
    let (app, backend) = setup();
    backend.bookings.set_fail_on_create(true);

    let (status, body) = send(&app, "POST", "/bookings", Some(guest_submission("0901234567", "chk-1"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["category"], "booking_creation");

    backend.bookings.set_fail_on_create(false);
    let (status, _) = send(&app, "POST", "/bookings", Some(guest_submission("0912345678", "chk-2"))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_response_without_id_is_accepted_as_degraded() {
    let (app, backend) = setup();
    backend.bookings.set_response_shape(ResponseShape::WithoutId);

    let (status, body) = send(&app, "POST", "/bookings", Some(guest_submission("0901234567", "chk-1"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "degraded");
    assert!(body["bookingId"].is_null());

    let saga_id = body["sagaId"].as_str().unwrap();
    let (status, saga) = send(&app, "GET", &format!("/sagas/{saga_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saga["state"], "Degraded");
}

#[tokio::test]
async fn test_status_lifecycle() {
    let (app, backend) = setup();
    let id = create_booking(&app).await;
    let uri = format!("/bookings/{id}/status");

    let (status, receipt) = send(&app, "POST", &uri, Some(json!({ "status": "confirmed", "actor": "admin" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["from"], "PENDING");
    assert_eq!(receipt["to"], "CONFIRMED");
    assert_eq!(receipt["actor"], "admin");

    // Skipping IN_PROGRESS and COMPLETED is refused.
    let (status, body) = send(&app, "POST", &uri, Some(json!({ "status": "PAID" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["category"], "illegal_transition");

    for target in ["IN_PROGRESS", "COMPLETED", "PAID"] {
        let (status, _) = send(&app, "POST", &uri, Some(json!({ "status": target }))).await;
        assert_eq!(status, StatusCode::OK, "transition to {target}");
    }

    let (_, booking) = send(&app, "GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(booking["status"], "PAID");
    assert_eq!(booking["allowedTransitions"], json!([]));

    // Terminal: nothing moves a paid booking.
    let (status, _) = send(&app, "POST", &uri, Some(json!({ "status": "CANCELLED" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(backend.statuses.calls().len(), 4);
}

#[tokio::test]
async fn test_unknown_status_is_bad_request() {
    let (app, _) = setup();
    let id = create_booking(&app).await;

    let (status, body) = send(&app, "POST", &format!("/bookings/{id}/status"), Some(json!({ "status": "SHIPPED" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown booking status 'SHIPPED'");
}

#[tokio::test]
async fn test_remote_conflict_leaves_status_unchanged() {
    let (app, backend) = setup();
    let id = create_booking(&app).await;
    backend.statuses.set_conflict(true);

    let (status, body) = send(&app, "POST", &format!("/bookings/{id}/status"), Some(json!({ "status": "CONFIRMED" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["category"], "remote_rejected");

    let (_, booking) = send(&app, "GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(booking["status"], "PENDING");
}

#[tokio::test]
async fn test_booking_events() {
    let (app, _) = setup();
    let id = create_booking(&app).await;
    send(&app, "POST", &format!("/bookings/{id}/status"), Some(json!({ "status": "CANCELLED", "actor": "customer" }))).await;

    let (status, events) = send(&app, "GET", &format!("/bookings/{id}/events"), None).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["eventType"], "BookingRegistered");
    assert_eq!(events[1]["eventType"], "StatusChanged");
    assert_eq!(events[1]["actor"], "customer");
    assert_eq!(events[1]["version"], 2);
}

#[tokio::test]
async fn test_saga_status() {
    let (app, _) = setup();
    let (_, body) = send(&app, "POST", "/bookings", Some(guest_submission("0901234567", "chk-1"))).await;
    let saga_id = body["sagaId"].as_str().unwrap();

    let (status, saga) = send(&app, "GET", &format!("/sagas/{saga_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saga["state"], "Completed");
    assert_eq!(saga["sagaType"], "BookingCreation");
    assert_eq!(saga["completedSteps"], json!(["hold_slot", "create_booking"]));
    assert_eq!(saga["bookingId"], 1001);
}

#[tokio::test]
async fn test_not_found_and_bad_ids() {
    let (app, _) = setup();

    let (status, _) = send(&app, "GET", "/bookings/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/bookings/999/events", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/bookings/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/bookings/999/status", Some(json!({ "status": "CONFIRMED" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/sagas/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/sagas/00000000-0000-0000-0000-000000000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
