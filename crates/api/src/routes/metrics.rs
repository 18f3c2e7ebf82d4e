//! Prometheus metrics: recorder setup and the scrape endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Saga runs take one remote round trip per step, so buckets stop at 30s.
const SAGA_DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Installs the global Prometheus recorder and describes the booking metrics.
///
/// Fails if a recorder is already installed for this process.
pub fn install() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            SAGA_DURATION_BUCKETS,
        )?
        .install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    describe_counter!("booking_saga_started_total", "Booking saga runs started");
    describe_counter!(
        "booking_saga_completed_total",
        "Booking saga runs that created and registered a booking"
    );
    describe_counter!(
        "booking_saga_degraded_total",
        "Booking saga runs whose booking could not be confirmed"
    );
    describe_counter!(
        "booking_saga_failed_total",
        "Booking saga runs that ended without a booking, by reason"
    );
    describe_histogram!(
        "booking_saga_duration_seconds",
        "Wall time of a booking saga run"
    );
    describe_counter!(
        "slot_hold_conflicts_total",
        "Hold requests refused because the slot was already held"
    );
    describe_counter!(
        "promotion_failures_total",
        "Promotion codes that could not be applied to a new booking"
    );
    describe_counter!(
        "booking_status_transitions_total",
        "Accepted booking status changes, by source and target status"
    );
    describe_counter!(
        "booking_status_rejections_total",
        "Refused booking status changes, by reason"
    );
}

/// GET /metrics
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
