//! HTTP API server for the service-center booking core.
//!
//! Provides REST endpoints for booking checkout, booking lookup, status
//! transitions and saga inspection, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::Duration;
use domain::{InMemoryBookingStatusGateway, Money, StatusTransitionEngine};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    BookingCheckout, BookingSagaCoordinator, IdentityResolver, InMemoryBookingGateway,
    InMemoryCustomerDirectory, InMemoryPromotionGateway, InMemorySlotAuthority,
    InMemoryVehicleRegistry, VehicleResolver,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::bookings::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/bookings", post(routes::bookings::create::<S>))
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
        .route(
            "/bookings/{id}/status",
            post(routes::bookings::change_status::<S>),
        )
        .route("/bookings/{id}/events", get(routes::bookings::events::<S>))
        .route("/sagas/{id}", get(routes::sagas::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Handles to the in-memory stand-ins for the remote backend.
///
/// Clones share state with the services wired into [`AppState`], so tests can
/// seed data and inject failures after the app is built.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    pub customers: InMemoryCustomerDirectory,
    pub vehicles: InMemoryVehicleRegistry,
    pub slots: InMemorySlotAuthority,
    pub bookings: InMemoryBookingGateway,
    pub promotions: InMemoryPromotionGateway,
    pub statuses: InMemoryBookingStatusGateway,
}

impl InMemoryBackend {
    /// A backend with one promotion code, `WELCOME10`.
    pub fn with_demo_data() -> Self {
        let backend = Self::default();
        backend
            .promotions
            .add_percentage_code("WELCOME10", 10, Money::new(200_000), 1_000);
        backend
    }
}

/// Wires the checkout flow and the transition engine onto one event store.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    backend: &InMemoryBackend,
    hold_ttl: Duration,
) -> Arc<AppState<S>> {
    let coordinator = BookingSagaCoordinator::new(
        event_store.clone(),
        backend.slots.clone(),
        backend.bookings.clone(),
        backend.promotions.clone(),
        hold_ttl,
    );
    let checkout = BookingCheckout::new(
        IdentityResolver::new(backend.customers.clone()),
        VehicleResolver::new(backend.vehicles.clone()),
        coordinator,
    );
    let transitions = StatusTransitionEngine::new(event_store, backend.statuses.clone());

    Arc::new(AppState {
        checkout,
        transitions,
    })
}

/// Creates the default application state backed by the demo backend.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> (Arc<AppState<S>>, InMemoryBackend) {
    let backend = InMemoryBackend::with_demo_data();
    let state = create_state(event_store, &backend, config.hold_ttl());
    (state, backend)
}
