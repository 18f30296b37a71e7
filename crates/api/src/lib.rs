//! HTTP API server with observability for the booking platform.
//!
//! Provides REST endpoints for payment initiation, session booking, and
//! cancellation, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use gateway::{InMemoryCalendarGateway, InMemoryPaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{BookingOrchestrator, CancellationOrchestrator, LogNotifier};
use store::{InMemoryPaymentStore, InMemorySessionStore, InMemoryUserDirectory};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::sessions::{
    AppState, DynCalendarGateway, DynNotificationSink, DynPaymentGateway, DynPaymentStore,
    DynSessionStore, DynUserDirectory,
};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/payments/initiate", post(routes::payments::initiate))
        .route("/payments/{transaction_id}/status", get(routes::payments::status))
        .route("/sessions", post(routes::sessions::book))
        .route("/sessions/{id}", get(routes::sessions::get))
        .route("/sessions/{id}/cancel", post(routes::sessions::cancel))
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

/// Handles onto the in-memory backends behind a default [`AppState`],
/// for seeding and inspection.
pub struct InMemoryBackends {
    pub users: InMemoryUserDirectory,
    pub sessions: InMemorySessionStore,
    pub payments: InMemoryPaymentStore,
    pub calendar: InMemoryCalendarGateway,
    pub payment_gateway: InMemoryPaymentGateway,
}

/// Creates application state over in-memory stores and gateways.
pub fn create_default_state(call_timeout: Duration) -> (Arc<AppState>, InMemoryBackends) {
    let backends = InMemoryBackends {
        users: InMemoryUserDirectory::new(),
        sessions: InMemorySessionStore::new(),
        payments: InMemoryPaymentStore::new(),
        calendar: InMemoryCalendarGateway::new(),
        payment_gateway: InMemoryPaymentGateway::new(),
    };

    let users: DynUserDirectory = Arc::new(backends.users.clone());
    let sessions: DynSessionStore = Arc::new(backends.sessions.clone());
    let payments: DynPaymentStore = Arc::new(backends.payments.clone());
    let calendar: DynCalendarGateway = Arc::new(backends.calendar.clone());
    let payment_gateway: DynPaymentGateway = Arc::new(backends.payment_gateway.clone());
    let notifier: DynNotificationSink = Arc::new(LogNotifier);

    let state = Arc::new(AppState {
        booking: BookingOrchestrator::new(
            users,
            sessions.clone(),
            payments.clone(),
            calendar.clone(),
            payment_gateway.clone(),
            notifier.clone(),
        )
        .with_call_timeout(call_timeout),
        cancellation: CancellationOrchestrator::new(
            sessions.clone(),
            payments.clone(),
            calendar,
            payment_gateway.clone(),
            notifier,
        )
        .with_call_timeout(call_timeout),
        sessions,
        payments,
        payment_gateway,
    });

    (state, backends)
}
