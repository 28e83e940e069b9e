//! Payment service: consumes `booking.created` and answers with a payment outcome.
//!
//! The HTTP surface is limited to health and Prometheus metrics.

pub mod config;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::{RetryPolicy, Shutdown, consumer_groups, topics};
use event_bus::{EventBus, Subscription, spawn_supervised};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::{BookingCreatedHandler, PaymentProcessor, PaymentStore, SimulatedAuthorizer};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Creates the router for the health and metrics endpoints.
pub fn create_app(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle)
        .layer(TraceLayer::new_for_http())
}

/// Starts the supervised `booking.created` consumer in the payment service group.
pub fn spawn_booking_consumer<S: PaymentStore + 'static>(
    processor: Arc<PaymentProcessor<S, SimulatedAuthorizer>>,
    bus: Arc<dyn EventBus>,
    policy: RetryPolicy,
    shutdown: Shutdown,
) -> JoinHandle<event_bus::Result<()>> {
    spawn_supervised(
        bus,
        Subscription::new(topics::BOOKING_CREATED, consumer_groups::PAYMENT_SERVICE),
        Arc::new(BookingCreatedHandler::new(processor)),
        policy,
        shutdown,
    )
}
