//! Booking service: HTTP API plus the consumers that settle bookings.
//!
//! Provides REST endpoints for creating and reading bookings, with
//! structured logging (tracing) and Prometheus metrics. Payment outcomes
//! arrive over the event bus and are applied by supervised consumers.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use booking::{BookingCoordinator, BookingStore, InMemoryBookingStore, PaymentOutcomeHandler};
use common::{Money, RetryPolicy, Shutdown, consumer_groups, topics};
use event_bus::{EventBus, EventPublisher, Subscription, spawn_supervised};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::{BookingCreatedHandler, InMemoryPaymentStore, PaymentProcessor};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::bookings::AppState;

/// Handle of a supervised consumer task.
pub type ConsumerTask = JoinHandle<event_bus::Result<()>>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: BookingStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/bookings",
            get(routes::bookings::list::<S>).post(routes::bookings::create::<S>),
        )
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
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

/// Builds the coordinator for `store`, publishing through `bus`.
///
/// A lost `booking.created` leaves the booking PENDING; the failure callback
/// logs which booking needs reconciling.
pub fn create_state<S: BookingStore + 'static>(
    store: S,
    bus: Arc<dyn EventBus>,
    publish_timeout: Duration,
) -> Arc<AppState<S>> {
    let publisher = EventPublisher::new(bus, publish_timeout).with_failure_callback(|failure| {
        tracing::warn!(
            booking_id = %failure.key,
            error = %failure.error,
            "booking announcement lost, booking stays PENDING until republished"
        );
    });

    Arc::new(AppState {
        coordinator: Arc::new(BookingCoordinator::new(store, publisher)),
    })
}

/// Creates the default application state with an in-memory store.
pub fn create_default_state(
    bus: Arc<dyn EventBus>,
) -> Arc<AppState<InMemoryBookingStore>> {
    create_state(InMemoryBookingStore::new(), bus, Duration::from_secs(5))
}

/// Starts one supervised consumer per payment outcome topic.
pub fn spawn_outcome_consumers<S: BookingStore + 'static>(
    coordinator: Arc<BookingCoordinator<S>>,
    bus: Arc<dyn EventBus>,
    policy: RetryPolicy,
    shutdown: Shutdown,
) -> Vec<ConsumerTask> {
    let handler = Arc::new(PaymentOutcomeHandler::new(coordinator));

    [topics::PAYMENT_SUCCESS, topics::PAYMENT_FAILED]
        .into_iter()
        .map(|topic| {
            spawn_supervised(
                bus.clone(),
                Subscription::new(topic, consumer_groups::BOOKING_SERVICE),
                handler.clone(),
                policy.clone(),
                shutdown.clone(),
            )
        })
        .collect()
}

/// Runs a payment processor inside this process, for deployments without a broker.
///
/// It joins the payment service's consumer group on the shared in-memory bus
/// and keeps its payment records in memory.
pub fn spawn_embedded_payments(
    bus: Arc<dyn EventBus>,
    publish_timeout: Duration,
    decline_above: Option<Money>,
    policy: RetryPolicy,
    shutdown: Shutdown,
) -> ConsumerTask {
    let processor = Arc::new(PaymentProcessor::simulated(
        InMemoryPaymentStore::new(),
        bus.clone(),
        publish_timeout,
        decline_above,
    ));

    tracing::info!("running embedded payment processor");
    spawn_supervised(
        bus,
        Subscription::new(topics::BOOKING_CREATED, consumer_groups::PAYMENT_SERVICE),
        Arc::new(BookingCreatedHandler::new(processor)),
        policy,
        shutdown,
    )
}

/// Periodically republishes `booking.created` for bookings stuck in PENDING.
pub fn spawn_reconciler<S: BookingStore + 'static>(
    coordinator: Arc<BookingCoordinator<S>>,
    interval: Duration,
    age: Duration,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup is quiet.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if let Err(e) = coordinator.republish_pending(age).await {
                        tracing::error!(error = %e, "reconciliation pass failed");
                    }
                }
            }
        }
        tracing::debug!("reconciler stopped");
    })
}
