//! Booking service entry point.

use std::sync::Arc;

use booking::{BookingStore, InMemoryBookingStore, PostgresBookingStore};
use booking_api::config::Config;
use common::settings::database_connect_policy;
use common::{
    connect_with_retry, init_tracing, run_until_shutdown, shutdown_channel, shutdown_signal,
};
use event_bus::{EventBus, InMemoryEventBus};
use metrics_exporter_prometheus::PrometheusHandle;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Initialize tracing
    let config = Config::from_env();
    init_tracing(&config.log_level, config.log_format);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Connect the event bus
    let bus = connect_bus(&config)?;

    // 4. Open the store and serve until shutdown
    match config.database_url.clone() {
        Some(url) => {
            let pool = connect_with_retry(&url, 10, &database_connect_policy()).await?;
            let store = PostgresBookingStore::new(pool.clone());
            store.run_migrations().await?;
            tracing::info!("booking migrations applied");

            serve(config, store, bus, metrics_handle).await?;
            pool.close().await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, bookings are kept in memory");
            serve(config, InMemoryBookingStore::new(), bus, metrics_handle).await?;
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[cfg(feature = "kafka")]
fn connect_bus(config: &Config) -> Result<Arc<dyn EventBus>, BoxError> {
    match &config.kafka_brokers {
        Some(brokers) => {
            let bus = event_bus::KafkaEventBus::builder()
                .brokers(brokers.as_str())
                .timeout(config.publish_timeout)
                .build()?;
            Ok(Arc::new(bus))
        }
        None => Ok(Arc::new(InMemoryEventBus::new())),
    }
}

#[cfg(not(feature = "kafka"))]
fn connect_bus(config: &Config) -> Result<Arc<dyn EventBus>, BoxError> {
    if config.kafka_brokers.is_some() {
        return Err("KAFKA_BROKERS is set but this binary was built without the `kafka` feature".into());
    }
    Ok(Arc::new(InMemoryEventBus::new()))
}

async fn serve<S: BookingStore + 'static>(
    config: Config,
    store: S,
    bus: Arc<dyn EventBus>,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let state = booking_api::create_state(store, bus.clone(), config.publish_timeout);
    let coordinator = state.coordinator.clone();
    let (shutdown_handle, shutdown) = shutdown_channel();
    let policy = config.consumer.policy();

    // 5. Start consumers
    let mut consumers = booking_api::spawn_outcome_consumers(
        coordinator.clone(),
        bus.clone(),
        policy.clone(),
        shutdown.clone(),
    );
    if config.is_standalone() {
        consumers.push(booking_api::spawn_embedded_payments(
            bus.clone(),
            config.publish_timeout,
            config.payment_decline_above,
            policy,
            shutdown.clone(),
        ));
    }
    let reconciler = config.reconcile_interval.map(|interval| {
        tracing::info!(?interval, age = ?config.reconcile_age, "reconciliation enabled");
        booking_api::spawn_reconciler(
            coordinator.clone(),
            interval,
            config.reconcile_age,
            shutdown.clone(),
        )
    });

    // 6. Serve HTTP until a signal arrives; in-flight requests get the grace period
    let app = booking_api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, standalone = config.is_standalone(), "starting booking service");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let (http_handle, http_shutdown) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        http_handle.trigger();
    });
    let stop = http_shutdown.clone();
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.wait().await })
            .await
    };
    run_until_shutdown(server, &http_shutdown, config.shutdown_grace).await?;

    // 7. Stop consumers after their in-flight message, then drain publishes
    shutdown_handle.trigger();
    let grace = config.shutdown_grace;
    let stopped = tokio::time::timeout(grace, async {
        for consumer in consumers {
            match consumer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "consumer ended with error"),
                Err(e) => tracing::error!(error = %e, "consumer task panicked"),
            }
        }
        if let Some(reconciler) = reconciler {
            let _ = reconciler.await;
        }
    })
    .await;
    if stopped.is_err() {
        tracing::warn!(?grace, "consumers still busy after grace period");
    }
    coordinator.publisher().drain(grace).await;

    Ok(())
}
