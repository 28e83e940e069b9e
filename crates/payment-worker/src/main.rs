//! Payment service entry point.

use std::sync::Arc;

use common::settings::database_connect_policy;
use common::{
    connect_with_retry, init_tracing, run_until_shutdown, shutdown_channel, shutdown_signal,
};
use event_bus::{EventBus, InMemoryEventBus};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::{InMemoryPaymentStore, PaymentProcessor, PaymentStore, PostgresPaymentStore};
use payment_worker::config::Config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();
    init_tracing(&config.log_level, config.log_format);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    let bus = connect_bus(&config)?;

    match config.database_url.clone() {
        Some(url) => {
            let pool = connect_with_retry(&url, 10, &database_connect_policy()).await?;
            let store = PostgresPaymentStore::new(pool.clone());
            store.run_migrations().await?;
            tracing::info!("payment migrations applied");

            serve(config, store, bus, metrics_handle).await?;
            pool.close().await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, payments are kept in memory");
            serve(config, InMemoryPaymentStore::new(), bus, metrics_handle).await?;
        }
    }

    tracing::info!("payment service shut down gracefully");
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
        None => {
            tracing::warn!("KAFKA_BROKERS not set, no booking events will arrive");
            Ok(Arc::new(InMemoryEventBus::new()))
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn connect_bus(config: &Config) -> Result<Arc<dyn EventBus>, BoxError> {
    if config.kafka_brokers.is_some() {
        return Err("KAFKA_BROKERS is set but this binary was built without the `kafka` feature".into());
    }
    tracing::warn!("built without Kafka support, no booking events will arrive");
    Ok(Arc::new(InMemoryEventBus::new()))
}

async fn serve<S: PaymentStore + 'static>(
    config: Config,
    store: S,
    bus: Arc<dyn EventBus>,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let processor = Arc::new(PaymentProcessor::simulated(
        store,
        bus.clone(),
        config.publish_timeout,
        config.decline_above,
    ));
    let (shutdown_handle, shutdown) = shutdown_channel();
    let consumer = payment_worker::spawn_booking_consumer(
        processor,
        bus,
        config.consumer.policy(),
        shutdown,
    );

    let app = payment_worker::create_app(metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting payment service");
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

    // The in-flight payment finishes and publishes before the consumer returns.
    shutdown_handle.trigger();
    let grace = config.shutdown_grace;
    match tokio::time::timeout(grace, consumer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "consumer ended with error"),
        Ok(Err(e)) => tracing::error!(error = %e, "consumer task panicked"),
        Err(_) => tracing::warn!(?grace, "consumer still busy after grace period"),
    }

    Ok(())
}
