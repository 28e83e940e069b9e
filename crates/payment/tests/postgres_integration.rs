//! PostgreSQL integration tests for the payment store.
//!
//! Needs Docker. Run with:
//!
//! ```bash
//! cargo test -p payment --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{BookingCreated, BookingId, Money, PaymentStatus};
use event_bus::{EventPublisher, InMemoryEventBus};
use payment::{
    Payment, PaymentProcessor, PaymentStore, PostgresPaymentStore, SimulatedAuthorizer,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = sqlx::PgPool::connect(&connection_string).await.unwrap();
            PostgresPaymentStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresPaymentStore {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();
    PostgresPaymentStore::new(pool)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn create_and_list_by_booking() {
    let store = get_test_store().await;
    let booking_id = BookingId::new();
    let payment = Payment::new(booking_id, Money::from_cents(19999), PaymentStatus::Success);

    store.create(&payment).await.unwrap();
    let listed = store.list_by_booking(booking_id).await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, payment.id);
    assert_eq!(listed[0].amount, Money::from_cents(19999));
    assert_eq!(listed[0].status, PaymentStatus::Success);
    assert_eq!(listed[0].transaction_id, format!("txn_{booking_id}"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn double_delivery_writes_two_rows() {
    let store = get_test_store().await;
    let bus = InMemoryEventBus::new();
    let processor = PaymentProcessor::new(
        store.clone(),
        SimulatedAuthorizer::new(),
        EventPublisher::new(Arc::new(bus), Duration::from_secs(1)),
    );
    let event = BookingCreated {
        booking_id: BookingId::new(),
        user_id: "u1".to_string(),
        resource_id: "r1".to_string(),
        total_amount: Money::from_cents(1000),
    };

    processor.on_booking_created(&event).await.unwrap();
    processor.on_booking_created(&event).await.unwrap();

    assert_eq!(store.list_by_booking(event.booking_id).await.unwrap().len(), 2);
}
