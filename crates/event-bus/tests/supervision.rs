//! Supervised consumers running against the in-memory bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{BookingCreated, BookingId, Money, RetryPolicy, shutdown_channel, topics};
use event_bus::{
    EventBus, EventPublisher, HandlerError, InMemoryEventBus, Message, MessageHandler,
    Subscription, spawn_supervised,
};

#[derive(Default)]
struct Recorder {
    keys: tokio::sync::Mutex<Vec<String>>,
    handled: AtomicUsize,
}

#[async_trait]
impl MessageHandler for Recorder {
    fn name(&self) -> &'static str {
        "Recorder"
    }

    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let event: BookingCreated = message.decode()?;
        self.keys.lock().await.push(event.booking_id.to_string());
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn booking_created() -> BookingCreated {
    BookingCreated {
        booking_id: BookingId::new(),
        user_id: "u1".to_string(),
        resource_id: "r1".to_string(),
        total_amount: Money::from_cents(5_000),
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(Some(5))
        .with_delays(Duration::from_millis(5), Duration::from_millis(50))
        .with_jitter(0.0)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_supervisor_restarts_after_receive_failure() {
    let bus = InMemoryEventBus::new();
    let publisher = EventPublisher::new(Arc::new(bus.clone()), Duration::from_secs(1));
    let recorder = Arc::new(Recorder::default());
    let (handle, shutdown) = shutdown_channel();

    let task = spawn_supervised(
        Arc::new(bus.clone()),
        Subscription::new(topics::BOOKING_CREATED, "test-group"),
        recorder.clone(),
        fast_policy(),
        shutdown,
    );

    let first = booking_created();
    publisher.publish(&first).await.unwrap();
    wait_until(|| recorder.handled.load(Ordering::SeqCst) == 1).await;

    bus.fail_next_receive(topics::BOOKING_CREATED).await;
    let second = booking_created();
    publisher.publish(&second).await.unwrap();
    wait_until(|| recorder.handled.load(Ordering::SeqCst) == 2).await;

    handle.trigger();
    assert!(task.await.unwrap().is_ok());

    let keys = recorder.keys.lock().await.clone();
    assert_eq!(
        keys,
        vec![first.booking_id.to_string(), second.booking_id.to_string()]
    );
    assert_eq!(bus.lag(topics::BOOKING_CREATED, "test-group").await, 0);
}

#[tokio::test]
async fn test_undecodable_message_is_skipped() {
    let bus = InMemoryEventBus::new();
    let recorder = Arc::new(Recorder::default());
    let (handle, shutdown) = shutdown_channel();

    bus.publish(topics::BOOKING_CREATED, "k", b"not json".to_vec())
        .await
        .unwrap();
    let good = booking_created();
    EventPublisher::new(Arc::new(bus.clone()), Duration::from_secs(1))
        .publish(&good)
        .await
        .unwrap();

    let task = spawn_supervised(
        Arc::new(bus.clone()),
        Subscription::new(topics::BOOKING_CREATED, "test-group"),
        recorder.clone(),
        fast_policy(),
        shutdown,
    );

    wait_until(|| recorder.handled.load(Ordering::SeqCst) == 1).await;
    handle.trigger();
    assert!(task.await.unwrap().is_ok());
    assert_eq!(
        recorder.keys.lock().await.as_slice(),
        &[good.booking_id.to_string()]
    );
}

#[tokio::test]
async fn test_failure_callback_sees_each_failed_publish() {
    let bus = InMemoryEventBus::new();
    bus.set_fail_on_publish(true).await;
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();
    let publisher = EventPublisher::new(Arc::new(bus.clone()), Duration::from_secs(1))
        .with_failure_callback(move |failure| {
            assert_eq!(failure.topic, topics::BOOKING_CREATED);
            assert!(failure.error.is_publish_error());
            counter.fetch_add(1, Ordering::SeqCst);
        });

    publisher.publish_detached(&booking_created());
    publisher.publish_detached(&booking_created());
    assert!(publisher.publish(&booking_created()).await.is_err());
    assert!(publisher.drain(Duration::from_secs(1)).await);

    assert_eq!(failures.load(Ordering::SeqCst), 3);
    assert!(bus.published(topics::BOOKING_CREATED).await.is_empty());
}
