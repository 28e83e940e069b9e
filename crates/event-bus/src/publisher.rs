//! Deadline-bounded publishing.
//!
//! [`EventPublisher::publish_detached`] is the fire-and-forget path used from
//! request handlers: the caller gets its response before the broker confirms,
//! so a failed publish is only visible through logs, metrics and the failure
//! callback. There is no outbox behind it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::IntegrationEvent;
use tokio::sync::Notify;

use crate::{EventBus, EventBusError, Result};

/// Details handed to the failure callback.
#[derive(Debug)]
pub struct PublishFailure {
    pub topic: String,
    pub key: String,
    pub error: EventBusError,
}

type FailureCallback = Arc<dyn Fn(&PublishFailure) + Send + Sync>;

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(in_flight: Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Publishes integration events with a deadline.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    deadline: Duration,
    on_failure: Option<FailureCallback>,
    in_flight: Arc<InFlight>,
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher")
            .field("deadline", &self.deadline)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl EventPublisher {
    /// Creates a publisher that gives each publish at most `deadline`.
    pub fn new(bus: Arc<dyn EventBus>, deadline: Duration) -> Self {
        Self {
            bus,
            deadline,
            on_failure: None,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Registers a callback invoked for every failed publish.
    pub fn with_failure_callback(
        mut self,
        callback: impl Fn(&PublishFailure) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Returns the underlying bus.
    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Publishes an event and waits for the outcome, up to the deadline.
    pub async fn publish<E: IntegrationEvent>(&self, event: &E) -> Result<()> {
        let topic = event.topic();
        let key = event.partition_key();
        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(e) => {
                let error = EventBusError::from(e);
                let message = error.to_string();
                self.report(topic, &key, error);
                return Err(EventBusError::Publish {
                    topic: topic.to_string(),
                    reason: message,
                });
            }
        };

        let result =
            publish_with_deadline(self.bus.as_ref(), topic, &key, payload, self.deadline).await;
        match result {
            Ok(()) => Ok(()),
            Err(error) => {
                let returned = EventBusError::Publish {
                    topic: topic.to_string(),
                    reason: error.to_string(),
                };
                self.report(topic, &key, error);
                Err(returned)
            }
        }
    }

    /// Publishes an event from a background task and returns immediately.
    ///
    /// Failures never reach the caller; they are logged, counted and passed to
    /// the failure callback.
    pub fn publish_detached<E: IntegrationEvent>(&self, event: &E) {
        let topic = event.topic();
        let key = event.partition_key();
        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.report(topic, &key, EventBusError::from(e));
                return;
            }
        };

        let publisher = self.clone();
        let guard = InFlightGuard::new(self.in_flight.clone());
        tokio::spawn(async move {
            let _guard = guard;
            let result =
                publish_with_deadline(publisher.bus.as_ref(), topic, &key, payload, publisher.deadline)
                    .await;
            if let Err(error) = result {
                publisher.report(topic, &key, error);
            }
        });
    }

    /// Number of detached publishes still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Waits for detached publishes to finish, up to `grace`.
    ///
    /// Returns false if some were still running when the grace period ended.
    pub async fn drain(&self, grace: Duration) -> bool {
        let wait_idle = async {
            loop {
                let idle = self.in_flight.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                idle.await;
            }
        };

        match tokio::time::timeout(grace, wait_idle).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    in_flight = self.in_flight(),
                    "detached publishes still running after grace period"
                );
                false
            }
        }
    }

    fn report(&self, topic: &str, key: &str, error: EventBusError) {
        metrics::counter!("event_publish_failures_total", "topic" => topic.to_string())
            .increment(1);
        tracing::error!(topic, key, error = %error, "failed to publish event");

        if let Some(callback) = &self.on_failure {
            callback(&PublishFailure {
                topic: topic.to_string(),
                key: key.to_string(),
                error,
            });
        }
    }
}

async fn publish_with_deadline(
    bus: &dyn EventBus,
    topic: &str,
    key: &str,
    payload: Vec<u8>,
    deadline: Duration,
) -> Result<()> {
    match tokio::time::timeout(deadline, bus.publish(topic, key, payload)).await {
        Ok(Ok(())) => {
            metrics::counter!("events_published_total", "topic" => topic.to_string()).increment(1);
            tracing::debug!(topic, key, "event published");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(EventBusError::PublishTimeout {
            topic: topic.to_string(),
            timeout: deadline,
        }),
    }
}
