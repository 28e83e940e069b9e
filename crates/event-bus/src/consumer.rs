//! Subscription loops and their supervisor.

use std::sync::Arc;

use async_trait::async_trait;
use common::{RetryPolicy, Shutdown};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{EventBus, Message, Result};

/// Error returned by a [`MessageHandler`]. It is logged and the message dropped.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes messages received from one subscription.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Returns the name of this handler, used in logs.
    fn name(&self) -> &'static str;

    /// Handles a single message.
    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError>;
}

/// A topic and the consumer group reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub consumer_group: String,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            consumer_group: consumer_group.into(),
        }
    }
}

/// Subscribes once and feeds messages to `handler` one at a time.
///
/// The next message is pulled from the stream only after the previous one was
/// handled; buses that commit on pull depend on this.
///
/// Handler errors are logged and the loop moves on to the next message. A
/// stream error ends the run with that error. Returns `Ok` when the stream
/// ends or shutdown is triggered; a message already being handled is finished
/// first.
#[tracing::instrument(
    skip(bus, handler, shutdown),
    fields(topic = %subscription.topic, group = %subscription.consumer_group, handler = handler.name())
)]
pub async fn run_subscription(
    bus: &dyn EventBus,
    subscription: &Subscription,
    handler: &dyn MessageHandler,
    shutdown: &Shutdown,
) -> Result<()> {
    let mut stream = bus
        .subscribe(&subscription.topic, &subscription.consumer_group)
        .await?;

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.wait() => {
                tracing::info!("shutdown requested, leaving subscription");
                return Ok(());
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(message)) => {
                if let Err(e) = handler.handle(&message).await {
                    tracing::warn!(
                        key = %message.key,
                        offset = message.offset,
                        error = %e,
                        "handler failed, message dropped"
                    );
                }
            }
            Some(Err(e)) => return Err(e),
            None => {
                tracing::info!("subscription stream ended");
                return Ok(());
            }
        }
    }
}

/// Keeps a subscription running, restarting it with backoff after failures.
///
/// The restart count goes back to zero once a run has stayed up for at least
/// the policy's `max_delay`. Returns the last error when the policy allows no
/// further restarts, and `Ok` on shutdown or when the stream ends.
pub async fn supervise(
    bus: Arc<dyn EventBus>,
    subscription: Subscription,
    handler: Arc<dyn MessageHandler>,
    policy: RetryPolicy,
    shutdown: Shutdown,
) -> Result<()> {
    let mut restarts: u32 = 0;

    loop {
        if shutdown.is_triggered() {
            return Ok(());
        }

        let started = Instant::now();
        let error = match run_subscription(bus.as_ref(), &subscription, handler.as_ref(), &shutdown)
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if started.elapsed() >= policy.max_delay {
            restarts = 0;
        }

        if !policy.allows(restarts) {
            tracing::error!(
                topic = %subscription.topic,
                group = %subscription.consumer_group,
                restarts,
                error = %error,
                "subscription failed too many times, giving up"
            );
            return Err(error);
        }

        let delay = policy.jittered_delay(restarts);
        restarts += 1;
        metrics::counter!("consumer_restarts_total", "topic" => subscription.topic.clone())
            .increment(1);
        tracing::warn!(
            topic = %subscription.topic,
            group = %subscription.consumer_group,
            restart = restarts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "subscription failed, restarting"
        );

        tokio::select! {
            () = shutdown.wait() => return Ok(()),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Spawns [`supervise`] on the runtime.
pub fn spawn_supervised(
    bus: Arc<dyn EventBus>,
    subscription: Subscription,
    handler: Arc<dyn MessageHandler>,
    policy: RetryPolicy,
    shutdown: Shutdown,
) -> JoinHandle<Result<()>> {
    tokio::spawn(supervise(bus, subscription, handler, policy, shutdown))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use common::shutdown_channel;

    use super::*;
    use crate::{EventBusError, InMemoryEventBus, MessageStream};

    /// Counts messages and fails on payloads equal to `b"bad"`.
    #[derive(Default)]
    struct CountingHandler {
        handled: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        fn name(&self) -> &'static str {
            "CountingHandler"
        }

        async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            if message.payload == b"bad" {
                return Err("bad payload".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handler_errors_do_not_stop_the_loop() {
        let bus = InMemoryEventBus::new();
        for payload in ["ok", "bad", "ok"] {
            bus.publish("t", "k", payload.as_bytes().to_vec()).await.unwrap();
        }
        let handler = CountingHandler::default();
        let (handle, shutdown) = shutdown_channel();

        let closer = bus.clone();
        let run = async {
            run_subscription(&bus, &Subscription::new("t", "g"), &handler, &shutdown).await
        };
        let stop = async {
            while closer.lag("t", "g").await > 0 {
                tokio::task::yield_now().await;
            }
            closer.close().await;
        };

        let (result, ()) = tokio::join!(run, stop);
        assert!(result.is_ok());
        assert_eq!(handler.handled.load(Ordering::SeqCst), 3);
        drop(handle);
    }

    #[tokio::test]
    async fn test_receive_failure_ends_run_with_error() {
        let bus = InMemoryEventBus::new();
        bus.fail_next_receive("t").await;
        let (_handle, shutdown) = shutdown_channel();

        let result = run_subscription(
            &bus,
            &Subscription::new("t", "g"),
            &CountingHandler::default(),
            &shutdown,
        )
        .await;

        assert!(matches!(result, Err(EventBusError::Consume { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_run() {
        let bus = InMemoryEventBus::new();
        let (handle, shutdown) = shutdown_channel();
        handle.trigger();

        let result = run_subscription(
            &bus,
            &Subscription::new("t", "g"),
            &CountingHandler::default(),
            &shutdown,
        )
        .await;

        assert!(result.is_ok());
    }

    /// Serves three messages and logs each pull from the stream.
    struct RecordingBus {
        log: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventBus for RecordingBus {
        async fn publish(&self, _topic: &str, _key: &str, _payload: Vec<u8>) -> Result<()> {
            Ok(())
        }

        async fn subscribe(&self, topic: &str, _consumer_group: &str) -> Result<MessageStream> {
            let log = self.log.clone();
            let topic = topic.to_string();
            Ok(Box::pin(async_stream::stream! {
                for offset in 0..3 {
                    log.lock().unwrap().push(format!("pull {offset}"));
                    yield Ok(Message {
                        topic: topic.clone(),
                        key: "k".to_string(),
                        payload: Vec::new(),
                        offset,
                    });
                }
                log.lock().unwrap().push("end".to_string());
            }))
        }
    }

    /// Logs each message once it finished handling.
    struct SlowHandler {
        log: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MessageHandler for SlowHandler {
        fn name(&self) -> &'static str {
            "SlowHandler"
        }

        async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError> {
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("handled {}", message.offset));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_next_message_is_pulled_only_after_handling() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let bus = RecordingBus { log: log.clone() };
        let handler = SlowHandler { log: log.clone() };
        let (_handle, shutdown) = shutdown_channel();

        let result =
            run_subscription(&bus, &Subscription::new("t", "g"), &handler, &shutdown).await;

        assert!(result.is_ok());
        assert_eq!(
            *log.lock().unwrap(),
            [
                "pull 0",
                "handled 0",
                "pull 1",
                "handled 1",
                "pull 2",
                "handled 2",
                "end"
            ]
        );
    }

    /// Refuses every subscription.
    #[derive(Default)]
    struct UnreachableBus {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl EventBus for UnreachableBus {
        async fn publish(&self, topic: &str, _key: &str, _payload: Vec<u8>) -> Result<()> {
            Err(EventBusError::Publish {
                topic: topic.to_string(),
                reason: "unreachable".to_string(),
            })
        }

        async fn subscribe(&self, topic: &str, consumer_group: &str) -> Result<MessageStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(EventBusError::Subscribe {
                topic: topic.to_string(),
                consumer_group: consumer_group.to_string(),
                reason: "unreachable".to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_gives_up_after_max_restarts() {
        let bus = Arc::new(UnreachableBus::default());
        let (_handle, shutdown) = shutdown_channel();
        let policy = RetryPolicy::default()
            .with_max_retries(Some(2))
            .with_delays(Duration::from_millis(10), Duration::from_millis(100))
            .with_jitter(0.0);

        let result = supervise(
            bus.clone(),
            Subscription::new("t", "g"),
            Arc::new(CountingHandler::default()),
            policy,
            shutdown,
        )
        .await;

        assert!(matches!(result, Err(EventBusError::Subscribe { .. })));
        assert_eq!(bus.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let bus = Arc::new(UnreachableBus::default());
        let (handle, shutdown) = shutdown_channel();
        let policy = RetryPolicy::unbounded()
            .with_delays(Duration::from_secs(60), Duration::from_secs(60))
            .with_jitter(0.0);

        let task = spawn_supervised(
            bus.clone(),
            Subscription::new("t", "g"),
            Arc::new(CountingHandler::default()),
            policy,
            shutdown,
        );
        while bus.attempts.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        handle.trigger();

        assert!(task.await.unwrap().is_ok());
        assert_eq!(bus.attempts.load(Ordering::SeqCst), 1);
    }
}
