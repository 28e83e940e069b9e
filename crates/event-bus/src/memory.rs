use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::IntegrationEvent;
use tokio::sync::{Mutex, watch};

use crate::{EventBus, EventBusError, Message, MessageStream, Result};

/// In-memory event bus implementation.
///
/// Each topic is a retained log; each consumer group keeps one offset per
/// topic, shared by all of its members, so a message goes to exactly one
/// member of every group. A group that subscribes again resumes at its offset.
/// New groups start at the beginning of the log.
///
/// Faults can be injected to exercise publish and consume failure paths.
#[derive(Clone)]
pub struct InMemoryEventBus {
    state: Arc<Mutex<BusState>>,
    changes: Arc<watch::Sender<u64>>,
}

#[derive(Default)]
struct BusState {
    topics: HashMap<String, TopicLog>,
    fail_publish: bool,
    publish_delay: Option<Duration>,
    fail_next_receive: HashSet<String>,
    closed: bool,
}

#[derive(Default)]
struct TopicLog {
    messages: Vec<Message>,
    group_offsets: HashMap<String, usize>,
}

enum Next {
    Message(Message),
    Failure(String),
    Pending,
    Closed,
}

impl BusState {
    fn next_for(&mut self, topic: &str, consumer_group: &str) -> Next {
        if self.closed {
            return Next::Closed;
        }
        if self.fail_next_receive.remove(topic) {
            return Next::Failure("injected receive failure".to_string());
        }
        let log = self.topics.entry(topic.to_string()).or_default();
        let offset = log.group_offsets.entry(consumer_group.to_string()).or_insert(0);
        match log.messages.get(*offset) {
            Some(message) => {
                *offset += 1;
                Next::Message(message.clone())
            }
            None => Next::Pending,
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            changes: Arc::new(changes),
        }
    }
}

impl InMemoryEventBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail (or succeed again).
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.lock().await.fail_publish = fail;
    }

    /// Delays every subsequent publish, to exercise publish deadlines.
    pub async fn set_publish_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.publish_delay = delay;
    }

    /// Breaks the next read on `topic`, ending that subscription with an error.
    pub async fn fail_next_receive(&self, topic: &str) {
        self.state
            .lock()
            .await
            .fail_next_receive
            .insert(topic.to_string());
        self.notify();
    }

    /// Returns every message published to `topic`, in publish order.
    pub async fn published(&self, topic: &str) -> Vec<Message> {
        self.state
            .lock()
            .await
            .topics
            .get(topic)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    /// Returns every event published to `topic`, decoded.
    pub async fn published_events<E: IntegrationEvent>(&self, topic: &str) -> Vec<E> {
        self.published(topic)
            .await
            .iter()
            .filter_map(|message| message.decode().ok())
            .collect()
    }

    /// Number of messages `consumer_group` has not received yet on `topic`.
    pub async fn lag(&self, topic: &str, consumer_group: &str) -> usize {
        let state = self.state.lock().await;
        state
            .topics
            .get(topic)
            .map(|log| {
                let offset = log.group_offsets.get(consumer_group).copied().unwrap_or(0);
                log.messages.len().saturating_sub(offset)
            })
            .unwrap_or(0)
    }

    /// Ends all subscriptions and rejects further publishes.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify();
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let delay = self.state.lock().await.publish_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(EventBusError::Publish {
                topic: topic.to_string(),
                reason: "bus closed".to_string(),
            });
        }
        if state.fail_publish {
            return Err(EventBusError::Publish {
                topic: topic.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }

        let log = state.topics.entry(topic.to_string()).or_default();
        let offset = log.messages.len() as i64;
        log.messages.push(Message {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
            offset,
        });
        drop(state);

        self.notify();
        tracing::debug!(topic, key, offset, "message published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str, consumer_group: &str) -> Result<MessageStream> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(EventBusError::Subscribe {
                    topic: topic.to_string(),
                    consumer_group: consumer_group.to_string(),
                    reason: "bus closed".to_string(),
                });
            }
            state
                .topics
                .entry(topic.to_string())
                .or_default()
                .group_offsets
                .entry(consumer_group.to_string())
                .or_insert(0);
        }

        let state = self.state.clone();
        let mut changes = self.changes.subscribe();
        let topic = topic.to_string();
        let consumer_group = consumer_group.to_string();

        let stream = async_stream::stream! {
            loop {
                // Mark the current version as seen before looking, so a publish
                // racing with the check still wakes `changed()` below.
                changes.borrow_and_update();
                let next = state.lock().await.next_for(&topic, &consumer_group);
                match next {
                    Next::Message(message) => yield Ok(message),
                    Next::Failure(reason) => {
                        yield Err(EventBusError::Consume { topic: topic.clone(), reason });
                        break;
                    }
                    Next::Closed => break,
                    Next::Pending => {
                        if changes.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
