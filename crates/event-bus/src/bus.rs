use std::pin::Pin;

use async_trait::async_trait;
use common::IntegrationEvent;
use futures_core::Stream;

use crate::Result;

/// A message received from a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    /// Partition key; always a booking id for the integration events.
    pub key: String,
    pub payload: Vec<u8>,
    /// Position of the message in its topic (or partition).
    pub offset: i64,
}

impl Message {
    /// Decodes the payload as an integration event.
    pub fn decode<E: IntegrationEvent>(&self) -> serde_json::Result<E> {
        E::decode(&self.payload)
    }
}

/// A lazy, unbounded sequence of received messages.
///
/// An `Err` item means the subscription broke; callers are expected to drop
/// the stream and subscribe again.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message>> + Send>>;

/// Core trait for event bus implementations.
///
/// Consumer-group semantics: every message of a topic is delivered to one
/// member of each consumer group. Messages sharing a key are delivered in
/// publish order. There is no deduplication; handlers see redeliveries.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes a payload to a topic under the given partition key.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()>;

    /// Joins `consumer_group` on `topic`.
    ///
    /// Subscribing again after a failure resumes where the group left off.
    async fn subscribe(&self, topic: &str, consumer_group: &str) -> Result<MessageStream>;
}

/// Extension trait providing typed publishing.
#[async_trait]
pub trait EventBusExt: EventBus {
    /// Encodes and publishes an integration event on its own topic and key.
    async fn publish_event<E: IntegrationEvent>(&self, event: &E) -> Result<()> {
        let payload = event.encode()?;
        self.publish(event.topic(), &event.partition_key(), payload)
            .await
    }
}

// Blanket implementation for all EventBus implementations
impl<T: EventBus + ?Sized> EventBusExt for T {}
