//! Kafka-compatible event bus backed by rdkafka.
//!
//! Delivery is at-least-once. A message's offset is committed when the
//! subscriber pulls the next one, i.e. after it finished handling the
//! previous message, so a crash or shutdown mid-handling redelivers it.
//! Dropping the stream closes the consumer and leaves the group.
//! A message without payload is passed on with an empty one; the handler's
//! decode step rejects it and it is committed like any other message.
//! Payloads are the JSON-encoded integration events, keyed by booking id.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::{EventBus, EventBusError, Message, MessageStream, Result};

/// Event bus talking to Kafka (or Redpanda) brokers.
pub struct KafkaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    auto_offset_reset: String,
}

impl KafkaEventBus {
    /// Creates a bus with default settings for the given comma-separated brokers.
    pub fn new(brokers: &str) -> Result<Self> {
        Self::builder().brokers(brokers).build()
    }

    /// Creates a builder for configuring the bus.
    pub fn builder() -> KafkaEventBusBuilder {
        KafkaEventBusBuilder::default()
    }

    /// Returns the configured brokers.
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for [`KafkaEventBus`].
#[derive(Debug, Default)]
pub struct KafkaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    timeout: Option<Duration>,
    auto_offset_reset: Option<String>,
}

impl KafkaEventBusBuilder {
    /// Comma-separated bootstrap servers.
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer acknowledgement mode: `"0"`, `"1"` or `"all"`. Default `"all"`.
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Producer send timeout. Default 5 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Where a new consumer group starts: `"earliest"` or `"latest"`. Default `"earliest"`.
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Builds the bus and its producer.
    pub fn build(self) -> Result<KafkaEventBus> {
        let brokers = self
            .brokers
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| EventBusError::Connection("brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let acks = self.producer_acks.unwrap_or_else(|| "all".to_string());

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", &acks)
            .create()
            .map_err(|e| EventBusError::Connection(format!("failed to create producer: {e}")))?;

        let bus = KafkaEventBus {
            producer,
            brokers,
            timeout,
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "earliest".to_string()),
        };

        tracing::info!(
            brokers = %bus.brokers,
            acks = %acks,
            auto_offset_reset = %bus.auto_offset_reset,
            "kafka event bus created"
        );

        Ok(bus)
    }
}

#[async_trait]
impl EventBus for KafkaEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let record = FutureRecord::to(topic).payload(&payload).key(key);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(topic, key, partition, offset, "message published");
                Ok(())
            }
            Err((kafka_error, _)) => Err(EventBusError::Publish {
                topic: topic.to_string(),
                reason: kafka_error.to_string(),
            }),
        }
    }

    async fn subscribe(&self, topic: &str, consumer_group: &str) -> Result<MessageStream> {
        let subscribe_error = |reason: String| EventBusError::Subscribe {
            topic: topic.to_string(),
            consumer_group: consumer_group.to_string(),
            reason,
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| subscribe_error(format!("failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| subscribe_error(format!("failed to subscribe: {e}")))?;

        tracing::info!(topic, consumer_group, "subscribed");

        let topic_name = topic.to_string();

        // The stream owns the consumer; dropping it leaves the group.
        let stream = async_stream::stream! {
            use futures_util::StreamExt;

            let mut messages = consumer.stream();
            while let Some(received) = messages.next().await {
                let raw = match received {
                    Ok(raw) => raw,
                    Err(e) => {
                        yield Err(EventBusError::Consume {
                            topic: topic_name.clone(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };

                yield Ok(Message {
                    topic: raw.topic().to_string(),
                    key: raw
                        .key()
                        .map(|k| String::from_utf8_lossy(k).into_owned())
                        .unwrap_or_default(),
                    payload: raw.payload().unwrap_or_default().to_vec(),
                    offset: raw.offset(),
                });

                // Resumed only when the subscriber asks for the next message.
                if let Err(e) = consumer.commit_message(&raw, CommitMode::Async) {
                    tracing::warn!(
                        topic = raw.topic(),
                        partition = raw.partition(),
                        offset = raw.offset(),
                        error = %e,
                        "failed to commit offset, message may be redelivered"
                    );
                }
            }
            tracing::debug!(topic = %topic_name, "kafka consumer stream ended");
        };

        Ok(Box::pin(stream))
    }
}
