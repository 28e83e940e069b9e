//! Event bus used by the booking and payment services to talk to each other.
//!
//! - [`EventBus`]: publish keyed payloads, subscribe with consumer-group semantics
//! - [`InMemoryEventBus`]: single-process bus with fault injection for tests
//! - `KafkaEventBus`: rdkafka-backed bus (enable the `kafka` feature)
//! - [`EventPublisher`]: deadline-bounded publishing, including detached
//!   fire-and-forget publishes with a failure callback
//! - [`consumer`]: subscription loop and supervised restarts

pub mod bus;
pub mod consumer;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod publisher;

pub use bus::{EventBus, EventBusExt, Message, MessageStream};
pub use consumer::{HandlerError, MessageHandler, Subscription, run_subscription, spawn_supervised, supervise};
pub use error::{EventBusError, Result};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaEventBus, KafkaEventBusBuilder};
pub use memory::InMemoryEventBus;
pub use publisher::{EventPublisher, PublishFailure};
