//! Shared building blocks for the booking and payment services.
//!
//! - Typed identifiers and [`Money`]
//! - Integration event payloads exchanged over the event bus
//! - Retry/backoff policy used for connection setup and consumer supervision
//! - Database bootstrap, tracing setup and shutdown coordination
//! - Environment settings shared by both services

pub mod db;
pub mod events;
pub mod lifecycle;
pub mod money;
pub mod retry;
pub mod settings;
pub mod telemetry;
pub mod types;

pub use db::{PersistenceError, connect_with_retry};
pub use events::{
    BookingCreated, IntegrationEvent, PaymentOutcome, PaymentStatus, consumer_groups, topics,
};
pub use lifecycle::{Shutdown, ShutdownHandle, run_until_shutdown, shutdown_channel, shutdown_signal};
pub use money::Money;
pub use retry::{RetryPolicy, retry_with_backoff};
pub use settings::ConsumerSettings;
pub use telemetry::{LogFormat, init_tracing};
pub use types::{BookingId, PaymentId};
