//! Payment side of the booking/payment saga.
//!
//! For every `booking.created` the [`PaymentProcessor`] asks an
//! [`Authorizer`] for a decision, records a [`Payment`] and publishes
//! `payment.success` or `payment.failed`. Deliveries are not deduplicated:
//! a redelivered booking is charged and recorded again.

pub mod authorizer;
pub mod error;
pub mod handler;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod processor;
pub mod store;

pub use authorizer::{Authorizer, Decision, SimulatedAuthorizer};
pub use error::{PaymentError, Result};
pub use handler::BookingCreatedHandler;
pub use memory::InMemoryPaymentStore;
pub use model::Payment;
pub use postgres::PostgresPaymentStore;
pub use processor::PaymentProcessor;
pub use store::PaymentStore;
