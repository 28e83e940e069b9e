//! Booking side of the booking/payment saga.
//!
//! A booking is created PENDING and announced on `booking.created`. The
//! payment service answers with `payment.success` or `payment.failed`, which
//! moves the booking to CONFIRMED or CANCELLED exactly once.
//!
//! - [`BookingCoordinator`]: create, read, and apply payment outcomes
//! - [`BookingStore`]: persistence seam with in-memory and Postgres backends
//! - [`PaymentOutcomeHandler`]: consumer glue for the outcome topics

pub mod coordinator;
pub mod error;
pub mod handler;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod state;
pub mod store;

pub use coordinator::{BookingCoordinator, OutcomeApplied};
pub use error::{BookingError, Result};
pub use handler::PaymentOutcomeHandler;
pub use memory::InMemoryBookingStore;
pub use model::{Booking, CreateBooking};
pub use postgres::PostgresBookingStore;
pub use state::{BookingStatus, Transition};
pub use store::{BookingStore, StatusUpdate};
