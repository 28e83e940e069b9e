//! Booking error types.

use common::{BookingId, PersistenceError};
use thiserror::Error;

/// Errors that can occur during booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The request was rejected before anything was stored.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No booking exists with this id.
    #[error("Booking not found: {0}")]
    NotFound(BookingId),

    /// The store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Convenience type alias for booking results.
pub type Result<T> = std::result::Result<T, BookingError>;
