//! Payment error types.

use event_bus::EventBusError;
use thiserror::Error;

/// Errors that can occur while processing a payment.
///
/// A store failure is not an error here: it turns the outcome into FAILED.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The outcome event could not be published.
    #[error("Publish error: {0}")]
    Publish(#[from] EventBusError),
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
