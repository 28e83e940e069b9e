//! Booking status machine.

use std::str::FromStr;

use common::PaymentStatus;
use serde::{Deserialize, Serialize};

/// The status of a booking.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Awaiting the payment outcome.
    #[default]
    Pending,

    /// Payment succeeded (terminal state).
    Confirmed,

    /// Payment failed (terminal state).
    Cancelled,
}

impl BookingStatus {
    /// Returns true if a booking in this status may move to `next`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
        )
    }

    /// The status a payment outcome leads to.
    pub fn after_payment(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Success => BookingStatus::Confirmed,
            PaymentStatus::Failed => BookingStatus::Cancelled,
        }
    }

    /// Returns the status as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// A status change that the state machine allows.
///
/// Stores only accept a `Transition`, so an illegal pair such as
/// CONFIRMED to CANCELLED cannot reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    from: BookingStatus,
    to: BookingStatus,
}

impl Transition {
    /// Returns the transition from `from` to `to`, or `None` if it is not allowed.
    pub fn new(from: BookingStatus, to: BookingStatus) -> Option<Self> {
        from.can_transition_to(to).then_some(Self { from, to })
    }

    /// PENDING to the status a payment outcome leads to.
    pub fn settle(payment: PaymentStatus) -> Self {
        let to = BookingStatus::after_payment(payment);
        debug_assert!(BookingStatus::Pending.can_transition_to(to));
        Self {
            from: BookingStatus::Pending,
            to,
        }
    }

    /// The status the booking must currently have.
    pub fn from(&self) -> BookingStatus {
        self.from
    }

    /// The status the booking moves to.
    pub fn to(&self) -> BookingStatus {
        self.to
    }
}
