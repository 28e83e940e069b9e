//! Booking records and the create command.

use chrono::{DateTime, SubsecRound, Utc};
use common::{BookingCreated, BookingId, Money};
use serde::{Deserialize, Serialize};

use crate::error::BookingError;
use crate::state::BookingStatus;

/// Command to create a new booking.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBooking {
    pub user_id: String,
    pub resource_id: String,
    /// Decimal amount as received, e.g. `199.99`.
    pub total_amount: f64,
}

impl CreateBooking {
    /// Creates a new CreateBooking command.
    pub fn new(user_id: impl Into<String>, resource_id: impl Into<String>, total_amount: f64) -> Self {
        Self {
            user_id: user_id.into(),
            resource_id: resource_id.into(),
            total_amount,
        }
    }
}

/// A booking as stored and returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: String,
    pub resource_id: String,
    pub total_amount: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Validates the command and builds a new PENDING booking with a fresh id.
    ///
    /// `now` is truncated to microseconds, the precision bookings are stored at.
    pub fn pending(cmd: CreateBooking, now: DateTime<Utc>) -> Result<Self, BookingError> {
        if cmd.user_id.trim().is_empty() {
            return Err(BookingError::Validation("user_id is required".to_string()));
        }
        if cmd.resource_id.trim().is_empty() {
            return Err(BookingError::Validation(
                "resource_id is required".to_string(),
            ));
        }
        let total_amount = Money::from_decimal(cmd.total_amount)
            .filter(Money::is_positive)
            .ok_or_else(|| {
                BookingError::Validation("total_amount must be a positive amount".to_string())
            })?;

        let now = now.trunc_subsecs(6);
        Ok(Self {
            id: BookingId::new(),
            user_id: cmd.user_id,
            resource_id: cmd.resource_id,
            total_amount,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// The `booking.created` payload announcing this booking.
    pub fn created_event(&self) -> BookingCreated {
        BookingCreated {
            booking_id: self.id,
            user_id: self.user_id.clone(),
            resource_id: self.resource_id.clone(),
            total_amount: self.total_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(user: &str, resource: &str, amount: f64) -> Result<Booking, BookingError> {
        Booking::pending(CreateBooking::new(user, resource, amount), Utc::now())
    }

    #[test]
    fn test_valid_command_builds_pending_booking() {
        let booking = pending("u1", "r1", 199.99).unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, Money::from_cents(19999));
        assert_eq!(booking.created_at, booking.updated_at);
    }

    #[test]
    fn test_timestamps_have_storage_precision() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T10:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let booking = Booking::pending(CreateBooking::new("u1", "r1", 10.0), now).unwrap();

        assert_eq!(booking.created_at.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(booking.updated_at, booking.created_at);

        for _ in 0..50 {
            let booking = pending("u1", "r1", 10.0).unwrap();
            assert_eq!(booking.created_at.timestamp_subsec_nanos() % 1_000, 0);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let a = pending("u1", "r1", 10.0).unwrap();
        let b = pending("u1", "r1", 10.0).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_rejects_invalid_commands() {
        for (user, resource, amount) in [
            ("u1", "r1", 0.0),
            ("u1", "r1", -5.0),
            ("u1", "r1", 0.001),
            ("u1", "r1", f64::NAN),
            ("u1", "r1", f64::INFINITY),
            ("", "r1", 10.0),
            ("u1", "   ", 10.0),
        ] {
            let result = pending(user, resource, amount);
            assert!(
                matches!(result, Err(BookingError::Validation(_))),
                "expected validation error for ({user:?}, {resource:?}, {amount})"
            );
        }
    }

    #[test]
    fn test_json_shape() {
        let booking = pending("u1", "r1", 199.99).unwrap();
        let json = serde_json::to_value(&booking).unwrap();

        assert_eq!(json["id"], booking.id.to_string());
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["resource_id"], "r1");
        assert_eq!(json["total_amount"], 199.99);
        assert_eq!(json["status"], "PENDING");
        assert!(json["created_at"].is_string());
        assert!(json["updated_at"].is_string());
    }

    #[test]
    fn test_created_event_carries_booking_fields() {
        let booking = pending("u1", "r1", 42.5).unwrap();
        let event = booking.created_event();

        assert_eq!(event.booking_id, booking.id);
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.resource_id, "r1");
        assert_eq!(event.total_amount, Money::from_cents(4250));
    }
}
