use chrono::{DateTime, Utc};
use common::{BookingId, Money, PaymentId, PaymentStatus};
use serde::{Deserialize, Serialize};

/// A recorded payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Builds a new payment record with a fresh id.
    pub fn new(booking_id: BookingId, amount: Money, status: PaymentStatus) -> Self {
        let now = common::db::now();
        Self {
            id: PaymentId::new(),
            booking_id,
            amount,
            status,
            transaction_id: Self::transaction_reference(booking_id),
            created_at: now,
            updated_at: now,
        }
    }

    /// The transaction reference for a booking: `txn_<booking_id>`.
    pub fn transaction_reference(booking_id: BookingId) -> String {
        format!("txn_{booking_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_reference() {
        let booking_id = BookingId::new();
        let payment = Payment::new(booking_id, Money::from_cents(100), PaymentStatus::Success);
        assert_eq!(payment.transaction_id, format!("txn_{booking_id}"));
        assert_eq!(payment.created_at, payment.updated_at);
    }

    #[test]
    fn test_timestamps_have_storage_precision() {
        let payment = Payment::new(BookingId::new(), Money::from_cents(1), PaymentStatus::Failed);
        assert_eq!(payment.created_at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_ids_are_unique_per_attempt() {
        let booking_id = BookingId::new();
        let a = Payment::new(booking_id, Money::from_cents(1), PaymentStatus::Success);
        let b = Payment::new(booking_id, Money::from_cents(1), PaymentStatus::Success);
        assert_ne!(a.id, b.id);
        assert_eq!(a.transaction_id, b.transaction_id);
    }
}
