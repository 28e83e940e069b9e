//! Integration events exchanged between the booking and payment services.
//!
//! Every event is keyed by its booking id, so all events about one booking
//! land on the same partition and are observed in publish order by a single
//! consumer-group member. Nothing here deduplicates deliveries.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{BookingId, Money, PaymentId};

/// Topic names.
pub mod topics {
    /// Published by the booking service after a booking is persisted.
    pub const BOOKING_CREATED: &str = "booking.created";

    /// Published by the payment service when a payment was authorized and stored.
    pub const PAYMENT_SUCCESS: &str = "payment.success";

    /// Published by the payment service when a payment was declined or not stored.
    pub const PAYMENT_FAILED: &str = "payment.failed";
}

/// Consumer group names. Every instance of a service joins its group, so each
/// message is handled once per service.
pub mod consumer_groups {
    /// Reads `payment.success` and `payment.failed`.
    pub const BOOKING_SERVICE: &str = "booking-service-group";

    /// Reads `booking.created`.
    pub const PAYMENT_SERVICE: &str = "payment-service-group";
}

/// An event that travels over the bus as JSON.
pub trait IntegrationEvent: Serialize + DeserializeOwned + Send + Sync {
    /// Topic the event is published to.
    fn topic(&self) -> &'static str;

    /// Booking the event is about; used as the partition key.
    fn booking_id(&self) -> BookingId;

    /// Partition key as published.
    fn partition_key(&self) -> String {
        self.booking_id().to_string()
    }

    /// Encodes the event as a JSON payload.
    fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes an event from a JSON payload.
    fn decode(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

/// Payload of `booking.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub booking_id: BookingId,
    pub user_id: String,
    pub resource_id: String,
    pub total_amount: Money,
}

impl IntegrationEvent for BookingCreated {
    fn topic(&self) -> &'static str {
        topics::BOOKING_CREATED
    }

    fn booking_id(&self) -> BookingId {
        self.booking_id
    }
}

/// Outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Success,
    Failed,
}

impl PaymentStatus {
    /// Topic an outcome with this status is published to.
    pub fn topic(&self) -> &'static str {
        match self {
            PaymentStatus::Success => topics::PAYMENT_SUCCESS,
            PaymentStatus::Failed => topics::PAYMENT_FAILED,
        }
    }

    /// Returns the status name as stored and sent.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Payload of `payment.success` and `payment.failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// `None` when the payment row could not be stored.
    pub payment_id: Option<PaymentId>,
    pub booking_id: BookingId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub transaction_id: String,
}

impl IntegrationEvent for PaymentOutcome {
    fn topic(&self) -> &'static str {
        self.status.topic()
    }

    fn booking_id(&self) -> BookingId {
        self.booking_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_created_wire_format() {
        let booking_id = BookingId::new();
        let event = BookingCreated {
            booking_id,
            user_id: "u1".to_string(),
            resource_id: "r1".to_string(),
            total_amount: Money::from_cents(19999),
        };

        let value: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(value["booking_id"], booking_id.to_string());
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["resource_id"], "r1");
        assert_eq!(value["total_amount"], 199.99);
        assert_eq!(event.topic(), topics::BOOKING_CREATED);
        assert_eq!(event.partition_key(), booking_id.to_string());
    }

    #[test]
    fn test_outcome_topic_follows_status() {
        let mut outcome = PaymentOutcome {
            payment_id: Some(PaymentId::new()),
            booking_id: BookingId::new(),
            amount: Money::from_cents(100),
            status: PaymentStatus::Success,
            transaction_id: "txn_1".to_string(),
        };
        assert_eq!(outcome.topic(), topics::PAYMENT_SUCCESS);

        outcome.status = PaymentStatus::Failed;
        assert_eq!(outcome.topic(), topics::PAYMENT_FAILED);
    }

    #[test]
    fn test_outcome_decodes_null_payment_id() {
        let booking_id = BookingId::new();
        let json = serde_json::json!({
            "payment_id": null,
            "booking_id": booking_id.to_string(),
            "amount": 10.5,
            "status": "FAILED",
            "transaction_id": format!("txn_{booking_id}"),
        });

        let outcome = PaymentOutcome::decode(json.to_string().as_bytes()).unwrap();
        assert_eq!(outcome.payment_id, None);
        assert_eq!(outcome.status, PaymentStatus::Failed);
        assert_eq!(outcome.amount.cents(), 1050);
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!("SUCCESS".parse::<PaymentStatus>(), Ok(PaymentStatus::Success));
        assert_eq!("FAILED".parse::<PaymentStatus>(), Ok(PaymentStatus::Failed));
        assert!("success".parse::<PaymentStatus>().is_err());
    }
}
