use async_trait::async_trait;
use common::BookingId;
use common::db::Result;

use crate::model::Payment;

/// Durable storage for payment records.
///
/// Rows are not unique per booking; every processed delivery adds one.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a payment record.
    async fn create(&self, payment: &Payment) -> Result<()>;

    /// Lists the payments recorded for a booking, oldest first.
    async fn list_by_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>>;
}
