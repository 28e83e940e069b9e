use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::db::Result;
use common::{BookingId, PersistenceError};
use tokio::sync::RwLock;

use crate::model::Payment;
use crate::store::PaymentStore;

/// In-memory payment store for testing.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<Vec<Payment>>>,
    fail_on_create: Arc<AtomicBool>,
}

impl InMemoryPaymentStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject inserts.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.len()
    }

    /// Returns every stored payment in insertion order.
    pub async fn all(&self) -> Vec<Payment> {
        self.payments.read().await.clone()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: &Payment) -> Result<()> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "payment store unavailable".to_string(),
            ));
        }
        self.payments.write().await.push(payment.clone());
        Ok(())
    }

    async fn list_by_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, PaymentStatus};

    use super::*;

    #[tokio::test]
    async fn test_create_and_list() {
        let store = InMemoryPaymentStore::new();
        let booking_id = BookingId::new();
        let first = Payment::new(booking_id, Money::from_cents(10), PaymentStatus::Success);
        let second = Payment::new(booking_id, Money::from_cents(10), PaymentStatus::Success);
        let other = Payment::new(BookingId::new(), Money::from_cents(10), PaymentStatus::Failed);

        for p in [&first, &second, &other] {
            store.create(p).await.unwrap();
        }

        assert_eq!(
            store.list_by_booking(booking_id).await.unwrap(),
            vec![first, second]
        );
        assert_eq!(store.payment_count().await, 3);
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let store = InMemoryPaymentStore::new();
        store.set_fail_on_create(true);

        let payment = Payment::new(BookingId::new(), Money::from_cents(10), PaymentStatus::Success);
        assert!(store.create(&payment).await.is_err());
        assert_eq!(store.payment_count().await, 0);
    }
}
