use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::db::Result;
use common::{BookingId, PersistenceError};
use tokio::sync::RwLock;

use crate::model::Booking;
use crate::state::{BookingStatus, Transition};
use crate::store::{BookingStore, StatusUpdate};

/// In-memory booking store for tests and standalone runs.
///
/// Conditional updates hold the write lock across the status check and the
/// write, matching the single-statement update of the Postgres store.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryBookingStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "booking store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, booking: &Booking) -> Result<()> {
        self.check_available()?;
        self.bookings
            .write()
            .await
            .insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: BookingId) -> Result<Option<Booking>> {
        self.check_available()?;
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        self.check_available()?;
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        self.check_available()?;
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    async fn update_status(&self, id: BookingId, transition: Transition) -> Result<StatusUpdate> {
        self.check_available()?;
        let mut bookings = self.bookings.write().await;
        let Some(booking) = bookings.get_mut(&id) else {
            return Ok(StatusUpdate::Missing);
        };

        if booking.status != transition.from() {
            return Ok(StatusUpdate::Unchanged(booking.clone()));
        }

        booking.status = transition.to();
        booking.updated_at = common::db::now().max(booking.created_at);
        Ok(StatusUpdate::Applied(booking.clone()))
    }
}
