//! Booking persistence seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::BookingId;
use common::db::Result;

use crate::model::Booking;
use crate::state::Transition;

/// Result of a conditional status update.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The booking was in the expected status and now has the new one.
    Applied(Booking),
    /// The booking was not in the expected status; it is returned as stored.
    Unchanged(Booking),
    /// No booking exists with this id.
    Missing,
}

/// Durable storage for bookings.
///
/// Status changes go through [`BookingStore::update_status`], which only
/// applies when the stored status still equals the transition's `from`. Concurrent
/// outcomes for one booking therefore resolve to a single transition.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking.
    async fn create(&self, booking: &Booking) -> Result<()>;

    /// Loads a booking by id.
    async fn get_by_id(&self, id: BookingId) -> Result<Option<Booking>>;

    /// Lists a user's bookings, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>>;

    /// Lists PENDING bookings created before `cutoff`, oldest first.
    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>>;

    /// Applies `transition` if the booking is still in its `from` status.
    ///
    /// `updated_at` is stamped from the application clock and never goes
    /// below `created_at`.
    async fn update_status(&self, id: BookingId, transition: Transition) -> Result<StatusUpdate>;
}
