//! Booking coordinator: the booking side of the payment saga.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::{BookingId, PaymentOutcome};
use event_bus::EventPublisher;

use crate::error::{BookingError, Result};
use crate::model::{Booking, CreateBooking};
use crate::state::Transition;
use crate::store::{BookingStore, StatusUpdate};

/// What applying a payment outcome did to the booking.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeApplied {
    /// The booking left PENDING.
    Transitioned(Booking),
    /// The booking was already terminal and kept its status.
    Unchanged(Booking),
}

impl OutcomeApplied {
    /// The booking after the outcome was applied.
    pub fn booking(&self) -> &Booking {
        match self {
            OutcomeApplied::Transitioned(booking) | OutcomeApplied::Unchanged(booking) => booking,
        }
    }
}

/// Owns booking records and drives their status from payment outcomes.
///
/// Creating a booking stores it first and then announces it on
/// `booking.created` from a detached task. The two steps are not atomic: if
/// the announcement is lost the booking stays PENDING until
/// [`republish_pending`](Self::republish_pending) picks it up.
pub struct BookingCoordinator<S: BookingStore> {
    store: S,
    publisher: EventPublisher,
}

impl<S: BookingStore> BookingCoordinator<S> {
    /// Creates a new coordinator.
    pub fn new(store: S, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the publisher used for `booking.created`.
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Validates and stores a new PENDING booking, then announces it.
    ///
    /// The announcement runs in the background; its failure never affects the
    /// returned booking.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, resource_id = %cmd.resource_id))]
    pub async fn create(&self, cmd: CreateBooking) -> Result<Booking> {
        let booking = Booking::pending(cmd, common::db::now())?;
        self.store.create(&booking).await?;

        metrics::counter!("bookings_created_total").increment(1);
        tracing::info!(
            booking_id = %booking.id,
            total_amount = %booking.total_amount,
            "booking created"
        );

        self.publisher.publish_detached(&booking.created_event());
        Ok(booking)
    }

    /// Loads a booking.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: BookingId) -> Result<Booking> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    /// Lists a user's bookings, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        if user_id.trim().is_empty() {
            return Err(BookingError::Validation("user_id is required".to_string()));
        }
        Ok(self.store.list_by_user(user_id).await?)
    }

    /// Applies a payment outcome: SUCCESS confirms, FAILED cancels.
    ///
    /// Only a PENDING booking changes. Redelivered or late outcomes for a
    /// booking that already left PENDING are reported as
    /// [`OutcomeApplied::Unchanged`].
    #[tracing::instrument(
        skip(self, event),
        fields(booking_id = %event.booking_id, status = %event.status)
    )]
    pub async fn on_payment_outcome(&self, event: &PaymentOutcome) -> Result<OutcomeApplied> {
        let transition = Transition::settle(event.status);
        let next = transition.to();
        let update = self
            .store
            .update_status(event.booking_id, transition)
            .await?;

        let applied = match update {
            StatusUpdate::Applied(booking) => {
                metrics::counter!("booking_transitions_total", "status" => next.as_str())
                    .increment(1);
                tracing::info!(
                    transaction_id = %event.transaction_id,
                    "booking moved to {next}"
                );
                OutcomeApplied::Transitioned(booking)
            }
            StatusUpdate::Unchanged(booking) => {
                tracing::info!(
                    current = %booking.status,
                    "booking already settled, outcome ignored"
                );
                OutcomeApplied::Unchanged(booking)
            }
            StatusUpdate::Missing => return Err(BookingError::NotFound(event.booking_id)),
        };

        let booking = applied.booking();
        if booking.total_amount != event.amount {
            tracing::warn!(
                booked = %booking.total_amount,
                paid = %event.amount,
                "payment amount does not match booking"
            );
        }

        Ok(applied)
    }

    /// Publishes `booking.created` again for bookings still PENDING after `older_than`.
    ///
    /// Publishes are awaited one by one. Failures are reported through the
    /// publisher and skipped. Returns how many were published.
    #[tracing::instrument(skip(self))]
    pub async fn republish_pending(&self, older_than: Duration) -> Result<usize> {
        let cutoff = TimeDelta::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let stale = self.store.list_pending_before(cutoff).await?;
        let mut republished = 0;
        for booking in &stale {
            if self.publisher.publish(&booking.created_event()).await.is_ok() {
                republished += 1;
            }
        }

        if !stale.is_empty() {
            tracing::info!(
                pending = stale.len(),
                republished,
                "republished stale pending bookings"
            );
        }
        Ok(republished)
    }
}
