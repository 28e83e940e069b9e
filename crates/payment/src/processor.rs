//! Payment processor: turns `booking.created` into a payment outcome.

use std::sync::Arc;
use std::time::Duration;

use common::{BookingCreated, Money, PaymentOutcome, PaymentStatus};
use event_bus::{EventBus, EventPublisher};

use crate::authorizer::{Authorizer, Decision, SimulatedAuthorizer};
use crate::error::Result;
use crate::model::Payment;
use crate::store::PaymentStore;

/// Authorizes, records and announces the payment for each created booking.
pub struct PaymentProcessor<S: PaymentStore, A: Authorizer> {
    store: S,
    authorizer: A,
    publisher: EventPublisher,
}

impl<S: PaymentStore, A: Authorizer> PaymentProcessor<S, A> {
    /// Creates a new payment processor.
    pub fn new(store: S, authorizer: A, publisher: EventPublisher) -> Self {
        Self {
            store,
            authorizer,
            publisher,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a reference to the authorizer.
    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    /// Processes one `booking.created` event and publishes its outcome.
    ///
    /// A payment that could not be stored is reported as FAILED with no
    /// payment id, whatever the authorizer decided. The outcome is returned
    /// even when the caller only needs the side effects; a publish failure
    /// is returned as an error after the payment row was written.
    #[tracing::instrument(
        skip(self, event),
        fields(booking_id = %event.booking_id, amount = %event.total_amount)
    )]
    pub async fn on_booking_created(&self, event: &BookingCreated) -> Result<PaymentOutcome> {
        let decision = self
            .authorizer
            .authorize(event.total_amount, &event.resource_id)
            .await;

        let status = match &decision {
            Decision::Approved => PaymentStatus::Success,
            Decision::Declined { reason } => {
                tracing::info!(reason = %reason, "payment declined");
                PaymentStatus::Failed
            }
        };

        let payment = Payment::new(event.booking_id, event.total_amount, status);
        let (payment_id, status) = match self.store.create(&payment).await {
            Ok(()) => (Some(payment.id), status),
            Err(e) => {
                tracing::error!(error = %e, "failed to record payment, reporting it as failed");
                (None, PaymentStatus::Failed)
            }
        };

        let outcome = PaymentOutcome {
            payment_id,
            booking_id: event.booking_id,
            amount: event.total_amount,
            status,
            transaction_id: payment.transaction_id,
        };

        metrics::counter!("payments_processed_total", "status" => status.as_str()).increment(1);
        tracing::info!(status = %status, transaction_id = %outcome.transaction_id, "payment processed");

        self.publisher.publish(&outcome).await?;
        Ok(outcome)
    }
}

impl<S: PaymentStore> PaymentProcessor<S, SimulatedAuthorizer> {
    /// Builds a processor with the simulated authorizer, publishing on `bus`.
    ///
    /// Amounts above `decline_above` are declined. A lost outcome is logged
    /// with its booking id; the booking stays PENDING until it is republished.
    pub fn simulated(
        store: S,
        bus: Arc<dyn EventBus>,
        publish_timeout: Duration,
        decline_above: Option<Money>,
    ) -> Self {
        let authorizer = match decline_above {
            Some(limit) => SimulatedAuthorizer::new().with_decline_above(limit),
            None => SimulatedAuthorizer::new(),
        };
        let publisher =
            EventPublisher::new(bus, publish_timeout).with_failure_callback(|failure| {
                tracing::warn!(
                    booking_id = %failure.key,
                    topic = %failure.topic,
                    error = %failure.error,
                    "payment outcome lost"
                );
            });

        Self::new(store, authorizer, publisher)
    }
}
