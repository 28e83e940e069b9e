use std::sync::Arc;

use async_trait::async_trait;
use common::PaymentOutcome;
use event_bus::{HandlerError, Message, MessageHandler};

use crate::coordinator::BookingCoordinator;
use crate::error::BookingError;
use crate::store::BookingStore;

/// Feeds `payment.success` and `payment.failed` messages to the coordinator.
///
/// Outcomes for unknown bookings are logged and dropped.
pub struct PaymentOutcomeHandler<S: BookingStore> {
    coordinator: Arc<BookingCoordinator<S>>,
}

impl<S: BookingStore> PaymentOutcomeHandler<S> {
    pub fn new(coordinator: Arc<BookingCoordinator<S>>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl<S: BookingStore + 'static> MessageHandler for PaymentOutcomeHandler<S> {
    fn name(&self) -> &'static str {
        "PaymentOutcomeHandler"
    }

    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let event: PaymentOutcome = message.decode()?;

        if event.status.topic() != message.topic {
            tracing::warn!(
                topic = %message.topic,
                status = %event.status,
                booking_id = %event.booking_id,
                "outcome status does not match its topic, using the status"
            );
        }

        match self.coordinator.on_payment_outcome(&event).await {
            Ok(_) => Ok(()),
            Err(BookingError::NotFound(id)) => {
                tracing::warn!(booking_id = %id, "payment outcome for unknown booking dropped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
