use std::sync::Arc;

use async_trait::async_trait;
use common::BookingCreated;
use event_bus::{HandlerError, Message, MessageHandler};

use crate::authorizer::Authorizer;
use crate::processor::PaymentProcessor;
use crate::store::PaymentStore;

/// Feeds `booking.created` messages to the payment processor.
pub struct BookingCreatedHandler<S: PaymentStore, A: Authorizer> {
    processor: Arc<PaymentProcessor<S, A>>,
}

impl<S: PaymentStore, A: Authorizer> BookingCreatedHandler<S, A> {
    pub fn new(processor: Arc<PaymentProcessor<S, A>>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl<S, A> MessageHandler for BookingCreatedHandler<S, A>
where
    S: PaymentStore + 'static,
    A: Authorizer + 'static,
{
    fn name(&self) -> &'static str {
        "BookingCreatedHandler"
    }

    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let event: BookingCreated = message.decode()?;
        self.processor.on_booking_created(&event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::{BookingId, IntegrationEvent, Money, topics};
    use event_bus::{EventPublisher, InMemoryEventBus};

    use super::*;
    use crate::authorizer::SimulatedAuthorizer;
    use crate::memory::InMemoryPaymentStore;

    #[tokio::test]
    async fn test_decodes_and_processes() {
        let bus = InMemoryEventBus::new();
        let processor = Arc::new(PaymentProcessor::new(
            InMemoryPaymentStore::new(),
            SimulatedAuthorizer::new(),
            EventPublisher::new(Arc::new(bus.clone()), Duration::from_secs(1)),
        ));
        let handler = BookingCreatedHandler::new(processor.clone());
        let event = BookingCreated {
            booking_id: BookingId::new(),
            user_id: "u1".to_string(),
            resource_id: "r1".to_string(),
            total_amount: Money::from_cents(2500),
        };
        let message = Message {
            topic: topics::BOOKING_CREATED.to_string(),
            key: event.partition_key(),
            payload: event.encode().unwrap(),
            offset: 0,
        };

        handler.handle(&message).await.unwrap();

        assert_eq!(processor.store().payment_count().await, 1);
        assert_eq!(bus.published(topics::PAYMENT_SUCCESS).await.len(), 1);
        assert_eq!(
            bus.published(topics::PAYMENT_SUCCESS).await[0].key,
            event.booking_id.to_string()
        );
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let processor = Arc::new(PaymentProcessor::new(
            InMemoryPaymentStore::new(),
            SimulatedAuthorizer::new(),
            EventPublisher::new(Arc::new(InMemoryEventBus::new()), Duration::from_secs(1)),
        ));
        let handler = BookingCreatedHandler::new(processor.clone());
        let message = Message {
            topic: topics::BOOKING_CREATED.to_string(),
            key: "k".to_string(),
            payload: br#"{"booking_id":"not-a-uuid"}"#.to_vec(),
            offset: 0,
        };

        assert!(handler.handle(&message).await.is_err());
        assert_eq!(processor.store().payment_count().await, 0);
    }
}
