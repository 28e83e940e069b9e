//! Payment authorization policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::Money;

/// Decision returned by an [`Authorizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Declined { reason: String },
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved)
    }
}

/// Decides whether a booking's payment goes through.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, amount: Money, resource_id: &str) -> Decision;
}

/// Simulated authorizer: approves everything unless told otherwise.
///
/// Declines can be forced for every payment or for amounts above a limit.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAuthorizer {
    decline_all: Arc<AtomicBool>,
    decline_above: Option<Money>,
}

impl SimulatedAuthorizer {
    /// Creates an authorizer that approves every payment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines payments strictly greater than `limit`.
    pub fn with_decline_above(mut self, limit: Money) -> Self {
        self.decline_above = Some(limit);
        self
    }

    /// Forces every subsequent decision to be a decline (or lifts that).
    pub fn set_decline(&self, decline: bool) {
        self.decline_all.store(decline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Authorizer for SimulatedAuthorizer {
    async fn authorize(&self, amount: Money, _resource_id: &str) -> Decision {
        if self.decline_all.load(Ordering::SeqCst) {
            return Decision::Declined {
                reason: "declined by configuration".to_string(),
            };
        }
        if let Some(limit) = self.decline_above
            && amount > limit
        {
            return Decision::Declined {
                reason: format!("amount {amount} exceeds limit {limit}"),
            };
        }
        Decision::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_approves_by_default() {
        let authorizer = SimulatedAuthorizer::new();
        assert!(
            authorizer
                .authorize(Money::from_cents(1_000_000), "r1")
                .await
                .is_approved()
        );
    }

    #[tokio::test]
    async fn test_decline_above_limit() {
        let authorizer = SimulatedAuthorizer::new().with_decline_above(Money::from_cents(10_000));

        assert!(authorizer.authorize(Money::from_cents(10_000), "r1").await.is_approved());
        assert!(!authorizer.authorize(Money::from_cents(10_001), "r1").await.is_approved());
    }

    #[tokio::test]
    async fn test_set_decline_is_shared_between_clones() {
        let authorizer = SimulatedAuthorizer::new();
        let clone = authorizer.clone();

        authorizer.set_decline(true);
        assert!(matches!(
            clone.authorize(Money::from_cents(1), "r1").await,
            Decision::Declined { .. }
        ));

        authorizer.set_decline(false);
        assert!(clone.authorize(Money::from_cents(1), "r1").await.is_approved());
    }
}
