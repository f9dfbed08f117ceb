use crate::domain::ports::PaymentGateway;
use crate::domain::pricing::Fare;
use crate::domain::ride::{PaymentAction, RideId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A payment processor stand-in that accepts every request and logs it.
///
/// Operations are recorded per ride; repeating one is a no-op, so retries
/// and reconciliation replays never double-charge.
#[derive(Default, Clone)]
pub struct LoggingPaymentGateway {
    operations: Arc<RwLock<HashMap<RideId, Vec<PaymentAction>>>>,
}

impl LoggingPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations the processor has accepted for a ride, in order.
    pub async fn operations(&self, ride: RideId) -> Vec<PaymentAction> {
        let operations = self.operations.read().await;
        operations.get(&ride).cloned().unwrap_or_default()
    }

    async fn apply(&self, ride: RideId, action: PaymentAction) -> bool {
        let mut operations = self.operations.write().await;
        let history = operations.entry(ride).or_default();
        if history.contains(&action) {
            return false;
        }
        history.push(action);
        true
    }
}

#[async_trait]
impl PaymentGateway for LoggingPaymentGateway {
    async fn capture(&self, ride: RideId, fare: Fare) -> Result<()> {
        if self.apply(ride, PaymentAction::Capture).await {
            tracing::info!(ride_id = %ride, amount = %fare, "Payment captured");
        }
        Ok(())
    }

    async fn refund(&self, ride: RideId, fare: Fare) -> Result<()> {
        if self.apply(ride, PaymentAction::Refund).await {
            tracing::info!(ride_id = %ride, amount = %fare, "Payment refunded");
        }
        Ok(())
    }

    async fn void(&self, ride: RideId) -> Result<()> {
        if self.apply(ride, PaymentAction::Void).await {
            tracing::info!(ride_id = %ride, "Payment authorization voided");
        }
        Ok(())
    }
}
