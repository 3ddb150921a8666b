use crate::broker::{AccountStatus, BrokerError, OrderAck, OrderTicket};
use async_trait::async_trait;

/// Lightweight account probe used for health checks and equity syncs.
#[async_trait]
pub trait BrokerAccount: Send + Sync {
    async fn account_status(&self) -> Result<AccountStatus, BrokerError>;
}

/// Places a single order and reports only success or failure.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn submit_order(&self, ticket: &OrderTicket) -> Result<OrderAck, BrokerError>;
}

#[async_trait]
impl<T: BrokerAccount + ?Sized> BrokerAccount for std::sync::Arc<T> {
    async fn account_status(&self) -> Result<AccountStatus, BrokerError> {
        (**self).account_status().await
    }
}

#[async_trait]
impl<T: OrderSubmitter + ?Sized> OrderSubmitter for std::sync::Arc<T> {
    async fn submit_order(&self, ticket: &OrderTicket) -> Result<OrderAck, BrokerError> {
        (**self).submit_order(ticket).await
    }
}
