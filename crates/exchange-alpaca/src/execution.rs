use algo_trade_core::{BrokerError, OrderAck, OrderSubmitter, OrderTicket};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::client::AlpacaClient;
use crate::types::{OrderRequest, RawOrder};

impl AlpacaClient {
    /// Submits a notional market order good for the day.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` when Alpaca refuses the order, otherwise a classified broker error.
    pub async fn place_notional_order(&self, ticket: &OrderTicket) -> Result<OrderAck, BrokerError> {
        let request = OrderRequest::from(ticket);
        let raw: RawOrder = self.post("/v2/orders", &request).await?;
        let ack = raw.into_ack(Utc::now());

        info!(
            order_id = %ack.order_id,
            symbol = %ticket.symbol,
            notional = %ticket.notional,
            side = %ticket.side,
            tier = %ticket.tier,
            "Alpaca order submitted"
        );
        Ok(ack)
    }
}

#[async_trait]
impl OrderSubmitter for AlpacaClient {
    async fn submit_order(&self, ticket: &OrderTicket) -> Result<OrderAck, BrokerError> {
        self.place_notional_order(ticket).await
    }
}
