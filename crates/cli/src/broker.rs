//! Broker selection from configuration.

use algo_trade_alpaca::{AlpacaClient, AlpacaConfig, PaperBroker};
use algo_trade_core::{
    AccountStatus, BrokerAccount, BrokerConfig, BrokerError, BrokerMode, OrderAck,
    OrderSubmitter, OrderTicket,
};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// The brokerage the governance layer talks to in this process.
pub enum Broker {
    Paper(PaperBroker),
    Alpaca(AlpacaClient),
}

impl Broker {
    /// Builds the broker named by `config.mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if Alpaca credentials are missing from the environment.
    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        let alpaca = match config.mode {
            BrokerMode::Paper => return Ok(Self::Paper(PaperBroker::new(config.paper_equity))),
            BrokerMode::AlpacaPaper => AlpacaConfig::paper(),
            BrokerMode::AlpacaLive => AlpacaConfig::live(),
        };

        let mut alpaca = alpaca.with_timeout_secs(config.timeout_secs);
        if let Some(url) = &config.base_url {
            alpaca = alpaca.with_base_url(url.clone());
        }

        let client = AlpacaClient::from_env(alpaca).context("Failed to create Alpaca client")?;
        Ok(Self::Alpaca(client))
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Paper(_) => "paper",
            Self::Alpaca(_) => "alpaca",
        }
    }
}

#[async_trait]
impl BrokerAccount for Broker {
    async fn account_status(&self) -> Result<AccountStatus, BrokerError> {
        match self {
            Self::Paper(broker) => broker.account_status().await,
            Self::Alpaca(client) => client.account_status().await,
        }
    }
}

#[async_trait]
impl OrderSubmitter for Broker {
    async fn submit_order(&self, ticket: &OrderTicket) -> Result<OrderAck, BrokerError> {
        match self {
            Self::Paper(broker) => broker.submit_order(ticket).await,
            Self::Alpaca(client) => client.submit_order(ticket).await,
        }
    }
}
