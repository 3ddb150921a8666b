use algo_trade_core::{AccountStatus, BrokerAccount, BrokerError};
use async_trait::async_trait;
use tracing::debug;

use crate::client::AlpacaClient;
use crate::types::RawAccount;

impl AlpacaClient {
    /// Fetches the account snapshot.
    ///
    /// # Errors
    ///
    /// Returns a classified broker error on transport, HTTP or decode failure.
    pub async fn account(&self) -> Result<AccountStatus, BrokerError> {
        let raw: RawAccount = self.get("/v2/account").await?;
        let status = AccountStatus::try_from(raw)?;
        debug!(
            equity = %status.equity,
            buying_power = %status.buying_power,
            trading_blocked = status.trading_blocked,
            account_blocked = status.account_blocked,
            "Fetched Alpaca account"
        );
        Ok(status)
    }
}

#[async_trait]
impl BrokerAccount for AlpacaClient {
    async fn account_status(&self) -> Result<AccountStatus, BrokerError> {
        self.account().await
    }
}
