//! In-process paper broker.
//!
//! Fills every order immediately against an in-memory account and never
//! touches the network. Failures can be injected to exercise retry and
//! circuit-breaker paths end to end.

use std::collections::VecDeque;

use algo_trade_core::{
    AccountStatus, BrokerAccount, BrokerError, OrderAck, OrderSide, OrderSubmitter, OrderTicket,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::info;

#[derive(Debug)]
struct PaperAccount {
    equity: Decimal,
    buying_power: Decimal,
    trading_blocked: bool,
    account_blocked: bool,
    pending_failures: VecDeque<BrokerError>,
    fills: Vec<(OrderAck, OrderTicket)>,
    next_order: u64,
}

#[derive(Debug)]
pub struct PaperBroker {
    account: Mutex<PaperAccount>,
}

impl PaperBroker {
    pub fn new(equity: Decimal) -> Self {
        Self {
            account: Mutex::new(PaperAccount {
                equity,
                buying_power: equity,
                trading_blocked: false,
                account_blocked: false,
                pending_failures: VecDeque::new(),
                fills: Vec::new(),
                next_order: 1,
            }),
        }
    }

    /// Makes the next `times` calls fail with `error`.
    pub fn fail_next(&self, error: BrokerError, times: usize) {
        let mut account = self.account.lock();
        account
            .pending_failures
            .extend(std::iter::repeat(error).take(times));
    }

    pub fn set_equity(&self, equity: Decimal) {
        let mut account = self.account.lock();
        account.equity = equity;
        account.buying_power = equity;
    }

    pub fn set_blocked(&self, trading_blocked: bool, account_blocked: bool) {
        let mut account = self.account.lock();
        account.trading_blocked = trading_blocked;
        account.account_blocked = account_blocked;
    }

    /// Tickets filled so far, oldest first.
    #[must_use]
    pub fn fills(&self) -> Vec<OrderTicket> {
        self.account
            .lock()
            .fills
            .iter()
            .map(|(_, ticket)| ticket.clone())
            .collect()
    }
}

#[async_trait]
impl BrokerAccount for PaperBroker {
    async fn account_status(&self) -> Result<AccountStatus, BrokerError> {
        let mut account = self.account.lock();
        if let Some(err) = account.pending_failures.pop_front() {
            return Err(err);
        }
        Ok(AccountStatus {
            equity: account.equity,
            buying_power: account.buying_power,
            trading_blocked: account.trading_blocked,
            account_blocked: account.account_blocked,
        })
    }
}

#[async_trait]
impl OrderSubmitter for PaperBroker {
    async fn submit_order(&self, ticket: &OrderTicket) -> Result<OrderAck, BrokerError> {
        let mut account = self.account.lock();
        if let Some(err) = account.pending_failures.pop_front() {
            return Err(err);
        }
        if account.trading_blocked || account.account_blocked {
            return Err(BrokerError::AccountBlocked(
                "paper account is blocked".to_string(),
            ));
        }
        if ticket.notional <= Decimal::ZERO {
            return Err(BrokerError::Rejected(format!(
                "notional must be positive, got {}",
                ticket.notional
            )));
        }
        if ticket.side == OrderSide::Buy && ticket.notional > account.buying_power {
            return Err(BrokerError::Rejected("insufficient buying power".to_string()));
        }

        match ticket.side {
            OrderSide::Buy => account.buying_power -= ticket.notional,
            OrderSide::Sell => account.buying_power += ticket.notional,
        }

        let ack = OrderAck {
            order_id: format!("PAPER-{}", account.next_order),
            submitted_at: Utc::now(),
        };
        account.next_order += 1;
        account.fills.push((ack.clone(), ticket.clone()));

        info!(
            order_id = %ack.order_id,
            symbol = %ticket.symbol,
            notional = %ticket.notional,
            side = %ticket.side,
            "Paper fill simulated"
        );
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_paper_fill_reduces_buying_power() {
        let broker = PaperBroker::new(dec!(1000));
        let ticket = OrderTicket::new("SPY", dec!(150), OrderSide::Buy, "core");

        let ack = broker.submit_order(&ticket).await.unwrap();
        assert_eq!(ack.order_id, "PAPER-1");

        let status = broker.account_status().await.unwrap();
        assert_eq!(status.equity, dec!(1000));
        assert_eq!(status.buying_power, dec!(850));
        assert_eq!(broker.fills(), vec![ticket]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let broker = PaperBroker::new(dec!(1000));
        broker.fail_next(BrokerError::Network("down".to_string()), 2);

        assert!(broker.account_status().await.is_err());
        let ticket = OrderTicket::new("SPY", dec!(10), OrderSide::Buy, "core");
        assert!(matches!(
            broker.submit_order(&ticket).await,
            Err(BrokerError::Network(_))
        ));
        assert!(broker.submit_order(&ticket).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_oversized_and_blocked_orders() {
        let broker = PaperBroker::new(dec!(100));
        let big = OrderTicket::new("SPY", dec!(150), OrderSide::Buy, "core");
        assert!(matches!(
            broker.submit_order(&big).await,
            Err(BrokerError::Rejected(_))
        ));

        broker.set_blocked(true, false);
        let small = OrderTicket::new("SPY", dec!(10), OrderSide::Buy, "core");
        assert!(matches!(
            broker.submit_order(&small).await,
            Err(BrokerError::AccountBlocked(_))
        ));
        assert!(broker.account_status().await.unwrap().is_blocked());
    }
}
