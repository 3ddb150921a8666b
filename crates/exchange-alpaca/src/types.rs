//! Raw Alpaca REST payloads and their conversion into shared broker types.

use algo_trade_core::{AccountStatus, BrokerError, OrderAck, OrderSide, OrderTicket};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `GET /v2/account` response. Alpaca encodes money as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAccount {
    #[allow(dead_code)]
    pub id: Option<String>,
    pub status: Option<String>,
    pub equity: String,
    pub buying_power: String,
    #[serde(default)]
    pub trading_blocked: bool,
    #[serde(default)]
    pub account_blocked: bool,
}

impl TryFrom<RawAccount> for AccountStatus {
    type Error = BrokerError;

    fn try_from(raw: RawAccount) -> Result<Self, Self::Error> {
        let equity = parse_decimal("equity", &raw.equity)?;
        let buying_power = parse_decimal("buying_power", &raw.buying_power)?;
        // Anything other than ACTIVE means the broker will refuse orders.
        let inactive = raw
            .status
            .as_deref()
            .is_some_and(|s| !s.eq_ignore_ascii_case("ACTIVE"));

        Ok(Self {
            equity,
            buying_power,
            trading_blocked: raw.trading_blocked,
            account_blocked: raw.account_blocked || inactive,
        })
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, BrokerError> {
    value
        .parse::<Decimal>()
        .map_err(|e| BrokerError::Serialization(format!("invalid {field} '{value}': {e}")))
}

/// `POST /v2/orders` body for a notional market order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct OrderRequest {
    pub symbol: String,
    pub notional: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub time_in_force: &'static str,
}

impl From<&OrderTicket> for OrderRequest {
    fn from(ticket: &OrderTicket) -> Self {
        Self {
            symbol: ticket.symbol.clone(),
            notional: ticket.notional.round_dp(2).to_string(),
            side: ticket.side,
            order_type: "market",
            time_in_force: "day",
        }
    }
}

/// Subset of the order object returned on submission.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOrder {
    pub id: String,
    pub submitted_at: Option<DateTime<Utc>>,
    #[allow(dead_code)]
    pub status: Option<String>,
}

impl RawOrder {
    pub fn into_ack(self, fallback: DateTime<Utc>) -> OrderAck {
        OrderAck {
            order_id: self.id,
            submitted_at: self.submitted_at.unwrap_or(fallback),
        }
    }
}

/// Error body Alpaca returns on 4xx/5xx.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawError {
    pub message: Option<String>,
}
