//! Shared brokerage types.
//!
//! The governance layer only needs a thin slice of the broker: an account
//! status probe and an opaque "place this order" call. These types are that
//! slice, shared by the adapters and the Health Monitor.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account snapshot returned by the lightweight status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub equity: Decimal,
    pub buying_power: Decimal,
    /// Broker refuses new orders on this account.
    pub trading_blocked: bool,
    /// Broker has locked the account entirely.
    pub account_blocked: bool,
}

impl AccountStatus {
    /// True if the broker has declared the account or its trading blocked.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.trading_blocked || self.account_blocked
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(format!("invalid order side: {other}")),
        }
    }
}

/// A notional-sized order as the execution layer hands it to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub symbol: String,
    /// Dollar amount to trade.
    pub notional: Decimal,
    pub side: OrderSide,
    /// Strategy tier or classification the order belongs to.
    pub tier: String,
}

impl OrderTicket {
    pub fn new(
        symbol: impl Into<String>,
        notional: Decimal,
        side: OrderSide,
        tier: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            notional,
            side,
            tier: tier.into(),
        }
    }
}

/// Broker acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub submitted_at: DateTime<Utc>,
}

/// Errors a brokerage call can fail with.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrokerError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// API request failed.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    /// Order or request refused by the broker on its merits.
    #[error("rejected by broker: {0}")]
    Rejected(String),

    /// Broker has blocked trading or the account.
    #[error("account blocked: {0}")]
    AccountBlocked(String),

    /// Response could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl BrokerError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Returns true if repeating the same call may succeed.
    ///
    /// Rejections and account blocks are final: retrying them only burns the
    /// backoff budget.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_) | Self::AccountBlocked(_))
    }
}
