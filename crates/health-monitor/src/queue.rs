//! Durable FIFO of orders that failed and await replay.

use std::collections::VecDeque;

use algo_trade_core::{OrderSide, OrderTicket, StoreError, Versioned};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::HealthStatus;

fn default_max_retries() -> u32 {
    3
}

/// A failed order held for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOrder {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub symbol: String,
    #[serde(alias = "amount")]
    pub notional: Decimal,
    pub side: OrderSide,
    #[serde(default)]
    pub tier: String,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default, alias = "error")]
    pub last_error: Option<String>,
}

impl QueuedOrder {
    pub fn new(
        ticket: OrderTicket,
        error: impl Into<String>,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: ticket.symbol,
            notional: ticket.notional,
            side: ticket.side,
            tier: ticket.tier,
            created_at: now,
            retry_count: 0,
            max_retries,
            last_error: Some(error.into()),
        }
    }

    /// Rebuilds the ticket handed to the replay executor.
    #[must_use]
    pub fn ticket(&self) -> OrderTicket {
        OrderTicket {
            symbol: self.symbol.clone(),
            notional: self.notional,
            side: self.side,
            tier: self.tier.clone(),
        }
    }

    /// True once replays have exceeded the allowance.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.retry_count > self.max_retries
    }
}

/// Persisted queue document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderQueue {
    pub orders: VecDeque<QueuedOrder>,
}

impl Versioned for OrderQueue {
    const SCHEMA_VERSION: u32 = 1;

    /// Legacy queue files are a bare JSON array of orders.
    fn migrate(version: u32, payload: serde_json::Value) -> Result<Self, StoreError> {
        let parsed = if payload.is_array() {
            serde_json::from_value::<VecDeque<QueuedOrder>>(payload).map(|orders| Self { orders })
        } else {
            serde_json::from_value::<Self>(payload)
        };
        parsed.map_err(|e| StoreError::Migration {
            from: version,
            reason: e.to_string(),
        })
    }
}

impl OrderQueue {
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn push(&mut self, order: QueuedOrder) {
        self.orders.push_back(order);
    }
}

/// Outcome of one queue replay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Orders the executor placed successfully and that left the queue.
    pub replayed: usize,
    /// Orders that failed again and stay queued.
    pub failed: usize,
    /// Orders dropped after exceeding their replay allowance.
    pub discarded: usize,
    /// Queue length after the pass.
    pub remaining: usize,
    /// Set when the pass was skipped because the broker was unfit.
    pub skipped_status: Option<HealthStatus>,
}

impl DrainReport {
    pub(crate) fn skipped(status: HealthStatus, remaining: usize) -> Self {
        Self {
            remaining,
            skipped_status: Some(status),
            ..Default::default()
        }
    }

    /// Count of orders processed successfully.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.replayed
    }

    #[must_use]
    pub fn was_skipped(&self) -> bool {
        self.skipped_status.is_some()
    }
}
