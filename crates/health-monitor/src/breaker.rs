//! Persisted circuit breaker state.
//!
//! The breaker is a two-position latch. It opens once the consecutive
//! failure count reaches the threshold and stays open until a probe after
//! the cool-down window reports the broker healthy again. State transitions
//! here are pure; the monitor owns locking, persistence and alerting.

use algo_trade_core::Versioned;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Position
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPosition {
    /// Calls flow normally.
    #[default]
    Closed,
    /// Calls fail fast until a post-cool-down probe succeeds.
    Open,
}

/// What recording a failure did to the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Counter incremented, breaker position unchanged.
    Counted { failures: u32 },
    /// Threshold reached and the breaker opened.
    Tripped { failures: u32 },
    /// Breaker was already open past its cool-down; a fresh window began.
    Rearmed { failures: u32 },
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerState {
    pub position: BreakerPosition,
    pub consecutive_failures: u32,
    /// Start of the current cool-down window.
    pub tripped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_trips: u64,
}

impl Versioned for BreakerState {
    const SCHEMA_VERSION: u32 = 1;
}

impl BreakerState {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.position == BreakerPosition::Open
    }

    /// Time left in the cool-down window, `None` when closed or elapsed.
    #[must_use]
    pub fn cooldown_remaining(&self, cooldown: Duration, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_open() {
            return None;
        }
        // An open breaker without a trip time is eligible for re-probe.
        let tripped_at = self.tripped_at?;
        let remaining = tripped_at + cooldown - now;
        (remaining > Duration::zero()).then_some(remaining)
    }

    /// Open and still inside its cool-down window.
    #[must_use]
    pub fn is_blocking(&self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        self.cooldown_remaining(cooldown, now).is_some()
    }

    /// Open with the cool-down elapsed, so the next call should re-probe.
    #[must_use]
    pub fn awaiting_probe(&self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        self.is_open() && !self.is_blocking(cooldown, now)
    }

    pub fn record_failure(
        &mut self,
        threshold: u32,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> FailureOutcome {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;

        let position = self.position;
        match position {
            BreakerPosition::Closed if failures >= threshold => {
                self.position = BreakerPosition::Open;
                self.tripped_at = Some(now);
                self.total_trips += 1;
                FailureOutcome::Tripped { failures }
            }
            BreakerPosition::Open if self.rearm(cooldown, now) => {
                FailureOutcome::Rearmed { failures }
            }
            _ => FailureOutcome::Counted { failures },
        }
    }

    /// Opens the breaker regardless of the counter. Returns true if it was closed.
    pub fn force_open(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_open() {
            return false;
        }
        self.position = BreakerPosition::Open;
        self.tripped_at = Some(now);
        self.total_trips += 1;
        true
    }

    /// Starts a fresh cool-down window if the current one has elapsed.
    /// Returns true if the window moved.
    pub fn rearm(&mut self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        if !self.awaiting_probe(cooldown, now) {
            return false;
        }
        self.tripped_at = Some(now);
        true
    }

    pub fn reset_counter(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn close(&mut self) {
        self.position = BreakerPosition::Closed;
        self.consecutive_failures = 0;
        self.tripped_at = None;
    }
}
