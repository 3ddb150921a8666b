//! Persisted scaling state and its audit trail.

use algo_trade_core::{StoreError, Versioned};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    Up,
    Down,
    Reset,
}

impl std::fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// One entry in the append-only level history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleEvent {
    pub timestamp: DateTime<Utc>,
    pub direction: ScaleDirection,
    pub from_level: usize,
    pub to_level: usize,
    /// Daily investment after the transition.
    pub daily_investment: Decimal,
    /// Cumulative profit at the moment of transition.
    pub cumulative_profit: Decimal,
    pub reason: String,
}

/// Latched drawdown halt awaiting operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltRecord {
    pub at: DateTime<Utc>,
    pub drawdown_pct: Decimal,
    pub equity: Decimal,
    pub peak_equity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingState {
    pub current_level: usize,
    /// Always the sequence amount at `current_level`.
    pub daily_investment: Decimal,
    /// Realized P/L since `start_date`. Only daily P/L and an explicit reset change it.
    pub cumulative_profit: Decimal,
    /// High-water mark; only an explicit reset lowers it.
    pub peak_equity: Decimal,
    pub current_equity: Decimal,
    pub start_date: NaiveDate,
    pub last_scale_date: Option<NaiveDate>,
    #[serde(default)]
    pub scale_history: Vec<ScaleEvent>,
    #[serde(default)]
    pub halted: Option<HaltRecord>,
}

impl ScalingState {
    /// Fresh state at level 0.
    pub fn new(starting_equity: Decimal, daily_investment: Decimal, start_date: NaiveDate) -> Self {
        Self {
            current_level: 0,
            daily_investment,
            cumulative_profit: Decimal::ZERO,
            peak_equity: starting_equity,
            current_equity: starting_equity,
            start_date,
            last_scale_date: None,
            scale_history: Vec::new(),
            halted: None,
        }
    }

    /// Decline from peak as a percentage; zero without a positive peak.
    #[must_use]
    pub fn drawdown_pct(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.current_equity) / self.peak_equity * Decimal::ONE_HUNDRED
    }
}

impl Versioned for ScalingState {
    const SCHEMA_VERSION: u32 = 1;

    /// Version 0 is the bare record written before envelopes existed.
    ///
    /// Its `daily_investment` is not trusted; the scaler re-derives it from the
    /// configured sequence on open.
    fn migrate(version: u32, payload: serde_json::Value) -> Result<Self, StoreError> {
        let fail = |reason: String| StoreError::Migration {
            from: version,
            reason,
        };

        if version != 0 {
            return serde_json::from_value(payload).map_err(|e| fail(e.to_string()));
        }

        let legacy: LegacyState =
            serde_json::from_value(payload).map_err(|e| fail(e.to_string()))?;
        let start_date = legacy
            .start_date
            .as_deref()
            .and_then(parse_legacy_date)
            .ok_or_else(|| fail("missing or invalid start_date".to_string()))?;

        let scale_history = legacy
            .scale_history
            .into_iter()
            .filter_map(LegacyEvent::into_event)
            .collect();

        Ok(Self {
            current_level: legacy.current_level,
            daily_investment: legacy.daily_investment,
            cumulative_profit: legacy.cumulative_profit,
            peak_equity: legacy.peak_equity,
            current_equity: legacy.current_equity,
            start_date,
            last_scale_date: legacy.last_scale_date.as_deref().and_then(parse_legacy_date),
            scale_history,
            halted: None,
        })
    }
}

// =============================================================================
// Legacy schema
// =============================================================================

#[derive(Debug, Deserialize)]
struct LegacyState {
    #[serde(default)]
    current_level: usize,
    #[serde(default)]
    daily_investment: Decimal,
    #[serde(default)]
    cumulative_profit: Decimal,
    #[serde(default)]
    peak_equity: Decimal,
    #[serde(default)]
    current_equity: Decimal,
    start_date: Option<String>,
    last_scale_date: Option<String>,
    #[serde(default)]
    scale_history: Vec<LegacyEvent>,
}

#[derive(Debug, Deserialize)]
struct LegacyEvent {
    #[serde(alias = "timestamp")]
    date: Option<String>,
    from_level: Option<usize>,
    to_level: Option<usize>,
    #[serde(default, alias = "new_daily_investment")]
    daily_investment: Decimal,
    #[serde(default, alias = "profit_at_scale")]
    cumulative_profit: Decimal,
    #[serde(default, alias = "type")]
    reason: Option<String>,
}

impl LegacyEvent {
    fn into_event(self) -> Option<ScaleEvent> {
        let from_level = self.from_level?;
        let to_level = self.to_level?;
        let timestamp = self
            .date
            .as_deref()
            .and_then(parse_legacy_timestamp)?;
        let direction = if to_level >= from_level {
            ScaleDirection::Up
        } else {
            ScaleDirection::Down
        };
        Some(ScaleEvent {
            timestamp,
            direction,
            from_level,
            to_level,
            daily_investment: self.daily_investment,
            cumulative_profit: self.cumulative_profit,
            reason: self.reason.unwrap_or_else(|| format!("scale {direction}")),
        })
    }
}

fn parse_legacy_date(raw: &str) -> Option<NaiveDate> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    parse_legacy_date(raw)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
