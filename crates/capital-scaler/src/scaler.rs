//! Capital Scaler: profit-funded level state machine with risk gates.
//!
//! Every mutating operation clones the state, applies the change, writes the
//! clone to disk and only then swaps it in, so a failed write leaves both the
//! file and the in-memory state untouched.

use std::sync::Arc;

use algo_trade_core::{Clock, JsonStore, ScalerConfig, StorageConfig};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::breakers::{self, CircuitBreakerStatus, RiskAction, RiskLimits};
use crate::error::{Result, ScalerError};
use crate::sequence::GrowthSequence;
use crate::state::{HaltRecord, ScaleDirection, ScaleEvent, ScalingState};

// =============================================================================
// Decisions
// =============================================================================

/// Outcome of a scale-up or scale-down request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScaleDecision {
    Scaled(ScaleEvent),
    /// Profit is on the wrong side of `threshold`.
    NotEligible {
        threshold: Decimal,
        cumulative_profit: Decimal,
    },
    AtMaximum,
    AtMinimum,
}

impl ScaleDecision {
    #[must_use]
    pub fn is_scaled(&self) -> bool {
        matches!(self, Self::Scaled(_))
    }
}

/// Reporting view of the distance to the next level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub current_level: usize,
    pub daily_investment: Decimal,
    /// `None` at the top of the sequence.
    pub next_level: Option<usize>,
    pub next_daily_investment: Option<Decimal>,
    pub required_profit: Decimal,
    pub current_profit: Decimal,
    pub remaining: Decimal,
    /// Capped to `0..=100`.
    pub progress_pct: Decimal,
}

// =============================================================================
// Scaler
// =============================================================================

pub struct CapitalScaler {
    config: ScalerConfig,
    sequence: GrowthSequence,
    limits: RiskLimits,
    clock: Arc<dyn Clock>,
    state: Mutex<ScalingState>,
    store: JsonStore<ScalingState>,
}

impl CapitalScaler {
    /// Opens the scaler, restoring state or starting fresh at level 0.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid configuration or an unreadable state file.
    pub fn open(
        config: ScalerConfig,
        storage: &StorageConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let sequence = GrowthSequence::new(config.sequence.clone())?;
        let limits = RiskLimits::from(&config);
        limits.validate()?;
        if config.funding_days == 0 {
            return Err(ScalerError::invalid_config("funding_days must be positive"));
        }

        let store = JsonStore::new(storage.path_for(&config.state_file));
        let state = match store.load()? {
            Some(mut state) => {
                normalize(&mut state, &sequence);
                info!(
                    level = state.current_level,
                    daily_investment = %state.daily_investment,
                    cumulative_profit = %state.cumulative_profit,
                    "Restored scaling state"
                );
                state
            }
            None => {
                let state = ScalingState::new(
                    config.initial_equity,
                    sequence.amount_clamped(0),
                    clock.now().date_naive(),
                );
                store.save(&state)?;
                info!(equity = %config.initial_equity, "Initialized scaling state");
                state
            }
        };

        Ok(Self {
            config,
            sequence,
            limits,
            clock,
            state: Mutex::new(state),
            store,
        })
    }

    #[must_use]
    pub fn state(&self) -> ScalingState {
        self.state.lock().clone()
    }

    #[must_use]
    pub fn get_daily_investment(&self) -> Decimal {
        self.state.lock().daily_investment
    }

    // =========================================================================
    // Equity and P/L
    // =========================================================================

    /// Records current equity, raising the peak when exceeded.
    ///
    /// A drawdown at or beyond the maximum latches a halt that only
    /// [`Self::resume`] or [`Self::reset`] clears.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn update_equity(&self, equity: Decimal) -> Result<()> {
        let now = self.clock.now();
        let max_drawdown = self.limits.max_drawdown_pct;
        let latched = self.mutate(|state| {
            state.current_equity = equity;
            if equity > state.peak_equity {
                state.peak_equity = equity;
            }
            latch_halt(state, max_drawdown, now)
        })?;

        if let Some(halt) = latched {
            warn!(
                drawdown_pct = %halt.drawdown_pct.round_dp(2),
                equity = %halt.equity,
                peak_equity = %halt.peak_equity,
                "Max drawdown reached, trading halted pending review"
            );
        }
        Ok(())
    }

    /// Adds signed realized P/L to the cumulative profit.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn record_daily_pnl(&self, pnl: Decimal) -> Result<()> {
        let total = self.mutate(|state| {
            state.cumulative_profit += pnl;
            state.cumulative_profit
        })?;
        info!(pnl = %pnl, cumulative_profit = %total, "Recorded daily P/L");
        Ok(())
    }

    // =========================================================================
    // Risk gates
    // =========================================================================

    /// Evaluates drawdown and daily loss limits. Reads state only.
    #[must_use]
    pub fn check_circuit_breakers(
        &self,
        daily_pnl: Decimal,
        account_value: Option<Decimal>,
    ) -> CircuitBreakerStatus {
        let status = {
            let state = self.state.lock();
            breakers::evaluate(&state, &self.limits, daily_pnl, account_value)
        };

        if status.action != RiskAction::Continue {
            warn!(
                action = %status.action,
                drawdown_pct = %status.current_drawdown_pct.round_dp(2),
                daily_pnl_pct = %status.daily_pnl_pct.round_dp(2),
                multiplier = %status.suggested_position_size_multiplier.round_dp(2),
                "{}",
                status.reason
            );
        }
        status
    }

    // =========================================================================
    // Level transitions
    // =========================================================================

    #[must_use]
    pub fn should_scale_up(&self) -> bool {
        let state = self.state.lock();
        self.up_decision(&state).is_none()
    }

    #[must_use]
    pub fn should_scale_down(&self) -> bool {
        let state = self.state.lock();
        self.down_decision(&state).is_none()
    }

    /// Advances one level if banked profit funds the next level.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn scale_up(&self) -> Result<ScaleDecision> {
        let mut state = self.state.lock();
        if let Some(refusal) = self.up_decision(&state) {
            return Ok(refusal);
        }
        self.transition(&mut state, ScaleDirection::Up)
    }

    /// Retreats one level if profit fell below half the current level's funding.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn scale_down(&self) -> Result<ScaleDecision> {
        let mut state = self.state.lock();
        if let Some(refusal) = self.down_decision(&state) {
            return Ok(refusal);
        }
        self.transition(&mut state, ScaleDirection::Down)
    }

    /// End-of-day policy: retreat if required, else advance if funded, else hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn apply_scaling_policy(&self) -> Result<ScaleDecision> {
        let mut state = self.state.lock();
        if self.down_decision(&state).is_none() {
            return self.transition(&mut state, ScaleDirection::Down);
        }
        match self.up_decision(&state) {
            None => self.transition(&mut state, ScaleDirection::Up),
            Some(hold) => Ok(hold),
        }
    }

    /// Syncs equity, books the day's P/L and applies the scaling policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn close_trading_day(
        &self,
        pnl: Decimal,
        equity: Option<Decimal>,
    ) -> Result<ScaleDecision> {
        if let Some(equity) = equity {
            self.update_equity(equity)?;
        }
        self.record_daily_pnl(pnl)?;
        let decision = self.apply_scaling_policy()?;
        info!(
            pnl = %pnl,
            level = self.state.lock().current_level,
            scaled = decision.is_scaled(),
            "Closed trading day"
        );
        Ok(decision)
    }

    /// `None` when eligible, otherwise the refusal.
    fn up_decision(&self, state: &ScalingState) -> Option<ScaleDecision> {
        let Some(required) = self
            .sequence
            .funding_requirement(state.current_level + 1, self.config.funding_days)
        else {
            return Some(ScaleDecision::AtMaximum);
        };
        if state.cumulative_profit >= required {
            None
        } else {
            Some(ScaleDecision::NotEligible {
                threshold: required,
                cumulative_profit: state.cumulative_profit,
            })
        }
    }

    fn down_decision(&self, state: &ScalingState) -> Option<ScaleDecision> {
        if state.current_level == 0 {
            return Some(ScaleDecision::AtMinimum);
        }
        let threshold = self
            .sequence
            .funding_requirement(state.current_level, self.config.funding_days)
            .map_or(Decimal::ZERO, |f| f * self.config.scale_down_funding_ratio);
        if state.cumulative_profit < threshold {
            None
        } else {
            Some(ScaleDecision::NotEligible {
                threshold,
                cumulative_profit: state.cumulative_profit,
            })
        }
    }

    fn transition(
        &self,
        state: &mut ScalingState,
        direction: ScaleDirection,
    ) -> Result<ScaleDecision> {
        let from = state.current_level;
        let to = match direction {
            ScaleDirection::Up => from + 1,
            ScaleDirection::Down | ScaleDirection::Reset => from.saturating_sub(1),
        };
        let now = self.clock.now();
        let daily_investment = self.sequence.amount_clamped(to);
        let reason = match direction {
            ScaleDirection::Up => format!(
                "cumulative profit {} funds {} days at {}",
                state.cumulative_profit, self.config.funding_days, daily_investment
            ),
            _ => format!(
                "cumulative profit {} below {}% of level {} funding",
                state.cumulative_profit,
                (self.config.scale_down_funding_ratio * Decimal::ONE_HUNDRED).normalize(),
                from
            ),
        };
        let event = ScaleEvent {
            timestamp: now,
            direction,
            from_level: from,
            to_level: to,
            daily_investment,
            cumulative_profit: state.cumulative_profit,
            reason,
        };

        let mut next = state.clone();
        next.current_level = to;
        next.daily_investment = daily_investment;
        next.last_scale_date = Some(now.date_naive());
        next.scale_history.push(event.clone());
        self.store.save(&next)?;
        *state = next;

        info!(
            direction = %direction,
            from_level = from,
            to_level = to,
            daily_investment = %daily_investment,
            cumulative_profit = %event.cumulative_profit,
            "Capital level changed"
        );
        Ok(ScaleDecision::Scaled(event))
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    #[must_use]
    pub fn get_progress_to_next_level(&self) -> LevelProgress {
        let state = self.state.lock();
        let next_level = state.current_level + 1;
        let current_profit = state.cumulative_profit;

        let Some(required) = self
            .sequence
            .funding_requirement(next_level, self.config.funding_days)
        else {
            return LevelProgress {
                current_level: state.current_level,
                daily_investment: state.daily_investment,
                next_level: None,
                next_daily_investment: None,
                required_profit: Decimal::ZERO,
                current_profit,
                remaining: Decimal::ZERO,
                progress_pct: Decimal::ONE_HUNDRED,
            };
        };

        let progress_pct = (current_profit / required * Decimal::ONE_HUNDRED)
            .max(Decimal::ZERO)
            .min(Decimal::ONE_HUNDRED);

        LevelProgress {
            current_level: state.current_level,
            daily_investment: state.daily_investment,
            next_level: Some(next_level),
            next_daily_investment: self.sequence.amount(next_level),
            required_profit: required,
            current_profit,
            remaining: (required - current_profit).max(Decimal::ZERO),
            progress_pct,
        }
    }

    // =========================================================================
    // Operator controls
    // =========================================================================

    /// Clears a latched halt after manual review. Returns true if one was set.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn resume(&self) -> Result<bool> {
        let cleared = self.mutate(|state| state.halted.take())?;
        if let Some(halt) = &cleared {
            info!(halted_at = %halt.at, "Trading halt cleared by operator");
        }
        Ok(cleared.is_some())
    }

    /// Restarts at level 0 with zero profit and `starting_equity` as the peak.
    /// The level history is kept and records the reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn reset(&self, starting_equity: Decimal) -> Result<()> {
        let now = self.clock.now();
        let base = self.sequence.amount_clamped(0);
        let previous = self.mutate(|state| {
            let previous = state.current_level;
            let event = ScaleEvent {
                timestamp: now,
                direction: ScaleDirection::Reset,
                from_level: previous,
                to_level: 0,
                daily_investment: base,
                cumulative_profit: state.cumulative_profit,
                reason: format!("operator reset with starting equity {starting_equity}"),
            };
            let mut history = std::mem::take(&mut state.scale_history);
            history.push(event);

            *state = ScalingState::new(starting_equity, base, now.date_naive());
            state.scale_history = history;
            previous
        })?;

        warn!(
            from_level = previous,
            starting_equity = %starting_equity,
            "Capital scaler reset by operator"
        );
        Ok(())
    }

    /// Writes the current state to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    pub fn flush(&self) -> Result<()> {
        let state = self.state.lock();
        self.store.save(&state)?;
        Ok(())
    }

    fn mutate<R>(&self, apply: impl FnOnce(&mut ScalingState) -> R) -> Result<R> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let out = apply(&mut next);
        self.store.save(&next)?;
        *state = next;
        Ok(out)
    }
}

/// Clamps the level into the sequence and re-derives the daily investment.
fn normalize(state: &mut ScalingState, sequence: &GrowthSequence) {
    let clamped = sequence.clamp(state.current_level);
    if clamped != state.current_level {
        warn!(
            stored = state.current_level,
            max = sequence.max_level(),
            "Stored level beyond growth sequence, clamping"
        );
        state.current_level = clamped;
    }
    state.daily_investment = sequence.amount_clamped(clamped);
}

fn latch_halt(
    state: &mut ScalingState,
    max_drawdown_pct: Decimal,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<HaltRecord> {
    if state.halted.is_some() {
        return None;
    }
    let drawdown = state.drawdown_pct();
    if drawdown < max_drawdown_pct {
        return None;
    }
    let record = HaltRecord {
        at: now,
        drawdown_pct: drawdown,
        equity: state.current_equity,
        peak_equity: state.peak_equity,
    };
    state.halted = Some(record.clone());
    Some(record)
}
