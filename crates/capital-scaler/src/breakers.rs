//! Risk circuit breakers.
//!
//! A pure evaluation of drawdown and daily loss against the configured
//! limits, checked in strict priority order:
//!
//! 1. drawdown at or above the maximum: `Halt`, multiplier 0
//! 2. daily loss at or beyond the limit: `PauseToday`, multiplier 0
//! 3. drawdown inside the scale-down zone: `ScaleDown`, linear ramp from 1.0
//!    at the zone start to the floor at the maximum
//! 4. otherwise `Continue`, multiplier 1
//!
//! All percentages are expressed in percent units (`16` means 16%).

use algo_trade_core::ScalerConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScalerError};
use crate::state::ScalingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    Continue,
    PauseToday,
    ScaleDown,
    Halt,
}

impl RiskAction {
    /// True when no new position may be opened.
    #[must_use]
    pub fn blocks_trading(self) -> bool {
        matches!(self, Self::PauseToday | Self::Halt)
    }
}

impl std::fmt::Display for RiskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::PauseToday => write!(f, "pause_today"),
            Self::ScaleDown => write!(f, "scale_down"),
            Self::Halt => write!(f, "halt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerStatus {
    pub action: RiskAction,
    pub reason: String,
    pub current_drawdown_pct: Decimal,
    pub daily_pnl_pct: Decimal,
    /// Factor in `[0, 1]` applied to normal position size.
    pub suggested_position_size_multiplier: Decimal,
}

/// Thresholds the breakers evaluate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskLimits {
    pub max_drawdown_pct: Decimal,
    pub daily_loss_limit_pct: Decimal,
    pub scale_down_drawdown_pct: Decimal,
    pub min_position_multiplier: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self::from(&ScalerConfig::default())
    }
}

impl From<&ScalerConfig> for RiskLimits {
    fn from(config: &ScalerConfig) -> Self {
        Self {
            max_drawdown_pct: config.max_drawdown_pct,
            daily_loss_limit_pct: config.daily_loss_limit_pct,
            scale_down_drawdown_pct: config.scale_down_drawdown_pct,
            min_position_multiplier: config.min_position_multiplier,
        }
    }
}

impl RiskLimits {
    /// # Errors
    ///
    /// Returns an error if the zone is empty or the floor is outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.max_drawdown_pct <= Decimal::ZERO || self.daily_loss_limit_pct <= Decimal::ZERO {
            return Err(ScalerError::invalid_config(
                "drawdown and daily loss limits must be positive",
            ));
        }
        if self.scale_down_drawdown_pct >= self.max_drawdown_pct {
            return Err(ScalerError::invalid_config(format!(
                "scale-down drawdown {}% must be below max drawdown {}%",
                self.scale_down_drawdown_pct, self.max_drawdown_pct
            )));
        }
        if self.min_position_multiplier < Decimal::ZERO
            || self.min_position_multiplier > Decimal::ONE
        {
            return Err(ScalerError::invalid_config(format!(
                "min position multiplier {} must be within [0, 1]",
                self.min_position_multiplier
            )));
        }
        Ok(())
    }

    /// Multiplier inside the scale-down zone for `drawdown_pct`.
    #[must_use]
    pub fn scale_down_multiplier(&self, drawdown_pct: Decimal) -> Decimal {
        let floor = self.min_position_multiplier;
        let span = self.max_drawdown_pct - self.scale_down_drawdown_pct;
        if span <= Decimal::ZERO {
            return floor;
        }
        let depth = (drawdown_pct - self.scale_down_drawdown_pct) / span;
        let ramp = Decimal::ONE - depth * (Decimal::ONE - floor);
        ramp.max(floor).min(Decimal::ONE)
    }
}

/// Daily P/L as a percentage of `basis`; zero without a positive basis.
#[must_use]
pub fn daily_pnl_pct(daily_pnl: Decimal, basis: Decimal) -> Decimal {
    if basis <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    daily_pnl / basis * Decimal::ONE_HUNDRED
}

/// Evaluates the breakers for `state` and today's P/L.
///
/// `account_value` overrides the current equity as the daily P/L basis.
#[must_use]
pub fn evaluate(
    state: &ScalingState,
    limits: &RiskLimits,
    daily_pnl: Decimal,
    account_value: Option<Decimal>,
) -> CircuitBreakerStatus {
    let drawdown = state.drawdown_pct();
    let pnl_pct = daily_pnl_pct(daily_pnl, account_value.unwrap_or(state.current_equity));

    let status = |action, reason: String, multiplier| CircuitBreakerStatus {
        action,
        reason,
        current_drawdown_pct: drawdown,
        daily_pnl_pct: pnl_pct,
        suggested_position_size_multiplier: multiplier,
    };

    if drawdown >= limits.max_drawdown_pct {
        return status(
            RiskAction::Halt,
            format!(
                "Max drawdown exceeded: {}% >= {}%, manual review required",
                drawdown.round_dp(2),
                limits.max_drawdown_pct
            ),
            Decimal::ZERO,
        );
    }

    if let Some(halt) = &state.halted {
        return status(
            RiskAction::Halt,
            format!(
                "Halted since {} at {}% drawdown, manual review required",
                halt.at.format("%Y-%m-%d %H:%M UTC"),
                halt.drawdown_pct.round_dp(2)
            ),
            Decimal::ZERO,
        );
    }

    if pnl_pct <= -limits.daily_loss_limit_pct {
        return status(
            RiskAction::PauseToday,
            format!(
                "Daily loss limit hit: {}% <= -{}%",
                pnl_pct.round_dp(2),
                limits.daily_loss_limit_pct
            ),
            Decimal::ZERO,
        );
    }

    if drawdown >= limits.scale_down_drawdown_pct {
        let multiplier = limits.scale_down_multiplier(drawdown);
        return status(
            RiskAction::ScaleDown,
            format!(
                "Drawdown {}% in scale-down zone, position size x{}",
                drawdown.round_dp(2),
                multiplier.round_dp(2)
            ),
            multiplier,
        );
    }

    status(
        RiskAction::Continue,
        "Within risk limits".to_string(),
        Decimal::ONE,
    )
}
