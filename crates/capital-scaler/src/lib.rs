//! Capital Scaler: decides how much capital may be risked each trading period.
//!
//! The daily investment climbs a fixed growth sequence one level at a time,
//! funded only by banked trading profit, and retreats when profit erodes.
//! Independently, drawdown and daily-loss circuit breakers produce a
//! [`CircuitBreakerStatus`] whose multiplier every position sizer must apply.

pub mod breakers;
pub mod error;
pub mod scaler;
pub mod sequence;
pub mod state;

pub use breakers::{CircuitBreakerStatus, RiskAction, RiskLimits};
pub use error::ScalerError;
pub use scaler::{CapitalScaler, LevelProgress, ScaleDecision};
pub use sequence::GrowthSequence;
pub use state::{HaltRecord, ScaleDirection, ScaleEvent, ScalingState};
