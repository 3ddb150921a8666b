//! CLI commands for the risk-governance layer.

pub mod alerts;
pub mod capital;
pub mod gate;
pub mod health;
pub mod orders;

pub use alerts::{run_alerts, AlertsArgs};
pub use capital::{
    run_close_day, run_progress, run_reset_scaler, run_resume, run_sync_equity, CloseDayArgs,
    ProgressArgs, ResetScalerArgs, ResumeArgs, SyncEquityArgs,
};
pub use gate::{run_gate, GateArgs};
pub use health::{run_health, run_reset_breaker, HealthArgs, ResetBreakerArgs};
pub use orders::{run_queue, run_submit, QueueArgs, SubmitArgs};
