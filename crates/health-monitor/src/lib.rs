//! Brokerage API health monitoring for the trading system.
//!
//! The [`HealthMonitor`] probes the broker's account endpoint, classifies
//! latency, and guards every wrapped brokerage call behind a persisted
//! circuit breaker with exponential-backoff retries. Orders that fail
//! outright land in a durable queue and are replayed once the broker is fit.
//!
//! # Example
//!
//! ```ignore
//! use algo_trade_health_monitor::{AlertDispatcher, HealthMonitor};
//!
//! let alerts = AlertDispatcher::open(config.alerts.clone(), &config.storage, clock.clone());
//! let monitor = HealthMonitor::open(broker, config.health.clone(), &config.storage, alerts, clock)?;
//!
//! if monitor.is_trading_allowed().allowed {
//!     let ack = monitor
//!         .execute_with_retry("submit_order", || broker.submit_order(&ticket))
//!         .await?;
//! }
//! ```

pub mod alerts;
pub mod breaker;
pub mod error;
pub mod monitor;
pub mod queue;
pub mod retry;
pub mod types;

pub use alerts::{Alert, AlertDispatcher, AlertLog, AlertSeverity};
pub use breaker::{BreakerPosition, BreakerState, FailureOutcome};
pub use error::{HealthError, RetryError};
pub use monitor::HealthMonitor;
pub use queue::{DrainReport, OrderQueue, QueuedOrder};
pub use retry::BackoffPolicy;
pub use types::{HealthCheckResult, HealthDetails, HealthStatus, TradingPermission};
