use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fibonacci daily-investment levels used when no sequence is configured.
pub const DEFAULT_GROWTH_SEQUENCE: [u32; 12] = [1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub broker: BrokerConfig,
    pub health: HealthConfig,
    pub alerts: AlertConfig,
    pub scaler: ScalerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding every persisted document.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    /// Resolves a file name against the data directory.
    #[must_use]
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerMode {
    /// In-process simulated account.
    Paper,
    /// Alpaca paper-trading endpoint.
    AlpacaPaper,
    /// Alpaca live endpoint.
    AlpacaLive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub mode: BrokerMode,
    /// Overrides the endpoint implied by `mode`.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Starting equity of the simulated account.
    pub paper_equity: Decimal,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mode: BrokerMode::Paper,
            base_url: None,
            timeout_secs: 10,
            paper_equity: dec!(10000),
        }
    }
}

/// Health Monitor thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Probes slower than this are `degraded`.
    pub warning_latency_ms: u64,
    /// Probes slower than this are `unhealthy`.
    pub critical_latency_ms: u64,
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// Minimum time the breaker stays open before a re-probe may close it.
    pub cooldown_secs: u64,
    /// Total attempts per wrapped brokerage call.
    pub max_attempts: u32,
    /// First backoff delay; doubles after every failed attempt.
    pub backoff_base_ms: u64,
    /// Replays allowed for a queued order before it is discarded.
    pub order_max_retries: u32,
    pub state_file: String,
    pub queue_file: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            warning_latency_ms: 2_000,
            critical_latency_ms: 5_000,
            failure_threshold: 3,
            cooldown_secs: 300,
            max_attempts: 4,
            backoff_base_ms: 2_000,
            order_max_retries: 3,
            state_file: "health_state.json".to_string(),
            queue_file: "failed_orders.json".to_string(),
        }
    }
}

impl HealthConfig {
    #[must_use]
    pub fn warning_latency(&self) -> Duration {
        Duration::from_millis(self.warning_latency_ms)
    }

    #[must_use]
    pub fn critical_latency(&self) -> Duration {
        Duration::from_millis(self.critical_latency_ms)
    }

    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(u32::try_from(self.cooldown_secs).unwrap_or(u32::MAX)))
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Optional endpoint receiving every alert as a JSON POST.
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
    pub log_file: String,
    /// Number of most recent alerts kept in the persisted log.
    pub max_entries: usize,
    /// Value of the `source` field on emitted alerts.
    pub source: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_secs: 5,
            log_file: "alerts.json".to_string(),
            max_entries: 100,
            source: "health_monitor".to_string(),
        }
    }
}

/// Capital Scaler policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    /// Daily investment per level, strictly increasing.
    pub sequence: Vec<Decimal>,
    /// Days of next-level funding that must be banked before scaling up.
    pub funding_days: u32,
    /// Fraction of the current level's funding below which the level retreats.
    pub scale_down_funding_ratio: Decimal,
    /// Drawdown (percent) at which trading halts.
    pub max_drawdown_pct: Decimal,
    /// Daily loss (percent of equity) at which trading pauses for the day.
    pub daily_loss_limit_pct: Decimal,
    /// Drawdown (percent) at which position sizes start shrinking.
    pub scale_down_drawdown_pct: Decimal,
    /// Smallest multiplier inside the scale-down zone.
    pub min_position_multiplier: Decimal,
    /// Equity used when no state file exists yet.
    pub initial_equity: Decimal,
    pub state_file: String,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            sequence: DEFAULT_GROWTH_SEQUENCE
                .iter()
                .map(|v| Decimal::from(*v))
                .collect(),
            funding_days: 30,
            scale_down_funding_ratio: dec!(0.5),
            max_drawdown_pct: dec!(15),
            daily_loss_limit_pct: dec!(2),
            scale_down_drawdown_pct: dec!(10),
            min_position_multiplier: dec!(0.3),
            initial_equity: dec!(10000),
            state_file: "scaling_state.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_defaults_match_thresholds() {
        let config = HealthConfig::default();
        assert_eq!(config.warning_latency(), Duration::from_secs(2));
        assert_eq!(config.critical_latency(), Duration::from_secs(5));
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown(), chrono::Duration::minutes(5));
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.backoff_base(), Duration::from_secs(2));
        assert_eq!(config.order_max_retries, 3);
    }

    #[test]
    fn test_scaler_defaults_are_fibonacci() {
        let config = ScalerConfig::default();
        let first: Vec<Decimal> = config.sequence.iter().take(7).copied().collect();
        assert_eq!(
            first,
            vec![dec!(1), dec!(2), dec!(3), dec!(5), dec!(8), dec!(13), dec!(21)]
        );
        assert_eq!(config.funding_days, 30);
        assert_eq!(config.max_drawdown_pct, dec!(15));
        assert_eq!(config.min_position_multiplier, dec!(0.3));
    }

    #[test]
    fn test_alert_log_capped_at_one_hundred() {
        assert_eq!(AlertConfig::default().max_entries, 100);
        assert!(AlertConfig::default().webhook_url.is_none());
    }

    #[test]
    fn test_storage_path_for() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/var/lib/algo"),
        };
        assert_eq!(
            storage.path_for("alerts.json"),
            PathBuf::from("/var/lib/algo/alerts.json")
        );
    }
}
