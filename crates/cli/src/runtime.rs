//! Process-wide wiring of the broker, Health Monitor and Capital Scaler.

use std::sync::Arc;

use algo_trade_capital_scaler::CapitalScaler;
use algo_trade_core::{AccountStatus, AppConfig, BrokerAccount, Clock, SystemClock};
use algo_trade_health_monitor::{AlertDispatcher, HealthMonitor};
use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::broker::Broker;

/// One monitor and one scaler shared by every command in the process.
pub struct Runtime {
    pub broker: Arc<Broker>,
    pub monitor: HealthMonitor<Arc<Broker>>,
    pub scaler: CapitalScaler,
}

impl Runtime {
    /// # Errors
    ///
    /// Returns an error if the broker cannot be created or persisted state is unreadable.
    pub fn open(config: AppConfig) -> Result<Self> {
        let broker = Arc::new(Broker::from_config(&config.broker)?);
        Self::with_broker(config, broker, Arc::new(SystemClock))
    }

    /// # Errors
    ///
    /// Returns an error if persisted monitor or scaler state is unreadable.
    pub fn with_broker(
        config: AppConfig,
        broker: Arc<Broker>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let storage = &config.storage;
        debug!(data_dir = %storage.data_dir.display(), broker = broker.label(), "Opening runtime");

        let alerts = AlertDispatcher::open(config.alerts.clone(), storage, clock.clone());
        let monitor = HealthMonitor::open(
            broker.clone(),
            config.health.clone(),
            storage,
            alerts,
            clock.clone(),
        )
        .context("Failed to restore health monitor state")?;
        let scaler = CapitalScaler::open(config.scaler.clone(), storage, clock)
            .context("Failed to restore capital scaler state")?;

        Ok(Self {
            broker,
            monitor,
            scaler,
        })
    }

    /// Reads equity from the broker through the retry wrapper and records it.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker call fails or the scaler cannot persist.
    pub async fn sync_equity(&self) -> Result<AccountStatus> {
        let broker = self.broker.clone();
        let status = self
            .monitor
            .execute_with_retry("account_status", || {
                let broker = broker.clone();
                async move { broker.account_status().await }
            })
            .await?;

        self.scaler.update_equity(status.equity)?;
        info!(equity = %status.equity, "Equity synced from broker");
        Ok(status)
    }

    /// Persists monitor and scaler state.
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure.
    pub async fn flush(&self) -> Result<()> {
        self.monitor.flush().await?;
        self.scaler.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_alpaca::PaperBroker;
    use algo_trade_core::{BrokerError, ManualClock, StorageConfig};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn runtime(dir: &TempDir, broker: PaperBroker) -> Runtime {
        let config = AppConfig {
            storage: StorageConfig {
                data_dir: dir.path().to_path_buf(),
            },
            ..Default::default()
        };
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
        ));
        Runtime::with_broker(config, Arc::new(Broker::Paper(broker)), clock).unwrap()
    }

    #[tokio::test]
    async fn test_sync_equity_updates_scaler() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir, PaperBroker::new(dec!(10500)));

        let status = rt.sync_equity().await.unwrap();

        assert_eq!(status.equity, dec!(10500));
        let state = rt.scaler.state();
        assert_eq!(state.current_equity, dec!(10500));
        assert_eq!(state.peak_equity, dec!(10500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_equity_failure_leaves_scaler_untouched() {
        let dir = TempDir::new().unwrap();
        let broker = PaperBroker::new(dec!(9000));
        broker.fail_next(BrokerError::Network("connection reset".to_string()), 4);
        let rt = runtime(&dir, broker);

        assert!(rt.sync_equity().await.is_err());
        assert_eq!(rt.scaler.state().current_equity, dec!(10000));
        assert_eq!(rt.monitor.breaker_snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_flush_writes_both_state_files() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir, PaperBroker::new(dec!(10000)));

        rt.flush().await.unwrap();

        assert!(dir.path().join("health_state.json").exists());
        assert!(dir.path().join("scaling_state.json").exists());
    }
}
