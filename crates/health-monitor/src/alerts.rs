//! Alert emission: bounded persisted log plus optional webhook delivery.
//!
//! Every alert is logged through `tracing`, appended to a capped JSON log and,
//! when a webhook is configured, POSTed as JSON. Webhook delivery is best
//! effort: failures are logged and never surface to the caller.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use algo_trade_core::{AlertConfig, Clock, JsonStore, StorageConfig, Versioned};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub severity: AlertSeverity,
}

/// Most recent alerts, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertLog {
    pub entries: VecDeque<Alert>,
}

impl Versioned for AlertLog {
    const SCHEMA_VERSION: u32 = 1;

    fn migrate(version: u32, payload: serde_json::Value) -> Result<Self, algo_trade_core::StoreError> {
        let parsed = if payload.is_array() {
            serde_json::from_value::<VecDeque<Alert>>(payload).map(|entries| Self { entries })
        } else {
            serde_json::from_value::<Self>(payload)
        };
        parsed.map_err(|e| algo_trade_core::StoreError::Migration {
            from: version,
            reason: e.to_string(),
        })
    }
}

impl AlertLog {
    /// Appends and drops the oldest entries beyond `cap`.
    pub fn push(&mut self, alert: Alert, cap: usize) {
        self.entries.push_back(alert);
        while self.entries.len() > cap.max(1) {
            self.entries.pop_front();
        }
    }

    /// Last `limit` alerts, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

pub struct AlertDispatcher {
    config: AlertConfig,
    log: Mutex<AlertLog>,
    store: JsonStore<AlertLog>,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl AlertDispatcher {
    /// Opens the dispatcher, loading the existing log if it can be read.
    pub fn open(config: AlertConfig, storage: &StorageConfig, clock: Arc<dyn Clock>) -> Self {
        let store = JsonStore::new(storage.path_for(&config.log_file));
        let log = match store.load() {
            Ok(Some(log)) => log,
            Ok(None) => AlertLog::default(),
            Err(e) => {
                warn!(
                    path = %store.path().display(),
                    error = %e,
                    "Alert log unreadable, starting with an empty log"
                );
                AlertLog::default()
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.webhook_timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build webhook client, using defaults");
                reqwest::Client::new()
            });

        Self {
            config,
            log: Mutex::new(log),
            store,
            http,
            clock,
        }
    }

    /// Emits an alert to every sink and returns the recorded entry.
    pub async fn emit(
        &self,
        severity: AlertSeverity,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Alert {
        let alert = Alert {
            message: message.into(),
            details,
            timestamp: self.clock.now(),
            source: self.config.source.clone(),
            severity,
        };

        match severity {
            AlertSeverity::Critical => {
                error!(source = %alert.source, details = %alert.details, "ALERT: {}", alert.message);
            }
            AlertSeverity::Warning => {
                warn!(source = %alert.source, details = %alert.details, "ALERT: {}", alert.message);
            }
            AlertSeverity::Info => {
                info!(source = %alert.source, details = %alert.details, "ALERT: {}", alert.message);
            }
        }

        self.record(&alert);
        self.deliver(&alert).await;
        alert
    }

    fn record(&self, alert: &Alert) {
        let mut log = self.log.lock();
        log.push(alert.clone(), self.config.max_entries);
        if let Err(e) = self.store.save(&log) {
            error!(path = %self.store.path().display(), error = %e, "Failed to persist alert log");
        }
    }

    async fn deliver(&self, alert: &Alert) {
        let Some(url) = self.config.webhook_url.as_deref() else {
            return;
        };

        let outcome = self
            .http
            .post(url)
            .json(alert)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        if let Err(e) = outcome {
            warn!(url = %url, error = %e, "Alert webhook delivery failed");
        }
    }

    /// Last `limit` alerts, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.log.lock().recent(limit)
    }

    /// Writes the in-memory log to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be written.
    pub fn flush(&self) -> Result<(), algo_trade_core::StoreError> {
        let log = self.log.lock();
        self.store.save(&log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_core::ManualClock;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap(),
        ))
    }

    fn storage(dir: &TempDir) -> StorageConfig {
        StorageConfig {
            data_dir: dir.path().to_path_buf(),
        }
    }

    fn sample(n: usize) -> Alert {
        Alert {
            message: format!("alert {n}"),
            details: json!({ "n": n }),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap(),
            source: "health_monitor".to_string(),
            severity: AlertSeverity::Warning,
        }
    }

    // ==================== Log Tests ====================

    #[test]
    fn test_log_is_bounded() {
        let mut log = AlertLog::default();
        for n in 0..105 {
            log.push(sample(n), 100);
        }

        assert_eq!(log.entries.len(), 100);
        assert_eq!(log.entries.front().unwrap().message, "alert 5");
        assert_eq!(log.entries.back().unwrap().message, "alert 104");
    }

    #[test]
    fn test_recent_returns_tail() {
        let mut log = AlertLog::default();
        for n in 0..5 {
            log.push(sample(n), 100);
        }

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "alert 3");
        assert_eq!(recent[1].message, "alert 4");
        assert_eq!(log.recent(50).len(), 5);
    }

    // ==================== Dispatcher Tests ====================

    #[tokio::test]
    async fn test_emit_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let dispatcher = AlertDispatcher::open(AlertConfig::default(), &storage(&dir), clock());

        let alert = dispatcher
            .emit(AlertSeverity::Critical, "Circuit breaker tripped", json!({ "failures": 3 }))
            .await;
        assert_eq!(alert.source, "health_monitor");

        let reopened = AlertDispatcher::open(AlertConfig::default(), &storage(&dir), clock());
        let recent = reopened.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message, "Circuit breaker tripped");
        assert_eq!(recent[0].details["failures"], 3);
    }

    #[tokio::test]
    async fn test_corrupt_log_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("alerts.json"), "{ not json").unwrap();

        let dispatcher = AlertDispatcher::open(AlertConfig::default(), &storage(&dir), clock());
        assert!(dispatcher.recent(10).is_empty());

        dispatcher.emit(AlertSeverity::Info, "recovered", json!({})).await;
        assert_eq!(dispatcher.recent(10).len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_receives_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/trading"))
            .and(body_partial_json(json!({
                "message": "Order queued for retry",
                "severity": "warning",
                "source": "health_monitor"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = AlertConfig {
            webhook_url: Some(format!("{}/hooks/trading", server.uri())),
            ..Default::default()
        };
        let dispatcher = AlertDispatcher::open(config, &storage(&dir), clock());

        dispatcher
            .emit(AlertSeverity::Warning, "Order queued for retry", json!({ "symbol": "SPY" }))
            .await;
    }

    #[tokio::test]
    async fn test_webhook_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = AlertConfig {
            webhook_url: Some(server.uri()),
            ..Default::default()
        };
        let dispatcher = AlertDispatcher::open(config, &storage(&dir), clock());

        let alert = dispatcher
            .emit(AlertSeverity::Critical, "still recorded", json!({}))
            .await;

        assert_eq!(alert.message, "still recorded");
        assert_eq!(dispatcher.recent(1)[0].message, "still recorded");
    }
}
