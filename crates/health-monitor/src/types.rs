//! Health probe results and trading permission.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broker API health, declared in increasing order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
    /// No probe has completed yet.
    Unknown,
}

impl HealthStatus {
    /// Statuses under which queued orders must not be replayed.
    #[must_use]
    pub fn blocks_replay(self) -> bool {
        matches!(self, Self::Unhealthy | Self::Critical)
    }

    /// Statuses that let an open breaker close once its cool-down has passed.
    #[must_use]
    pub fn permits_breaker_reset(self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Critical => write!(f, "critical"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Account fields captured by a probe plus the breaker position after it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthDetails {
    pub equity: Option<Decimal>,
    pub buying_power: Option<Decimal>,
    pub trading_blocked: bool,
    pub account_blocked: bool,
    pub circuit_open: bool,
}

/// Immutable snapshot produced by one health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    /// Round-trip time of the probe, absent when the probe never completed.
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub details: HealthDetails,
}

/// Answer to "may the execution layer place orders right now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPermission {
    pub allowed: bool,
    pub reason: String,
}

impl TradingPermission {
    pub(crate) fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub(crate) fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_severity_order() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
        assert!(HealthStatus::Unhealthy < HealthStatus::Critical);
    }

    #[test]
    fn test_status_predicates() {
        assert!(HealthStatus::Unhealthy.blocks_replay());
        assert!(HealthStatus::Critical.blocks_replay());
        assert!(!HealthStatus::Degraded.blocks_replay());

        assert!(HealthStatus::Healthy.permits_breaker_reset());
        assert!(HealthStatus::Degraded.permits_breaker_reset());
        assert!(!HealthStatus::Unknown.permits_breaker_reset());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
        assert_eq!(HealthStatus::Critical.to_string(), "critical");
    }
}
