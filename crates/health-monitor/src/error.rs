//! Error types for the Health Monitor.

use algo_trade_core::{BrokerError, StoreError};
use thiserror::Error;

/// Why a wrapped brokerage call did not produce a result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetryError {
    /// Breaker is open; the operation was not attempted.
    #[error("Circuit breaker tripped, brokerage calls blocked for another {remaining_secs}s")]
    CircuitOpen {
        /// Seconds until the breaker may be re-probed.
        remaining_secs: u64,
    },

    /// Every permitted attempt failed, or a non-retryable error stopped the loop.
    #[error("{operation} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        last_error: BrokerError,
    },

    /// The caller's deadline expired before the retry loop finished.
    #[error("{operation} exceeded its {deadline_ms}ms deadline")]
    DeadlineExceeded { operation: String, deadline_ms: u64 },
}

impl RetryError {
    /// Returns true if the call was refused by an open breaker.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// The broker failure behind an exhausted call, if any.
    #[must_use]
    pub fn broker_error(&self) -> Option<&BrokerError> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}

/// Errors from Health Monitor persistence.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("health monitor storage error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, HealthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_open_message() {
        let err = RetryError::CircuitOpen {
            remaining_secs: 240,
        };
        assert!(err.to_string().starts_with("Circuit breaker tripped"));
        assert!(err.to_string().contains("240"));
        assert!(err.is_circuit_open());
        assert!(err.broker_error().is_none());
    }

    #[test]
    fn test_exhausted_exposes_broker_error() {
        let err = RetryError::Exhausted {
            operation: "submit_order".to_string(),
            attempts: 4,
            last_error: BrokerError::Network("connection reset".to_string()),
        };
        assert!(err.to_string().contains("submit_order"));
        assert!(err.to_string().contains("4 attempt"));
        assert_eq!(
            err.broker_error(),
            Some(&BrokerError::Network("connection reset".to_string()))
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
