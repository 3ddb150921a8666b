//! Alpaca REST client.
//!
//! Thin typed access to the two endpoints the governance layer needs: the
//! account snapshot and notional market order submission. Credentials are
//! read from the standard `APCA_API_KEY_ID` / `APCA_API_SECRET_KEY`
//! environment variables and are never logged.
//!
//! # Example
//!
//! ```ignore
//! use algo_trade_alpaca::{AlpacaClient, AlpacaConfig};
//!
//! let client = AlpacaClient::from_env(AlpacaConfig::paper())?;
//! let status = client.account().await?;
//! println!("equity: {}", status.equity);
//! ```

use std::time::Duration;

use algo_trade_core::BrokerError;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::types::RawError;

// =============================================================================
// Constants
// =============================================================================

/// Alpaca paper trading API base URL.
pub const ALPACA_PAPER_URL: &str = "https://paper-api.alpaca.markets";

/// Alpaca live trading API base URL.
pub const ALPACA_LIVE_URL: &str = "https://api.alpaca.markets";

pub const KEY_ID_ENV: &str = "APCA_API_KEY_ID";
pub const SECRET_KEY_ENV: &str = "APCA_API_SECRET_KEY";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self::paper()
    }
}

impl AlpacaConfig {
    #[must_use]
    pub fn paper() -> Self {
        Self {
            base_url: ALPACA_PAPER_URL.to_string(),
            timeout_secs: 10,
        }
    }

    #[must_use]
    pub fn live() -> Self {
        Self {
            base_url: ALPACA_LIVE_URL.to_string(),
            ..Self::paper()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// Credentials
// =============================================================================

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// API key pair. The secret is zeroized on drop.
pub struct AlpacaCredentials {
    key_id: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for AlpacaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaCredentials")
            .field("key_id", &self.key_id)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

impl AlpacaCredentials {
    pub fn new(key_id: impl Into<String>, secret_key: SecretString) -> Self {
        Self {
            key_id: key_id.into(),
            secret_key,
        }
    }

    /// Reads the key pair from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing variable.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let key_id =
            std::env::var(KEY_ID_ENV).map_err(|_| CredentialsError::Missing(KEY_ID_ENV))?;
        let secret =
            std::env::var(SECRET_KEY_ENV).map_err(|_| CredentialsError::Missing(SECRET_KEY_ENV))?;
        Ok(Self::new(key_id, SecretString::from(secret)))
    }
}

// =============================================================================
// Client
// =============================================================================

pub struct AlpacaClient {
    config: AlpacaConfig,
    credentials: AlpacaCredentials,
    http: Client,
}

impl AlpacaClient {
    /// Creates a client with explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: AlpacaConfig,
        credentials: AlpacaCredentials,
    ) -> Result<Self, CredentialsError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            credentials,
            http,
        })
    }

    /// Creates a client with credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential variable is missing or the HTTP client cannot be built.
    pub fn from_env(config: AlpacaConfig) -> Result<Self, CredentialsError> {
        Self::new(config, AlpacaCredentials::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &AlpacaConfig {
        &self.config
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BrokerError> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("APCA-API-KEY-ID", &self.credentials.key_id)
            .header(
                "APCA-API-SECRET-KEY",
                self.credentials.secret_key.expose_secret(),
            )
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        handle_response(response).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BrokerError> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header("APCA-API-KEY-ID", &self.credentials.key_id)
            .header(
                "APCA-API-SECRET-KEY",
                self.credentials.secret_key.expose_secret(),
            )
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        handle_response(response).await
    }
}

fn transport_error(e: reqwest::Error) -> BrokerError {
    if e.is_timeout() {
        BrokerError::Timeout(e.to_string())
    } else {
        BrokerError::Network(e.to_string())
    }
}

/// Converts a response into the payload or a classified broker error.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BrokerError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(BrokerError::RateLimit {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<RawError>(&text)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or(text);

        return Err(match status {
            StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
                BrokerError::Rejected(message)
            }
            _ => BrokerError::api(status.as_u16(), message),
        });
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            BrokerError::Timeout(e.to_string())
        } else {
            BrokerError::Serialization(e.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_to_paper() {
        let config = AlpacaConfig::default();
        assert_eq!(config.base_url, ALPACA_PAPER_URL);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(AlpacaConfig::live().base_url, ALPACA_LIVE_URL);
    }

    #[test]
    fn test_config_builder_trims_slash() {
        let config = AlpacaConfig::paper()
            .with_base_url("http://localhost:8080/")
            .with_timeout_secs(3);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = AlpacaCredentials::new("PKTEST", SecretString::from("super-secret".to_string()));
        let debug = format!("{creds:?}");
        assert!(debug.contains("PKTEST"));
        assert!(!debug.contains("super-secret"));
    }
}
