use algo_trade_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("scaling state storage error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid growth sequence: {0}")]
    InvalidSequence(String),

    #[error("invalid scaler configuration: {0}")]
    InvalidConfig(String),
}

impl ScalerError {
    pub fn invalid_sequence(reason: impl Into<String>) -> Self {
        Self::InvalidSequence(reason.into())
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, ScalerError>;
