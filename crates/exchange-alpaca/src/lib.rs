//! Alpaca brokerage adapter.
//!
//! Implements the account probe and order submission traits from
//! `algo-trade-core` against Alpaca's REST API, plus an in-process
//! [`PaperBroker`] for running the governance layer without credentials.

pub mod account;
pub mod client;
pub mod execution;
pub mod paper;
mod types;

pub use client::{
    AlpacaClient, AlpacaConfig, AlpacaCredentials, CredentialsError, ALPACA_LIVE_URL,
    ALPACA_PAPER_URL,
};
pub use paper::PaperBroker;
