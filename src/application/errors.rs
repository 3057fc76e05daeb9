//! Application layer errors

use std::time::Duration;
use thiserror::Error;

/// Top-level errors surfaced by the binary
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scraper setup failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of a single price source.
///
/// These never leave the aggregator: a failing source simply contributes
/// no prices.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("[{source_name}] network error: {message}")]
    Network { source_name: String, message: String },

    #[error("[{source_name}] HTTP status {status}")]
    Status { source_name: String, status: u16 },

    #[error("[{source_name}] anti-bot challenge at {url}")]
    Challenge { source_name: String, url: String },

    #[error("[{source_name}] no working proxy after {attempts} attempt(s)")]
    ProxyExhausted { source_name: String, attempts: u32 },

    #[error("[{source_name}] timed out after {after:?}")]
    Timeout { source_name: String, after: Duration },

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl ScrapeError {
    pub fn network(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Network {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }
}

/// Price cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
