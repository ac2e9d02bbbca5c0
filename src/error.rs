//! Error types for the ticker price engine

use thiserror::Error;

/// Errors a price generator can report for a single ticker
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeneratorError {
    /// The source could not produce a price right now
    #[error("Price source unavailable: {0}")]
    Unavailable(String),

    /// The source does not know how to price this ticker
    #[error("Ticker not supported: {0}")]
    UnsupportedTicker(String),

    /// The source did not answer in time
    #[error("Generation timeout")]
    Timeout,
}

/// Errors returned by the engine's read paths
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The ticker is not part of the configured set
    #[error("Ticker not tracked: {ticker}")]
    TickerNotTracked { ticker: String },

    /// The ticker is tracked but has not been refreshed yet
    #[error("Price data not available for {ticker}")]
    NotAvailable { ticker: String },

    /// Computing a fresh price failed
    #[error("Price generation failed for {ticker}: {source}")]
    GenerationFailure {
        ticker: String,
        #[source]
        source: GeneratorError,
    },

    /// The engine configuration was rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Creates a TickerNotTracked error
    pub fn not_tracked(ticker: &str) -> Self {
        Self::TickerNotTracked {
            ticker: ticker.to_string(),
        }
    }

    /// Creates a NotAvailable error
    pub fn not_available(ticker: &str) -> Self {
        Self::NotAvailable {
            ticker: ticker.to_string(),
        }
    }

    /// Creates a GenerationFailure error
    pub fn generation_failure(ticker: &str, source: GeneratorError) -> Self {
        Self::GenerationFailure {
            ticker: ticker.to_string(),
            source,
        }
    }
}

/// Errors raised while building or validating an `EngineConfig`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// At least one ticker must be tracked
    #[error("No tickers configured")]
    NoTickers,

    /// The same ticker was listed twice
    #[error("Duplicate ticker: {0}")]
    DuplicateTicker(String),

    /// Price range bounds are inverted
    #[error("Invalid price range: low {low} > high {high}")]
    InvalidRange { low: i64, high: i64 },

    /// A duration setting was zero
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    /// Broadcast capacity was zero
    #[error("Broadcast capacity must be greater than zero")]
    ZeroCapacity,

    /// An environment variable could not be parsed
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}
