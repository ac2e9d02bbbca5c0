//! Types for the ticker price engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    constants::{PRICE_HIGH, PRICE_LOW},
    error::ConfigError,
};

/// Identifier of a tracked instrument (e.g. "APPLE")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Creates a ticker from its symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Get the ticker symbol
    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Ticker {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Ticker {
    fn from(symbol: String) -> Self {
        Self(symbol)
    }
}

/// A single observed price
///
/// Records are never mutated after construction. Each refresh builds a new
/// one, so the price and timestamp of a record always belong together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    ticker: Ticker,
    price: f64,
    observed_at: DateTime<Utc>,
}

impl PriceRecord {
    /// Create a record observed now
    pub fn new(ticker: Ticker, price: f64) -> Self {
        Self::observed(ticker, price, Utc::now())
    }

    /// Create a record with an explicit observation time
    pub fn observed(ticker: Ticker, price: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            ticker,
            price,
            observed_at,
        }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Check if the record is older than `threshold`
    pub fn is_stale(&self, threshold: std::time::Duration) -> bool {
        self.age() > threshold
    }

    /// Get the age of the record
    pub fn age(&self) -> std::time::Duration {
        Utc::now()
            .signed_duration_since(self.observed_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Inclusive integer range the synthetic generator draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    low: i64,
    high: i64,
}

impl PriceRange {
    /// Creates a range, rejecting `low > high`
    pub fn new(low: i64, high: i64) -> Result<Self, ConfigError> {
        if low > high {
            return Err(ConfigError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> i64 {
        self.low
    }

    pub fn high(&self) -> i64 {
        self.high
    }

    /// Check whether a price falls inside the range
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low as f64 && price <= self.high as f64
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            low: PRICE_LOW,
            high: PRICE_HIGH,
        }
    }
}

/// Engine events for adapters that forward activity elsewhere
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    /// A ticker received a new price
    PriceUpdated {
        id: Uuid,
        ticker: Ticker,
        old_price: Option<f64>,
        new_price: f64,
        timestamp: DateTime<Utc>,
    },

    /// The generator failed for a ticker during a refresh cycle
    GenerationFailed {
        id: Uuid,
        ticker: Ticker,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A stream consumer went away
    SubscriptionClosed {
        id: Uuid,
        subscription_id: Uuid,
        delivered: u64,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            EngineEvent::PriceUpdated { id, .. } => *id,
            EngineEvent::GenerationFailed { id, .. } => *id,
            EngineEvent::SubscriptionClosed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::PriceUpdated { .. } => "PRICE_UPDATED",
            EngineEvent::GenerationFailed { .. } => "GENERATION_FAILED",
            EngineEvent::SubscriptionClosed { .. } => "SUBSCRIPTION_CLOSED",
        }
    }
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::PriceUpdated {
                ticker, new_price, ..
            } => write!(f, "Price updated: {} = {:.2}", ticker, new_price),
            EngineEvent::GenerationFailed {
                ticker,
                error_message,
                ..
            } => write!(f, "Price generation failed for {}: {}", ticker, error_message),
            EngineEvent::SubscriptionClosed {
                subscription_id,
                delivered,
                ..
            } => write!(
                f,
                "Subscription {} closed after {} records",
                subscription_id, delivered
            ),
        }
    }
}

/// Overall engine health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Every tracked ticker has a fresh price
    Healthy,
    /// Some tickers are missing or stale
    Degraded,
    /// No prices are available at all
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
