//! Engine configuration
//!
//! `EngineConfig::default()` mirrors the constants in `constants`. Hosts can
//! override single settings with the builder setters or load everything from
//! the environment:
//!
//! | Variable                             | Meaning                          |
//! |--------------------------------------|----------------------------------|
//! | `PRICE_ENGINE_TICKERS`               | comma separated ticker symbols   |
//! | `PRICE_ENGINE_REFRESH_INTERVAL_MS`   | scheduler period                 |
//! | `PRICE_ENGINE_SNAPSHOT_TTL_MS`       | snapshot cache freshness window  |
//! | `PRICE_ENGINE_STALE_THRESHOLD_MS`    | health staleness threshold       |
//! | `PRICE_ENGINE_PRICE_LOW`             | synthetic price lower bound      |
//! | `PRICE_ENGINE_PRICE_HIGH`            | synthetic price upper bound      |
//! | `PRICE_ENGINE_BROADCAST_CAPACITY`    | per-subscriber buffer            |

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use crate::{
    constants::{
        BROADCAST_CAPACITY, DEFAULT_TICKERS, ENV_PREFIX, REFRESH_INTERVAL_MS, SNAPSHOT_TTL_MS,
        STALE_THRESHOLD_MS,
    },
    error::ConfigError,
    types::{PriceRange, Ticker},
};

/// Settings for a `PriceEngine`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Tickers refreshed by the scheduler and accepted by the read paths
    pub tickers: Vec<Ticker>,
    /// Period between refresh cycles
    pub refresh_interval: Duration,
    /// Freshness window of the snapshot cache
    pub snapshot_ttl: Duration,
    /// Age after which health reports a record as stale
    pub stale_threshold: Duration,
    /// Range for the synthetic generator
    pub price_range: PriceRange,
    /// Records buffered per subscriber before drop-to-latest kicks in
    pub broadcast_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.iter().map(|s| Ticker::new(*s)).collect(),
            refresh_interval: Duration::from_millis(REFRESH_INTERVAL_MS),
            snapshot_ttl: Duration::from_millis(SNAPSHOT_TTL_MS),
            stale_threshold: Duration::from_millis(STALE_THRESHOLD_MS),
            price_range: PriceRange::default(),
            broadcast_capacity: BROADCAST_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Loads the configuration from `PRICE_ENGINE_*` environment variables,
    /// falling back to the defaults for anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key).map(|value| (key, value))
        };

        let mut config = Self::default();

        if let Some((_, value)) = var("TICKERS") {
            config.tickers = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Ticker::new)
                .collect();
        }
        if let Some((key, value)) = var("REFRESH_INTERVAL_MS") {
            config.refresh_interval = Duration::from_millis(parse(&key, &value)?);
        }
        if let Some((key, value)) = var("SNAPSHOT_TTL_MS") {
            config.snapshot_ttl = Duration::from_millis(parse(&key, &value)?);
        }
        if let Some((key, value)) = var("STALE_THRESHOLD_MS") {
            config.stale_threshold = Duration::from_millis(parse(&key, &value)?);
        }

        let low = match var("PRICE_LOW") {
            Some((key, value)) => parse(&key, &value)?,
            None => config.price_range.low(),
        };
        let high = match var("PRICE_HIGH") {
            Some((key, value)) => parse(&key, &value)?,
            None => config.price_range.high(),
        };
        config.price_range = PriceRange::new(low, high)?;

        if let Some((key, value)) = var("BROADCAST_CAPACITY") {
            config.broadcast_capacity = parse(&key, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Replace the tracked tickers
    pub fn with_tickers<I, T>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Ticker>,
    {
        self.tickers = tickers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }

    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn with_price_range(mut self, range: PriceRange) -> Self {
        self.price_range = range;
        self
    }

    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Checks the settings the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tickers.is_empty() {
            return Err(ConfigError::NoTickers);
        }

        let mut seen = HashSet::new();
        for ticker in &self.tickers {
            if !seen.insert(ticker) {
                return Err(ConfigError::DuplicateTicker(ticker.to_string()));
            }
        }

        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("refresh_interval"));
        }
        if self.snapshot_ttl.is_zero() {
            return Err(ConfigError::ZeroInterval("snapshot_ttl"));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        Ok(())
    }

    /// Check whether a ticker belongs to the configured set
    pub fn tracks(&self, ticker: &Ticker) -> bool {
        self.tickers.contains(ticker)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.tickers.len(), 4);
        assert_eq!(config.refresh_interval, Duration::from_secs(2));
        assert_eq!(config.snapshot_ttl, Duration::from_secs(2));
        assert_eq!(config.price_range.low(), 90);
        assert_eq!(config.price_range.high(), 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PRICE_ENGINE_TICKERS", "APPLE, GOOGLE,"),
            ("PRICE_ENGINE_REFRESH_INTERVAL_MS", "500"),
            ("PRICE_ENGINE_PRICE_LOW", "10"),
            ("PRICE_ENGINE_PRICE_HIGH", "20"),
            ("PRICE_ENGINE_BROADCAST_CAPACITY", "4"),
        ]))
        .unwrap();

        assert_eq!(
            config.tickers,
            vec![Ticker::new("APPLE"), Ticker::new("GOOGLE")]
        );
        assert_eq!(config.refresh_interval, Duration::from_millis(500));
        assert_eq!(config.snapshot_ttl, Duration::from_secs(2));
        assert_eq!(config.price_range, PriceRange::new(10, 20).unwrap());
        assert_eq!(config.broadcast_capacity, 4);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = EngineConfig::from_lookup(lookup(&[(
            "PRICE_ENGINE_SNAPSHOT_TTL_MS",
            "soon",
        )]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "PRICE_ENGINE_SNAPSHOT_TTL_MS".to_string(),
                value: "soon".to_string(),
            }
        );

        let err = EngineConfig::from_lookup(lookup(&[("PRICE_ENGINE_PRICE_LOW", "200")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidRange { low: 200, high: 100 });
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            EngineConfig::default()
                .with_tickers(Vec::<Ticker>::new())
                .validate(),
            Err(ConfigError::NoTickers)
        );
        assert_eq!(
            EngineConfig::default()
                .with_tickers(["APPLE", "APPLE"])
                .validate(),
            Err(ConfigError::DuplicateTicker("APPLE".to_string()))
        );
        assert_eq!(
            EngineConfig::default()
                .with_refresh_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroInterval("refresh_interval"))
        );
        assert_eq!(
            EngineConfig::default()
                .with_broadcast_capacity(0)
                .validate(),
            Err(ConfigError::ZeroCapacity)
        );
    }
}
