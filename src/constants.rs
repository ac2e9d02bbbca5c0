//! Default settings for the ticker price engine
//!
//! These are the values `EngineConfig::default()` starts from. Every one of
//! them can be overridden through the builder setters or `PRICE_ENGINE_*`
//! environment variables (see `config`).

/// How often the scheduler refreshes every tracked ticker (in milliseconds)
pub const REFRESH_INTERVAL_MS: u64 = 2_000;

/// How long a memoized snapshot price stays fresh (in milliseconds)
pub const SNAPSHOT_TTL_MS: u64 = 2_000;

/// How old a stored record may get before health reports it stale (in milliseconds)
pub const STALE_THRESHOLD_MS: u64 = 10_000;

/// Per-subscriber buffer before the oldest undelivered records are dropped
pub const BROADCAST_CAPACITY: usize = 16;

/// Buffer for the engine event channel
pub const EVENT_CAPACITY: usize = 64;

/// Lower bound of the synthetic price range (inclusive)
pub const PRICE_LOW: i64 = 90;

/// Upper bound of the synthetic price range (inclusive)
pub const PRICE_HIGH: i64 = 100;

/// Tickers tracked by default
pub const DEFAULT_TICKERS: &[&str] = &["APPLE", "GOOGLE", "AMAZON", "BABATATA"];

/// Environment variable prefix read by `EngineConfig::from_env`
pub const ENV_PREFIX: &str = "PRICE_ENGINE_";
