//! # Ticker Price Engine
//!
//! Keeps a small, fixed set of ticker prices fresh in the background and
//! serves them two ways:
//!
//! - **Snapshot reads** return the latest stored record for a ticker.
//! - **Streams** push every refresh to any number of independent
//!   subscribers. A new subscriber first receives the latest record of each
//!   ticker, then live updates. Slow subscribers drop to the newest records
//!   instead of buffering without bound.
//!
//! Prices are synthetic by default (`UniformPriceGenerator`); a real feed
//! implements `PriceGenerator` and is passed to `PriceEngine::with_generator`.
//!
//! ## Usage
//!
//! ```no_run
//! use ticker_price_engine::{EngineConfig, PriceEngine, Ticker};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PriceEngine::start(EngineConfig::from_env()?)?;
//!
//! // Point read (fails with NotAvailable until the first refresh)
//! let apple = engine.snapshot(&Ticker::new("APPLE")).await?;
//! println!("APPLE: {} at {}", apple.price(), apple.observed_at());
//!
//! // Memoized on-demand price shared by concurrent callers
//! let google = engine.cached_price(&Ticker::new("GOOGLE")).await?;
//! println!("GOOGLE: {}", google);
//!
//! // Push feed
//! let mut feed = Box::pin(engine.stream().into_stream().take(10));
//! while let Some(record) = feed.next().await {
//!     println!("{} = {}", record.ticker(), record.price());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! RefreshScheduler (ticks every refresh_interval)
//!     ↓
//! PriceGenerator (uniform / failover / custom)
//!     ↓
//! LatestPriceStore ──→ snapshot()
//!     ↓
//! PriceBroadcaster ──→ stream() subscribers
//!
//! SnapshotCache ──→ cached_price()   (computes on demand, TTL memoized)
//! ```

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod generator;
pub mod generators;
pub mod metrics;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use broadcast::Subscription;
pub use config::EngineConfig;
pub use engine::PriceEngine;
pub use error::{ConfigError, EngineError, GeneratorError};
pub use generator::PriceGenerator;
pub use generators::{FailoverGenerator, UniformPriceGenerator};
pub use metrics::EngineMetrics;
pub use scheduler::{CycleReport, SchedulerState};
pub use types::{ComponentHealth, EngineEvent, HealthStatus, PriceRange, PriceRecord, Ticker};
