//! Per-ticker TTL memoization for snapshot reads
//!
//! Each tracked ticker owns one memo cell behind an async mutex. The first
//! caller after expiry computes a fresh price while holding the cell; callers
//! arriving meanwhile wait on the same cell and reuse the stored value, so at
//! most one computation per ticker is ever in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{
    error::EngineError,
    generator::PriceGenerator,
    metrics::MetricsCollector,
    types::Ticker,
};

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: f64,
    expires_at: Instant,
}

type MemoCell = Arc<Mutex<Option<CachedPrice>>>;

/// Short-lived shared computation cache keyed by ticker
pub struct SnapshotCache {
    cells: HashMap<Ticker, MemoCell>,
    generator: Arc<dyn PriceGenerator>,
    metrics: Arc<MetricsCollector>,
    ttl: Duration,
    computations: AtomicU64,
}

impl SnapshotCache {
    /// Creates a cache for a fixed set of tickers
    pub fn new(
        tickers: &[Ticker],
        generator: Arc<dyn PriceGenerator>,
        metrics: Arc<MetricsCollector>,
        ttl: Duration,
    ) -> Self {
        let cells = tickers
            .iter()
            .map(|ticker| (ticker.clone(), Arc::new(Mutex::new(None))))
            .collect();

        Self {
            cells,
            generator,
            metrics,
            ttl,
            computations: AtomicU64::new(0),
        }
    }

    /// Returns the memoized price for `ticker`, computing it if the cached
    /// one is missing or expired
    pub async fn get_or_compute(&self, ticker: &Ticker) -> Result<f64, EngineError> {
        let cell = self
            .cells
            .get(ticker)
            .ok_or_else(|| EngineError::not_tracked(ticker.symbol()))?;

        let mut slot = cell.lock().await;
        if let Some(cached) = *slot {
            if Instant::now() < cached.expires_at {
                return Ok(cached.price);
            }
        }

        self.computations.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = self.generator.generate(ticker).await;
        self.metrics
            .record_generation(started.elapsed(), result.is_ok())
            .await;

        let price = result.map_err(|e| {
            tracing::warn!(ticker = %ticker, error = %e, "Snapshot computation failed");
            EngineError::generation_failure(ticker.symbol(), e)
        })?;

        *slot = Some(CachedPrice {
            price,
            expires_at: Instant::now() + self.ttl,
        });
        tracing::debug!(ticker = %ticker, price = price, "Memoized snapshot price");

        Ok(price)
    }

    /// Forgets the memoized price for `ticker`
    pub async fn invalidate(&self, ticker: &Ticker) -> Result<(), EngineError> {
        let cell = self
            .cells
            .get(ticker)
            .ok_or_else(|| EngineError::not_tracked(ticker.symbol()))?;
        *cell.lock().await = None;
        Ok(())
    }

    /// Number of underlying computations started so far
    pub fn computation_count(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
