//! Ticker price engine
//!
//! Owns the latest-price store, the broadcaster, the snapshot cache and the
//! refresh scheduler, and exposes the read paths adapters bind to.

use crate::{
    broadcast::{PriceBroadcaster, Subscription},
    cache::SnapshotCache,
    config::EngineConfig,
    constants::EVENT_CAPACITY,
    error::EngineError,
    generator::PriceGenerator,
    generators::UniformPriceGenerator,
    metrics::{EngineMetrics, MetricsCollector},
    scheduler::{CycleReport, RefreshContext, RefreshScheduler, SchedulerState},
    store::LatestPriceStore,
    types::{ComponentHealth, EngineEvent, HealthStatus, PriceRecord, Ticker},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Live ticker price engine
///
/// Construction validates the configuration and starts the background
/// refresh task, so it must happen inside a Tokio runtime.
///
/// # Example
/// ```no_run
/// use ticker_price_engine::{EngineConfig, PriceEngine, Ticker};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = PriceEngine::start(EngineConfig::default())?;
///
/// let apple = engine.snapshot(&Ticker::new("APPLE")).await?;
/// println!("APPLE: {}", apple.price());
///
/// let mut feed = engine.stream();
/// while let Some(record) = feed.recv().await {
///     println!("{} = {}", record.ticker(), record.price());
/// }
/// # Ok(())
/// # }
/// ```
pub struct PriceEngine {
    config: EngineConfig,
    generator_name: &'static str,
    store: Arc<LatestPriceStore>,
    broadcaster: Arc<PriceBroadcaster>,
    cache: SnapshotCache,
    scheduler: RefreshScheduler,
    metrics: Arc<MetricsCollector>,
    events: broadcast::Sender<EngineEvent>,
}

impl PriceEngine {
    /// Starts an engine backed by the synthetic uniform generator
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let generator = Arc::new(UniformPriceGenerator::new(config.price_range));
        Self::with_generator(config, generator)
    }

    /// Starts an engine backed by a custom generator
    pub fn with_generator(
        config: EngineConfig,
        generator: Arc<dyn PriceGenerator>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let generator_name = generator.generator_name();
        let metrics = Arc::new(MetricsCollector::new(generator_name));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let store = Arc::new(LatestPriceStore::new());
        let broadcaster = Arc::new(PriceBroadcaster::new(
            config.broadcast_capacity,
            events.clone(),
            metrics.clone(),
        ));
        let cache = SnapshotCache::new(
            &config.tickers,
            generator.clone(),
            metrics.clone(),
            config.snapshot_ttl,
        );
        let scheduler = RefreshScheduler::new(
            RefreshContext {
                tickers: config.tickers.clone(),
                generator,
                store: store.clone(),
                broadcaster: broadcaster.clone(),
                metrics: metrics.clone(),
                events: events.clone(),
            },
            config.refresh_interval,
        );
        scheduler.start();

        tracing::info!(
            generator = generator_name,
            tickers = config.tickers.len(),
            refresh_interval_ms = config.refresh_interval.as_millis() as u64,
            snapshot_ttl_ms = config.snapshot_ttl.as_millis() as u64,
            "Price engine started"
        );

        Ok(Self {
            config,
            generator_name,
            store,
            broadcaster,
            cache,
            scheduler,
            metrics,
            events,
        })
    }

    fn ensure_tracked(&self, ticker: &Ticker) -> Result<(), EngineError> {
        if self.config.tracks(ticker) {
            Ok(())
        } else {
            Err(EngineError::not_tracked(ticker.symbol()))
        }
    }

    /// Gets the latest record for a ticker
    ///
    /// # Returns
    /// `TickerNotTracked` for tickers outside the configured set,
    /// `NotAvailable` until the first successful refresh
    pub async fn snapshot(&self, ticker: &Ticker) -> Result<Arc<PriceRecord>, EngineError> {
        self.ensure_tracked(ticker)?;
        self.store
            .get(ticker)
            .await
            .ok_or_else(|| EngineError::not_available(ticker.symbol()))
    }

    /// Gets the latest record of every ticker refreshed so far
    pub async fn snapshot_all(&self) -> HashMap<Ticker, Arc<PriceRecord>> {
        self.store.get_all().await
    }

    /// Opens a push feed over every ticker
    ///
    /// The feed starts with the latest record of each ticker and then follows
    /// live refreshes.
    pub fn stream(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    /// Opens a push feed for a single ticker
    pub fn stream_ticker(&self, ticker: &Ticker) -> Result<Subscription, EngineError> {
        self.ensure_tracked(ticker)?;
        Ok(self.broadcaster.subscribe_ticker(ticker.clone()))
    }

    /// Gets a memoized on-demand price, shared by all callers within the TTL
    pub async fn cached_price(&self, ticker: &Ticker) -> Result<f64, EngineError> {
        self.cache.get_or_compute(ticker).await
    }

    /// Number of open stream subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    /// Receives engine activity (updates, failures, closed subscriptions)
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Forces an immediate refresh cycle
    ///
    /// This bypasses the normal interval; it waits for a timed cycle that is
    /// already running to finish first.
    pub async fn refresh_now(&self) -> CycleReport {
        self.scheduler.refresh_now().await
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn tickers(&self) -> &[Ticker] {
        &self.config.tickers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the name of the generator in use
    pub fn generator_name(&self) -> &str {
        self.generator_name
    }

    /// Gets generation, cycle and overrun metrics
    pub async fn metrics(&self) -> EngineMetrics {
        self.metrics.get_metrics().await
    }

    /// Perform a health check on the engine
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = HashMap::new();

        let available = self.snapshot_all().await;
        details.insert(
            "available_prices".to_string(),
            serde_json::json!(available.len()),
        );
        details.insert(
            "generator_name".to_string(),
            serde_json::json!(self.generator_name),
        );
        details.insert(
            "subscribers".to_string(),
            serde_json::json!(self.subscriber_count()),
        );

        let mut stale_tickers = Vec::new();
        for ticker in &self.config.tickers {
            if self.store.is_stale(ticker, self.config.stale_threshold).await {
                stale_tickers.push(ticker.to_string());
            }
        }
        details.insert("stale_prices".to_string(), serde_json::json!(stale_tickers));

        let status = if available.is_empty() {
            HealthStatus::Unhealthy
        } else if !stale_tickers.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Price engine is operational with fresh data".to_string(),
            HealthStatus::Degraded => {
                format!("Price engine has {} stale prices", stale_tickers.len())
            }
            HealthStatus::Unhealthy => "Price engine has no available price data".to_string(),
        };

        ComponentHealth {
            name: "price_engine".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }

    /// Stops the background refresh task
    ///
    /// Reads keep working and return the last stored values.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        tracing::info!("Price engine stopped");
    }
}
