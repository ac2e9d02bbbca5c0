//! Periodic refresh of every tracked ticker
//!
//! One background task ticks every `refresh_interval`. Each tick asks the
//! generator for a new price per ticker, stores the resulting record and then
//! publishes it. A whole cycle finishes before the next one starts, so two
//! refreshes of the same ticker never race.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    broadcast::PriceBroadcaster,
    error::GeneratorError,
    generator::PriceGenerator,
    metrics::MetricsCollector,
    store::LatestPriceStore,
    types::{EngineEvent, PriceRecord, Ticker},
};

/// Lifecycle of the background refresh task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Records written during the cycle
    pub refreshed: Vec<Arc<PriceRecord>>,
    /// Tickers whose price stayed stale, with the reason
    pub failed: Vec<(Ticker, GeneratorError)>,
}

impl CycleReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Everything a refresh cycle touches
pub(crate) struct RefreshContext {
    pub(crate) tickers: Vec<Ticker>,
    pub(crate) generator: Arc<dyn PriceGenerator>,
    pub(crate) store: Arc<LatestPriceStore>,
    pub(crate) broadcaster: Arc<PriceBroadcaster>,
    pub(crate) metrics: Arc<MetricsCollector>,
    pub(crate) events: broadcast::Sender<EngineEvent>,
}

impl RefreshContext {
    async fn refresh_ticker(&self, ticker: &Ticker) -> Result<Arc<PriceRecord>, GeneratorError> {
        let started = Instant::now();
        let result = AssertUnwindSafe(self.generator.generate(ticker))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(GeneratorError::Unavailable(panic_message(&*panic))));
        self.metrics
            .record_generation(started.elapsed(), result.is_ok())
            .await;

        match result {
            Ok(price) => {
                let record = Arc::new(PriceRecord::new(ticker.clone(), price));
                let previous = self.store.put(record.clone()).await;
                let receivers = self.broadcaster.publish(record.clone());

                tracing::debug!(
                    ticker = %ticker,
                    price = price,
                    receivers = receivers,
                    "Refreshed price"
                );
                let _ = self.events.send(EngineEvent::PriceUpdated {
                    id: Uuid::new_v4(),
                    ticker: ticker.clone(),
                    old_price: previous.map(|p| p.price()),
                    new_price: price,
                    timestamp: record.observed_at(),
                });
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(
                    ticker = %ticker,
                    generator = self.generator.generator_name(),
                    error = %e,
                    "Price generation failed, keeping previous value"
                );
                let _ = self.events.send(EngineEvent::GenerationFailed {
                    id: Uuid::new_v4(),
                    ticker: ticker.clone(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> CycleReport {
        let outcomes = join_all(self.tickers.iter().map(|t| self.refresh_ticker(t))).await;

        let mut report = CycleReport::default();
        for (ticker, outcome) in self.tickers.iter().zip(outcomes) {
            match outcome {
                Ok(record) => report.refreshed.push(record),
                Err(e) => report.failed.push((ticker.clone(), e)),
            }
        }

        self.metrics.record_cycle().await;
        tracing::debug!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Refresh cycle complete"
        );
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("generator panicked: {}", detail)
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningTask {
    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Drives the periodic refresh task
pub struct RefreshScheduler {
    context: Arc<RefreshContext>,
    interval: Duration,
    /// Held for the duration of a cycle so manual and timed cycles never overlap
    cycle_lock: Arc<tokio::sync::Mutex<()>>,
    task: Mutex<Option<RunningTask>>,
}

impl RefreshScheduler {
    pub(crate) fn new(context: RefreshContext, interval: Duration) -> Self {
        Self {
            context: Arc::new(context),
            interval,
            cycle_lock: Arc::new(tokio::sync::Mutex::new(())),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<RunningTask>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns the background task; the first cycle runs one interval later
    ///
    /// Calling `start` on a running scheduler does nothing.
    pub fn start(&self) {
        let mut task = self.task();
        if task.as_ref().is_some_and(RunningTask::is_alive) {
            tracing::debug!("Refresh scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let context = self.context.clone();
        let cycle_lock = self.cycle_lock.clone();
        let period = self.interval;
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(
                refresh_interval_ms = period.as_millis() as u64,
                tickers = context.tickers.len(),
                "Starting price refresh task"
            );

            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticks.tick() => {
                        let _cycle = cycle_lock.lock().await;
                        context.run_cycle().await;
                    }
                }
            }

            tracing::info!("Price refresh task stopped");
        });

        *task = Some(RunningTask { cancel, handle });
    }

    /// Runs one cycle right away, outside the timer
    pub async fn refresh_now(&self) -> CycleReport {
        let _cycle = self.cycle_lock.lock().await;
        self.context.run_cycle().await
    }

    /// Signals the background task to stop and waits for it to finish
    pub async fn shutdown(&self) {
        let running = self.task().take();
        if let Some(RunningTask { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Price refresh task ended abnormally");
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.task().as_ref().is_some_and(RunningTask::is_alive) {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.task().take() {
            running.cancel.cancel();
        }
    }
}
