//! Engine metrics collection and reporting
//!
//! Tracks generation latency and success rates, completed refresh cycles and
//! subscriber overruns.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Point-in-time view of the engine counters
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMetrics {
    /// Name of the generator being measured
    pub generator_name: String,
    /// 50th percentile generation latency in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile generation latency in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of generation calls
    pub total_generations: u64,
    /// Number of failed generation calls
    pub failed_generations: u64,
    /// Refresh cycles run to completion
    pub completed_cycles: u64,
    /// Records dropped because a subscriber fell behind
    pub overrun_records: u64,
}

impl EngineMetrics {
    /// Creates metrics with no data
    pub fn empty(generator_name: &str) -> Self {
        Self {
            generator_name: generator_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_generations: 0,
            failed_generations: 0,
            completed_cycles: 0,
            overrun_records: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    total_generations: u64,
    failed_generations: u64,
    completed_cycles: u64,
    overrun_records: u64,
}

/// Collects and computes engine metrics
pub struct MetricsCollector {
    generator_name: String,
    /// Rolling window of latency samples
    samples: RwLock<VecDeque<LatencySample>>,
    /// Lifetime counters
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a generator
    pub fn new(generator_name: &str) -> Self {
        Self {
            generator_name: generator_name.to_string(),
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Records one generation call with its duration and outcome
    pub async fn record_generation(&self, duration: Duration, success: bool) {
        let duration_ms = duration.as_secs_f64() * 1000.0;

        {
            let mut counters = self.counters.write().await;
            counters.total_generations += 1;
            if !success {
                counters.failed_generations += 1;
            }
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms,
            success,
        });
    }

    /// Records a finished refresh cycle
    pub async fn record_cycle(&self) {
        self.counters.write().await.completed_cycles += 1;
    }

    /// Records records skipped by a lagging subscriber
    pub async fn record_overrun(&self, skipped: u64) {
        self.counters.write().await.overrun_records += skipped;
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> EngineMetrics {
        let samples = self.samples.read().await;
        let counters = self.counters.read().await;

        let mut metrics = EngineMetrics::empty(&self.generator_name);
        metrics.completed_cycles = counters.completed_cycles;
        metrics.overrun_records = counters.overrun_records;

        if samples.is_empty() {
            return metrics;
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let total = counters.total_generations;
        let failed = counters.failed_generations;

        metrics.latency_p50_ms = percentile(&latencies, 50.0);
        metrics.latency_p99_ms = percentile(&latencies, 99.0);
        metrics.success_rate = if total > 0 {
            (total - failed) as f64 / total as f64
        } else {
            1.0
        };
        metrics.total_generations = total;
        metrics.failed_generations = failed;
        metrics
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
