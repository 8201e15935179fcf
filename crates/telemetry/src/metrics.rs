//! Migration run metrics.
//!
//! Collected in-memory for the duration of one runner invocation and logged
//! as a snapshot when the run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for statement durations.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 100ms, 1s, 10s, 1m, 10m, 1h, above
    buckets: [AtomicU64; 7],
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 6] = [100, 1_000, 10_000, 60_000, 600_000, 3_600_000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);

        let index = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper bound ms, count)` pairs; the overflow bucket has bound `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Metrics for one runner invocation.
#[derive(Debug, Default)]
pub struct MigrationMetrics {
    // Runner
    pub scripts_applied: Counter,
    pub scripts_skipped: Counter,
    pub scripts_failed: Counter,
    pub artifacts_written: Counter,

    // Executor
    pub statements_executed: Counter,
    pub statements_failed: Counter,
    pub queries_killed: Counter,
    pub kill_failures: Counter,
    pub progress_polls: Counter,

    pub statement_duration_ms: Histogram,
}

impl MigrationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            scripts_applied: self.scripts_applied.get(),
            scripts_skipped: self.scripts_skipped.get(),
            scripts_failed: self.scripts_failed.get(),
            artifacts_written: self.artifacts_written.get(),
            statements_executed: self.statements_executed.get(),
            statements_failed: self.statements_failed.get(),
            queries_killed: self.queries_killed.get(),
            kill_failures: self.kill_failures.get(),
            progress_polls: self.progress_polls.get(),
            statement_duration_mean_ms: self.statement_duration_ms.mean(),
            statement_duration_max_ms: self.statement_duration_ms.max(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub scripts_applied: u64,
    pub scripts_skipped: u64,
    pub scripts_failed: u64,
    pub artifacts_written: u64,
    pub statements_executed: u64,
    pub statements_failed: u64,
    pub queries_killed: u64,
    pub kill_failures: u64,
    pub progress_polls: u64,
    pub statement_duration_mean_ms: f64,
    pub statement_duration_max_ms: u64,
}

impl MetricsSnapshot {
    /// Log the snapshot as one structured line.
    pub fn log(&self) {
        tracing::info!(
            scripts_applied = self.scripts_applied,
            scripts_skipped = self.scripts_skipped,
            scripts_failed = self.scripts_failed,
            statements_executed = self.statements_executed,
            statements_failed = self.statements_failed,
            queries_killed = self.queries_killed,
            statement_mean_ms = format!("{:.1}", self.statement_duration_mean_ms),
            statement_max_ms = self.statement_duration_max_ms,
            "Migration run summary"
        );
    }
}
