use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Progression service counters
#[derive(Debug, Default)]
pub struct ProgressMetrics {
    pub completions_advanced: AtomicU64,
    pub completions_skipped: AtomicU64,
    pub transient_failures: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
}

impl ProgressMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_advanced(&self) {
        self.completions_advanced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.completions_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> ProgressStats {
        ProgressStats {
            completions_advanced: self.completions_advanced.load(Ordering::Relaxed),
            completions_skipped: self.completions_skipped.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Progress metrics: advanced={}, skipped={}, transient_failures={}, cache_hits={}, cache_misses={}",
            stats.completions_advanced,
            stats.completions_skipped,
            stats.transient_failures,
            stats.cache_hits,
            stats.cache_misses
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStats {
    pub completions_advanced: u64,
    pub completions_skipped: u64,
    pub transient_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Global metrics instance
static PROGRESS_METRICS: std::sync::LazyLock<ProgressMetrics> =
    std::sync::LazyLock::new(ProgressMetrics::new);

pub fn progress_metrics() -> &'static ProgressMetrics {
    &PROGRESS_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
