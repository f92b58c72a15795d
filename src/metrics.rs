// Performance metrics module
//
// Provides lightweight metrics tracking for monitoring orchestrator activity

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Orchestrator metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// Shared by the orchestrator, the worker context and the event bus, and logged on
/// shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Operations accepted by `start`
    pub operations_started: AtomicU64,

    /// Operations that ran to completion
    pub operations_completed: AtomicU64,

    /// Operations ended by a stop request
    pub operations_stopped: AtomicU64,

    /// Operations that failed on their root input or on persistence
    pub operations_failed: AtomicU64,

    /// Start requests rejected because another operation was active
    pub starts_rejected: AtomicU64,

    /// Files processed across all operations
    pub files_processed: AtomicU64,

    /// Status snapshots sent to the bus
    pub status_published: AtomicU64,

    /// Progress snapshots skipped by coalescing
    pub status_coalesced: AtomicU64,

    /// Events lost by observers that fell behind
    pub events_dropped: AtomicU64,

    /// Total busy time in milliseconds
    pub total_operation_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            operations_started: AtomicU64::new(0),
            operations_completed: AtomicU64::new(0),
            operations_stopped: AtomicU64::new(0),
            operations_failed: AtomicU64::new(0),
            starts_rejected: AtomicU64::new(0),
            files_processed: AtomicU64::new(0),
            status_published: AtomicU64::new(0),
            status_coalesced: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            total_operation_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_operation_started(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation_completed(&self) {
        self.operations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation_stopped(&self) {
        self.operations_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start_rejected(&self) {
        self.starts_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_files_processed(&self, count: u64) {
        self.files_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_status_published(&self) {
        self.status_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_coalesced(&self) {
        self.status_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_dropped(&self, count: u64) {
        self.events_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_operation_time(&self, duration: Duration) {
        self.total_operation_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Operations that reached Idle again, however they ended.
    pub fn operations_finished(&self) -> u64 {
        self.operations_completed.load(Ordering::Relaxed)
            + self.operations_stopped.load(Ordering::Relaxed)
            + self.operations_failed.load(Ordering::Relaxed)
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Orchestrator Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Operations: {} started, {} completed, {} stopped, {} failed, {} rejected",
            self.operations_started.load(Ordering::Relaxed),
            self.operations_completed.load(Ordering::Relaxed),
            self.operations_stopped.load(Ordering::Relaxed),
            self.operations_failed.load(Ordering::Relaxed),
            self.starts_rejected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Files processed: {}, busy time: {:.2}s",
            self.files_processed.load(Ordering::Relaxed),
            self.total_operation_time_ms.load(Ordering::Relaxed) as f64 / 1000.0
        );
        tracing::info!(
            "Status pushes: {} sent, {} coalesced; events dropped by slow observers: {}",
            self.status_published.load(Ordering::Relaxed),
            self.status_coalesced.load(Ordering::Relaxed),
            self.events_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.operations_started.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.operations_finished(), 0);
    }

    #[test]
    fn test_record_operation_outcomes() {
        let metrics = Metrics::new();

        metrics.record_operation_started();
        metrics.record_operation_started();
        metrics.record_operation_started();
        metrics.record_operation_completed();
        metrics.record_operation_stopped();
        metrics.record_operation_failed();
        metrics.record_start_rejected();

        assert_eq!(metrics.operations_started.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.operations_finished(), 3);
        assert_eq!(metrics.starts_rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_publication_counters() {
        let metrics = Metrics::new();

        metrics.record_status_published();
        metrics.record_status_coalesced();
        metrics.record_events_dropped(4);
        metrics.record_files_processed(10);
        metrics.record_operation_time(Duration::from_millis(250));

        assert_eq!(metrics.status_published.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.status_coalesced.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.events_dropped.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.files_processed.load(Ordering::Relaxed), 10);
        assert_eq!(metrics.total_operation_time_ms.load(Ordering::Relaxed), 250);
    }
}
