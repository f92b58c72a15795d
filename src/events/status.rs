use super::{EventBus, StatusSnapshot};
use crate::metrics::Metrics;
use crate::registry::ArtifactRegistry;
use crate::state::{ProgressChange, ProgressTracker};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Builds status snapshots and decides when to push them.
///
/// Lifecycle changes (start, pause, resume, idle) are pushed immediately. Plain progress
/// changes are pushed at most once per `interval`; the ones in between are counted as
/// coalesced and folded into the next push. Every snapshot is built and sent while
/// holding `last_push`, so observers never see an older state after a newer one.
pub struct StatusReporter {
    bus: EventBus,
    registry: Arc<ArtifactRegistry>,
    progress: ProgressTracker,
    interval: Duration,
    last_push: Mutex<Option<Instant>>,
    metrics: Arc<Metrics>,
}

impl StatusReporter {
    pub fn new(
        bus: EventBus,
        registry: Arc<ArtifactRegistry>,
        progress: ProgressTracker,
        interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            bus,
            registry,
            progress,
            interval,
            last_push: Mutex::new(None),
            metrics,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let listings = self.registry.listings();
        StatusSnapshot {
            progress: self.progress.snapshot(),
            collections: listings.collections,
            comparisons: listings.comparisons,
            copy_reports: listings.copy_reports,
        }
    }

    /// Push a snapshot regardless of the coalescing window.
    pub fn publish_now(&self) {
        let mut last_push = self.last_push.lock().unwrap_or_else(PoisonError::into_inner);
        *last_push = Some(Instant::now());
        self.bus.publish_status(self.snapshot());
    }

    /// Push a snapshot for `changes` if they warrant one.
    pub fn publish_changes(&self, changes: &[ProgressChange]) {
        if changes.is_empty() {
            return;
        }
        if changes.iter().any(ProgressChange::is_lifecycle) {
            self.publish_now();
            return;
        }

        // Build and send under the same guard so pushes leave in build order
        let mut last_push = self.last_push.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if last_push.is_none_or(|at| now.duration_since(at) >= self.interval) {
            *last_push = Some(now);
            self.bus.publish_status(self.snapshot());
        } else {
            self.metrics.record_status_coalesced();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::models::OperationKind;

    fn reporter(interval: Duration) -> (StatusReporter, EventBus, ProgressTracker) {
        let metrics = Arc::new(Metrics::new());
        let bus = EventBus::new(64, Arc::clone(&metrics));
        let progress = ProgressTracker::new();
        let reporter = StatusReporter::new(
            bus.clone(),
            Arc::new(ArtifactRegistry::new()),
            progress.clone(),
            interval,
            metrics,
        );
        (reporter, bus, progress)
    }

    #[test]
    fn test_lifecycle_changes_always_push() {
        let (reporter, bus, progress) = reporter(Duration::from_secs(3600));
        let mut observer = bus.attach();

        reporter.publish_changes(&progress.reset(OperationKind::Collect, "go"));
        reporter.publish_changes(&progress.set_paused(true));

        assert_eq!(observer.drain().len(), 2);
    }

    #[test]
    fn test_progress_bursts_are_coalesced() {
        let (reporter, bus, progress) = reporter(Duration::from_secs(3600));
        progress.reset(OperationKind::Collect, "go");
        let mut observer = bus.attach();

        for i in 0..10 {
            reporter.publish_changes(&progress.advance(1, &format!("f{}", i)));
        }

        let events = observer.drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::StatusUpdate(snapshot) => assert_eq!(snapshot.progress.files_processed, 1),
            other => panic!("Expected status update, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_interval_pushes_every_change() {
        let (reporter, bus, progress) = reporter(Duration::ZERO);
        progress.reset(OperationKind::Copy, "go");
        let mut observer = bus.attach();

        for _ in 0..5 {
            reporter.publish_changes(&progress.advance(1, "x"));
        }

        assert_eq!(observer.drain().len(), 5);
    }

    #[test]
    fn test_concurrent_pushes_end_on_latest_state() {
        let (reporter, bus, progress) = reporter(Duration::ZERO);
        let reporter = Arc::new(reporter);
        progress.reset(OperationKind::Collect, "go");
        let mut observer = bus.attach();

        let worker = {
            let reporter = Arc::clone(&reporter);
            let progress = progress.clone();
            std::thread::spawn(move || {
                for i in 0..2000 {
                    reporter.publish_changes(&progress.advance(1, &format!("f{}", i)));
                }
            })
        };
        reporter.publish_changes(&progress.set_paused(true));
        worker.join().unwrap();

        let mut last = None;
        while let Some(event) = observer.try_recv() {
            if let Event::StatusUpdate(snapshot) = event {
                last = Some(snapshot.progress);
            }
        }
        let last = last.unwrap();
        assert!(last.paused);
        assert_eq!(last.files_processed, 2000);
    }

    #[test]
    fn test_empty_changes_push_nothing() {
        let (reporter, bus, _progress) = reporter(Duration::ZERO);
        let mut observer = bus.attach();

        reporter.publish_changes(&[]);

        assert!(observer.drain().is_empty());
    }
}
