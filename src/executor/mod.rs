//! Step executors - the resumable units of work behind each operation kind.
//!
//! [`StepExecutor`] is a closed enum with one arm per [`OperationKind`]. Each arm runs
//! synchronously on a blocking worker thread and talks to the rest of the system only
//! through its [`StepContext`]:
//!
//! - [`StepContext::checkpoint`] after every unit of work (file, compared path, copy).
//!   A pause blocks right there; a stop makes the arm unwind and return
//!   [`StepOutcome::Stopped`]
//! - [`StepContext::advance`] / [`StepContext::revise_estimate`] for progress
//! - [`StepContext::log`] for observer-visible log lines
//!
//! # Error policy
//!
//! Per-item failures (an unreadable file, a failed copy) are recorded in the artifact and
//! never abort the run. Only a failure to reach the operation's root input (missing root
//! directory, unreadable input artifact) ends the run with [`StepOutcome::Failed`].

mod collect;
mod compare;
mod copy;

pub use collect::CollectStep;
pub use compare::CompareStep;
pub use copy::CopyStep;

use crate::control::{Checkpoint, ControlSignal, Flow};
use crate::events::{EventBus, LogLevel, StatusReporter};
use crate::metrics::Metrics;
use crate::models::{Artifact, OperationKind};
use crate::state::ProgressTracker;
use std::sync::Arc;

/// How a step ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed(Artifact),
    /// Stopped on request. Carries a partial artifact only when the kind keeps one.
    Stopped(Option<Artifact>),
    /// The root input was unreachable.
    Failed(String),
}

/// Everything a running step may touch.
pub struct StepContext {
    control: Arc<ControlSignal>,
    progress: ProgressTracker,
    reporter: Arc<StatusReporter>,
    bus: EventBus,
    metrics: Arc<Metrics>,
}

impl StepContext {
    pub fn new(
        control: Arc<ControlSignal>,
        progress: ProgressTracker,
        reporter: Arc<StatusReporter>,
        bus: EventBus,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            control,
            progress,
            reporter,
            bus,
            metrics,
        }
    }

    /// Poll the control signal, blocking here while paused.
    pub fn checkpoint(&self) -> Flow {
        match self.control.poll() {
            Checkpoint::Continue => Flow::Continue,
            Checkpoint::Cancel => Flow::Cancel,
            Checkpoint::PauseWait => {
                tracing::debug!("Worker parked at checkpoint");
                let flow = self.control.wait_checkpoint();
                tracing::debug!("Worker left checkpoint: {:?}", flow);
                flow
            }
        }
    }

    pub fn advance(&self, delta_files: u64, current_path: &str) {
        self.metrics.record_files_processed(delta_files);
        let changes = self.progress.advance(delta_files, current_path);
        self.reporter.publish_changes(&changes);
    }

    pub fn revise_estimate(&self, total: u64) {
        let changes = self.progress.revise_estimate(total);
        self.reporter.publish_changes(&changes);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let changes = self.progress.set_message(message);
        self.reporter.publish_changes(&changes);
    }

    pub fn log(&self, message: impl Into<String>, level: LogLevel) {
        self.bus.publish_log(message, level);
    }
}

/// One arm per operation kind, all sharing the same `run` contract.
pub enum StepExecutor {
    Collect(CollectStep),
    Compare(CompareStep),
    Copy(CopyStep),
}

impl StepExecutor {
    pub fn kind(&self) -> OperationKind {
        match self {
            StepExecutor::Collect(_) => OperationKind::Collect,
            StepExecutor::Compare(_) => OperationKind::Compare,
            StepExecutor::Copy(_) => OperationKind::Copy,
        }
    }

    /// Drive the step to completion, stop or failure. Blocks the calling thread.
    pub fn run(&self, ctx: &StepContext) -> StepOutcome {
        match self {
            StepExecutor::Collect(step) => step.run(ctx),
            StepExecutor::Compare(step) => step.run(ctx),
            StepExecutor::Copy(step) => step.run(ctx),
        }
    }
}

/// Join the components of a relative path with `/`, whatever the platform separator.
pub(crate) fn portable_path(path: &camino::Utf8Path) -> String {
    path.components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::Observer;
    use crate::registry::ArtifactRegistry;
    use std::time::Duration;

    /// A context wired to a fresh tracker, bus and signal.
    pub struct Harness {
        pub control: Arc<ControlSignal>,
        pub progress: ProgressTracker,
        pub observer: Observer,
        pub ctx: StepContext,
    }

    pub fn harness() -> Harness {
        let metrics = Arc::new(Metrics::new());
        let bus = EventBus::new(4096, Arc::clone(&metrics));
        let observer = bus.attach();
        let progress = ProgressTracker::new();
        let reporter = Arc::new(StatusReporter::new(
            bus.clone(),
            Arc::new(ArtifactRegistry::new()),
            progress.clone(),
            Duration::ZERO,
            Arc::clone(&metrics),
        ));
        let control = Arc::new(ControlSignal::new());
        let ctx = StepContext::new(
            Arc::clone(&control),
            progress.clone(),
            reporter,
            bus,
            metrics,
        );
        Harness {
            control,
            progress,
            observer,
            ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::harness;
    use super::*;
    use camino::Utf8Path;

    #[test]
    fn test_checkpoint_follows_signal() {
        let h = harness();
        assert_eq!(h.ctx.checkpoint(), Flow::Continue);

        h.control.cancel();
        assert_eq!(h.ctx.checkpoint(), Flow::Cancel);
    }

    #[test]
    fn test_advance_updates_progress() {
        let h = harness();
        h.progress.reset(OperationKind::Collect, "go");

        h.ctx.revise_estimate(4);
        h.ctx.advance(1, "a.txt");

        let state = h.progress.snapshot();
        assert_eq!(state.files_processed, 1);
        assert_eq!(state.total_files_estimated, 4);
        assert_eq!(state.current_path, "a.txt");
    }

    #[test]
    fn test_portable_path() {
        assert_eq!(portable_path(Utf8Path::new("a/b/c.txt")), "a/b/c.txt");
        assert_eq!(portable_path(Utf8Path::new("c.txt")), "c.txt");
    }
}
