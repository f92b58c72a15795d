//! The operation orchestrator.
//!
//! [`Orchestrator`] owns the lifecycle of the one active operation:
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//!                    |                  |
//!                    +------stop--------+--> Stopping
//! Running / Stopping --(worker returns, artifact finalised)--> Idle
//! ```
//!
//! The phase lives behind a single mutex, and `start` only succeeds from `Idle`, so at
//! most one worker exists at any time. The worker itself runs on a blocking thread and
//! is driven by a tokio task that finalises the outcome once the worker returns.
//!
//! # Usage
//!
//! ```ignore
//! let orchestrator = Orchestrator::from_settings(&settings)?;
//! let mut observer = orchestrator.attach();
//!
//! orchestrator.start(StartRequest::Collect {
//!     directory: "/data".into(),
//!     collection_type: CollectionType::Origem,
//! })?;
//! orchestrator.pause()?;
//! orchestrator.resume()?;
//! orchestrator.wait_idle().await;
//! ```

mod error;
mod render;

pub use error::OrchestratorError;

use crate::control::ControlSignal;
use crate::events::{
    CompletionEvent, CompletionStatus, CompletionSummary, EventBus, LogLevel, Observer,
    StatusReporter, StatusSnapshot,
};
use crate::executor::{CollectStep, CompareStep, CopyStep, StepContext, StepExecutor, StepOutcome};
use crate::metrics::Metrics;
use crate::models::{
    Artifact, ArtifactRecord, CollectionRecord, CollectionType, ComparisonRecord,
    CopyReportRecord, OperationKind, ProgressState, Settings,
};
use crate::registry::ArtifactRegistry;
use crate::state::ProgressTracker;
use crate::store::{
    ArtifactStore, COMPARISON_PREFIX, COPY_REPORT_PREFIX, FsArtifactStore,
};
use anyhow::Context;
use camino::Utf8PathBuf;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Lifecycle phase of the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Stopping,
}

/// Parameters of a start command, one variant per operation kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartRequest {
    Collect {
        directory: Utf8PathBuf,
        collection_type: CollectionType,
    },
    /// Both fields are collection filenames.
    Compare { origem: String, destino: String },
    /// Comparison filename.
    Copy { comparison: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Error,
}

/// Reply to a control command: `{"status": "success" | "error", "message": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub status: AckStatus,
    pub message: String,
}

impl CommandAck {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: message.into(),
        }
    }

    /// Flatten a command result into the wire reply.
    pub fn from_result(result: Result<CommandAck, OrchestratorError>) -> Self {
        result.unwrap_or_else(|e| CommandAck::error(e.to_string()))
    }
}

/// Cloneable handle to the orchestrator. All clones drive the same state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    phase: Mutex<Phase>,
    control: Arc<ControlSignal>,
    progress: ProgressTracker,
    registry: Arc<ArtifactRegistry>,
    store: Arc<dyn ArtifactStore>,
    bus: EventBus,
    reporter: Arc<StatusReporter>,
    metrics: Arc<Metrics>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build an orchestrator over `store`, rebuilding the registry from what it holds.
    pub fn new(settings: &Settings, store: Arc<dyn ArtifactStore>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let registry = Arc::new(ArtifactRegistry::from_records(store.discover()));
        let progress = ProgressTracker::new();
        let bus = EventBus::new(settings.event_buffer, Arc::clone(&metrics));
        let reporter = Arc::new(StatusReporter::new(
            bus.clone(),
            Arc::clone(&registry),
            progress.clone(),
            Duration::from_millis(settings.status_interval_ms),
            Arc::clone(&metrics),
        ));

        tracing::info!(
            "Orchestrator ready with {} registered artifacts",
            registry.len()
        );

        Self {
            inner: Arc::new(Inner {
                phase: Mutex::new(Phase::Idle),
                control: Arc::new(ControlSignal::new()),
                progress,
                registry,
                store,
                bus,
                reporter,
                metrics,
                driver: Mutex::new(None),
            }),
        }
    }

    /// Build an orchestrator backed by the filesystem store configured in `settings`.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let store = FsArtifactStore::new(&settings.info_dir, &settings.results_dir)
            .context("Failed to open artifact directories")?;
        Ok(Self::new(settings, Arc::new(store)))
    }

    // ------------------------------------------------------------------
    // Control commands
    // ------------------------------------------------------------------

    /// Start an operation. Must be called from within a tokio runtime.
    ///
    /// Fails with [`OrchestratorError::Busy`] unless idle, leaving everything untouched.
    /// Inputs are validated before anything is spawned.
    pub fn start(&self, request: StartRequest) -> Result<CommandAck, OrchestratorError> {
        let inner = &self.inner;
        let mut phase = inner.lock_phase();
        if *phase != Phase::Idle {
            inner.metrics.record_start_rejected();
            tracing::warn!("Start rejected, orchestrator is {:?}", *phase);
            return Err(OrchestratorError::Busy);
        }

        let executor = inner.prepare(request).inspect_err(|e| {
            tracing::warn!("Start rejected: {}", e);
        })?;
        let kind = executor.kind();

        inner.control.reset();
        let changes = inner.progress.reset(kind, format!("Starting {}", kind));
        *phase = Phase::Running;
        inner.metrics.record_operation_started();
        inner.reporter.publish_changes(&changes);
        inner.bus.publish_log(format!("Operation {} started", kind), LogLevel::Info);

        let handle = tokio::spawn(drive(Arc::clone(inner), executor, Instant::now()));
        *inner.driver.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(CommandAck::success(format!("Operation {} started", kind)))
    }

    pub fn pause(&self) -> Result<CommandAck, OrchestratorError> {
        let inner = &self.inner;
        let mut phase = inner.lock_phase();
        match *phase {
            Phase::Running => {
                inner.control.pause();
                *phase = Phase::Paused;
                let changes = inner.progress.set_paused(true);
                inner.reporter.publish_changes(&changes);
                inner.bus.publish_log("Operation paused", LogLevel::Info);
                Ok(CommandAck::success("Operation paused"))
            }
            Phase::Paused => {
                tracing::info!("Pause ignored, operation already paused");
                Ok(CommandAck::success("Operation already paused"))
            }
            other => {
                tracing::info!("Pause ignored, orchestrator is {:?}", other);
                Err(OrchestratorError::NotRunning)
            }
        }
    }

    pub fn resume(&self) -> Result<CommandAck, OrchestratorError> {
        let inner = &self.inner;
        let mut phase = inner.lock_phase();
        match *phase {
            Phase::Paused => {
                inner.control.resume();
                *phase = Phase::Running;
                let changes = inner.progress.set_paused(false);
                inner.reporter.publish_changes(&changes);
                inner.bus.publish_log("Operation resumed", LogLevel::Info);
                Ok(CommandAck::success("Operation resumed"))
            }
            Phase::Running => {
                tracing::info!("Resume ignored, operation is not paused");
                Ok(CommandAck::success("Operation already running"))
            }
            other => {
                tracing::info!("Resume ignored, orchestrator is {:?}", other);
                Err(OrchestratorError::NotRunning)
            }
        }
    }

    /// Ask the active worker to stop at its next checkpoint. A paused worker wakes up.
    pub fn stop(&self) -> Result<CommandAck, OrchestratorError> {
        let inner = &self.inner;
        let mut phase = inner.lock_phase();
        match *phase {
            Phase::Running | Phase::Paused => {
                inner.control.cancel();
                *phase = Phase::Stopping;
                let changes = inner.progress.set_paused(false);
                inner.reporter.publish_changes(&changes);
                inner.bus.publish_log("Stop requested", LogLevel::Warning);
                Ok(CommandAck::success("Stop requested"))
            }
            Phase::Stopping => {
                tracing::info!("Stop already in progress");
                Ok(CommandAck::success("Stop already requested"))
            }
            Phase::Idle => {
                tracing::info!("Stop ignored, nothing is running");
                Err(OrchestratorError::NotRunning)
            }
        }
    }

    /// Wait for the active operation, if any, to be finalised.
    pub async fn wait_idle(&self) {
        let handle = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Operation driver ended abnormally: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        *self.inner.lock_phase()
    }

    pub fn progress(&self) -> ProgressState {
        self.inner.progress.snapshot()
    }

    /// Progress plus the three artifact listings.
    pub fn status(&self) -> StatusSnapshot {
        self.inner.reporter.snapshot()
    }

    /// Attach a new observer to the event stream.
    pub fn attach(&self) -> Observer {
        self.inner.bus.attach()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn list_collections(&self) -> Vec<CollectionRecord> {
        self.inner.registry.list_collections()
    }

    pub fn list_comparisons(&self) -> Vec<ComparisonRecord> {
        self.inner.registry.list_comparisons()
    }

    pub fn list_copy_reports(&self) -> Vec<CopyReportRecord> {
        self.inner.registry.list_copy_reports()
    }

    /// Raw content of any artifact file, JSON or CSV.
    pub fn fetch_artifact(&self, filename: &str) -> Result<Vec<u8>, OrchestratorError> {
        self.inner.store.read_raw(filename).map_err(|e| {
            tracing::warn!("Fetch of {} failed: {}", filename, e);
            OrchestratorError::from(e)
        })
    }

    /// Human-readable view of a comparison or copy report.
    pub fn render_artifact(&self, filename: &str) -> Result<String, OrchestratorError> {
        let store = &self.inner.store;
        if filename.starts_with(COMPARISON_PREFIX) {
            Ok(render::comparison(&store.load_comparison(filename)?))
        } else if filename.starts_with(COPY_REPORT_PREFIX) {
            Ok(render::copy_report(&store.load_copy_report(filename)?))
        } else {
            Err(OrchestratorError::NotFound(filename.to_string()))
        }
    }
}

impl Inner {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate a start request and build its executor.
    fn prepare(&self, request: StartRequest) -> Result<StepExecutor, OrchestratorError> {
        match request {
            StartRequest::Collect {
                directory,
                collection_type,
            } => {
                if !directory.is_dir() {
                    return Err(OrchestratorError::RootAccessFailure(directory.to_string()));
                }
                Ok(StepExecutor::Collect(CollectStep::new(directory, collection_type)))
            }
            StartRequest::Compare { origem, destino } => {
                for name in [&origem, &destino] {
                    if self.registry.collection(name).is_none() {
                        return Err(OrchestratorError::InputNotFound(name.clone()));
                    }
                }
                Ok(StepExecutor::Compare(CompareStep::new(
                    origem,
                    destino,
                    Arc::clone(&self.store),
                )))
            }
            StartRequest::Copy { comparison } => {
                if self.registry.comparison(&comparison).is_none() {
                    return Err(OrchestratorError::InputNotFound(comparison));
                }
                Ok(StepExecutor::Copy(CopyStep::new(
                    comparison,
                    Arc::clone(&self.store),
                )))
            }
        }
    }

    fn context(&self) -> StepContext {
        StepContext::new(
            Arc::clone(&self.control),
            self.progress.clone(),
            Arc::clone(&self.reporter),
            self.bus.clone(),
            Arc::clone(&self.metrics),
        )
    }

    /// Persist a finished artifact. The phase is still non-idle here, so no other
    /// operation can start while the files are written.
    fn persist(
        &self,
        kind: OperationKind,
        artifact: Artifact,
        status: CompletionStatus,
    ) -> (CompletionEvent, Option<ArtifactRecord>) {
        let summary = summarize(&artifact);
        match self.store.persist(&artifact) {
            Ok(persisted) => {
                let message = match status {
                    CompletionStatus::Stopped => {
                        format!("{} stopped, partial results saved to {}", kind, persisted.filename)
                    }
                    _ => format!("{} finished, results saved to {}", kind, persisted.filename),
                };
                let event = CompletionEvent {
                    kind,
                    status,
                    message,
                    filename: Some(persisted.filename),
                    csv_filename: persisted.csv_filename,
                    summary: Some(summary),
                };
                (event, Some(artifact.record()))
            }
            Err(e) => {
                let message = OrchestratorError::Persistence(e.to_string()).to_string();
                self.bus.publish_log(message.clone(), LogLevel::Error);
                (failure(kind, message), None)
            }
        }
    }

    /// Persist whatever the worker produced. Runs on a blocking thread.
    fn settle(
        &self,
        kind: OperationKind,
        outcome: StepOutcome,
    ) -> (CompletionEvent, Option<ArtifactRecord>) {
        match outcome {
            StepOutcome::Completed(artifact) => {
                self.persist(kind, artifact, CompletionStatus::Success)
            }
            StepOutcome::Stopped(Some(artifact)) => {
                self.persist(kind, artifact, CompletionStatus::Stopped)
            }
            StepOutcome::Stopped(None) => {
                let event = CompletionEvent {
                    kind,
                    status: CompletionStatus::Stopped,
                    message: format!("{} stopped, no results kept", kind),
                    filename: None,
                    csv_filename: None,
                    summary: None,
                };
                (event, None)
            }
            StepOutcome::Failed(message) => {
                self.bus.publish_log(message.clone(), LogLevel::Error);
                (failure(kind, message), None)
            }
        }
    }

    /// Register the settled artifact, notify observers and go back to idle.
    fn finalize(
        &self,
        kind: OperationKind,
        event: CompletionEvent,
        record: Option<ArtifactRecord>,
        elapsed: Duration,
    ) {
        match event.status {
            CompletionStatus::Success => self.metrics.record_operation_completed(),
            CompletionStatus::Stopped => self.metrics.record_operation_stopped(),
            CompletionStatus::Error => self.metrics.record_operation_failed(),
        }
        self.metrics.record_operation_time(elapsed);
        tracing::info!(
            "Operation {} ended ({:?}) after {:.2}s",
            kind,
            event.status,
            elapsed.as_secs_f64()
        );

        let mut phase = self.lock_phase();
        if let Some(record) = record {
            self.registry.register(record);
        }
        let idle_message = event.message.clone();
        self.bus.publish_completion(event);
        self.progress.mark_idle(idle_message);
        self.reporter.publish_now();
        self.bus.publish_operation_ended();
        *phase = Phase::Idle;
    }
}

async fn drive(inner: Arc<Inner>, executor: StepExecutor, started: Instant) {
    let kind = executor.kind();
    let ctx = inner.context();

    let outcome = match tokio::task::spawn_blocking(move || executor.run(&ctx)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Worker for {} crashed: {}", kind, e);
            StepOutcome::Failed(format!("{} worker crashed: {}", kind, e))
        }
    };

    let settler = Arc::clone(&inner);
    let (event, record) =
        match tokio::task::spawn_blocking(move || settler.settle(kind, outcome)).await {
            Ok(settled) => settled,
            Err(e) => {
                tracing::error!("Saving results of {} crashed: {}", kind, e);
                let message = OrchestratorError::Persistence(e.to_string()).to_string();
                inner.bus.publish_log(message.clone(), LogLevel::Error);
                (failure(kind, message), None)
            }
        };

    inner.finalize(kind, event, record, started.elapsed());
}

fn failure(kind: OperationKind, message: String) -> CompletionEvent {
    CompletionEvent {
        kind,
        status: CompletionStatus::Error,
        message,
        filename: None,
        csv_filename: None,
        summary: None,
    }
}

fn summarize(artifact: &Artifact) -> CompletionSummary {
    match artifact {
        Artifact::Collection(snapshot) => CompletionSummary::Collection {
            collection_type: snapshot.collection_type,
            path: snapshot.base_directory.clone(),
            files_processed: snapshot.total_files_scanned + snapshot.inaccessible_files_count,
            inaccessible_count: snapshot.inaccessible_files_count,
        },
        Artifact::Comparison(report) => CompletionSummary::Comparison {
            not_copied_count: report.not_copied_files_count,
        },
        Artifact::CopyReport(report) => CompletionSummary::Copy {
            total_attempted: report.total_files_attempted,
            copied_count: report.files_copied_successfully,
            failed_count: report.files_failed_to_copy,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::store::{MockArtifactStore, StoreError};
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn settings() -> Settings {
        Settings {
            status_interval_ms: 0,
            ..Settings::default()
        }
    }

    fn temp_dir_with_files(count: usize) -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        for i in 0..count {
            std::fs::write(root.join(format!("file{}.txt", i)), b"data").unwrap();
        }
        (temp, root)
    }

    #[tokio::test]
    async fn test_persist_failure_reports_error() {
        let mut store = MockArtifactStore::new();
        store.expect_discover().returning(Vec::new);
        store
            .expect_persist()
            .returning(|_| {
                Err(StoreError::Io {
                    path: Utf8PathBuf::from("info_data"),
                    source: std::io::Error::other("disk full"),
                })
            });
        let orchestrator = Orchestrator::new(&settings(), Arc::new(store));
        let mut observer = orchestrator.attach();
        let (_temp, root) = temp_dir_with_files(2);

        orchestrator
            .start(StartRequest::Collect {
                directory: root,
                collection_type: CollectionType::Origem,
            })
            .unwrap();
        timeout(Duration::from_secs(10), orchestrator.wait_idle())
            .await
            .unwrap();

        let events = observer.drain();
        let completion = events
            .iter()
            .find_map(Event::as_completion)
            .expect("completion event");
        assert_eq!(completion.status, CompletionStatus::Error);
        assert!(completion.message.starts_with("Failed to persist artifact"));
        assert!(orchestrator.list_collections().is_empty());
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert_eq!(
            orchestrator
                .metrics()
                .operations_failed
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_start_rejects_missing_root() {
        let mut store = MockArtifactStore::new();
        store.expect_discover().returning(Vec::new);
        let orchestrator = Orchestrator::new(&settings(), Arc::new(store));

        let result = orchestrator.start(StartRequest::Collect {
            directory: Utf8PathBuf::from("/definitely/not/here"),
            collection_type: CollectionType::Destino,
        });

        assert!(matches!(result, Err(OrchestratorError::RootAccessFailure(_))));
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_inputs() {
        let mut store = MockArtifactStore::new();
        store.expect_discover().returning(Vec::new);
        let orchestrator = Orchestrator::new(&settings(), Arc::new(store));

        let compare = orchestrator.start(StartRequest::Compare {
            origem: "collected_info_origem_x.json".to_string(),
            destino: "collected_info_destino_y.json".to_string(),
        });
        let copy = orchestrator.start(StartRequest::Copy {
            comparison: "comparison_result_z.json".to_string(),
        });

        assert_eq!(
            compare,
            Err(OrchestratorError::InputNotFound(
                "collected_info_origem_x.json".to_string()
            ))
        );
        assert!(matches!(copy, Err(OrchestratorError::InputNotFound(_))));
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[test]
    fn test_command_ack_from_error() {
        let ack = CommandAck::from_result(Err(OrchestratorError::Busy));
        assert_eq!(ack.status, AckStatus::Error);
        assert_eq!(ack.message, "Another operation is already in progress");

        let json = serde_json::to_string(&CommandAck::success("ok")).unwrap();
        assert_eq!(json, r#"{"status":"success","message":"ok"}"#);
    }
}
