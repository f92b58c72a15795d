// Event fan-out
//
// The EventBus pushes status snapshots, log lines and completion notices to any number
// of observers. It wraps a tokio broadcast channel: every observer has its own bounded
// view of the ring buffer, delivery is FIFO per observer, publishing never waits, and an
// observer that falls behind loses its oldest events instead of slowing anybody down.

mod status;

pub use status::StatusReporter;

use crate::metrics::Metrics;
use crate::models::{
    CollectionRecord, CollectionType, ComparisonRecord, CopyReportRecord, OperationKind,
    ProgressState,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Full status push: progress plus the three artifact listings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub progress: ProgressState,
    pub collections: Vec<CollectionRecord>,
    pub comparisons: Vec<ComparisonRecord>,
    pub copy_reports: Vec<CopyReportRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogMessage {
    pub data: String,
    pub level: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Success,
    Stopped,
    Error,
}

/// Kind-specific numbers attached to a completion notice.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompletionSummary {
    Collection {
        collection_type: CollectionType,
        path: String,
        files_processed: u64,
        inaccessible_count: u64,
    },
    Comparison {
        not_copied_count: u64,
    },
    Copy {
        total_attempted: u64,
        copied_count: u64,
        failed_count: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionEvent {
    #[serde(skip)]
    pub kind: OperationKind,
    pub status: CompletionStatus,
    pub message: String,
    /// Registered artifact, if the run produced one.
    pub filename: Option<String>,
    pub csv_filename: Option<String>,
    #[serde(flatten)]
    pub summary: Option<CompletionSummary>,
}

/// Everything pushed to observers.
///
/// Serialises as `{"event": "<name>", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    StatusUpdate(StatusSnapshot),
    LogMessage(LogMessage),
    CollectionComplete(CompletionEvent),
    ComparisonComplete(CompletionEvent),
    CopyComplete(CompletionEvent),
    /// Sent once the orchestrator is idle again, however it got there
    OperationEnded,
}

impl Event {
    pub fn completion(event: CompletionEvent) -> Self {
        match event.kind {
            OperationKind::Collect => Event::CollectionComplete(event),
            OperationKind::Compare => Event::ComparisonComplete(event),
            OperationKind::Copy => Event::CopyComplete(event),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::StatusUpdate(_) => "status_update",
            Event::LogMessage(_) => "log_message",
            Event::CollectionComplete(e) | Event::ComparisonComplete(e) | Event::CopyComplete(e) => {
                e.kind.completion_event()
            }
            Event::OperationEnded => "operation_ended",
        }
    }

    pub fn as_completion(&self) -> Option<&CompletionEvent> {
        match self {
            Event::CollectionComplete(e) | Event::ComparisonComplete(e) | Event::CopyComplete(e) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// One-line JSON encoding used by line-oriented transports.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Publish side of the fan-out. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    metrics: Arc<Metrics>,
}

impl EventBus {
    /// Create a bus whose observers each buffer up to `capacity` events.
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, metrics }
    }

    /// Attach a new observer. It only sees events published after this call.
    pub fn attach(&self) -> Observer {
        Observer {
            rx: self.tx.subscribe(),
            dropped: 0,
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish_status(&self, snapshot: StatusSnapshot) {
        self.metrics.record_status_published();
        self.publish(Event::StatusUpdate(snapshot));
    }

    /// Push a log line to observers and mirror it into the tracing log.
    pub fn publish_log(&self, message: impl Into<String>, level: LogLevel) {
        let data = message.into();
        match level {
            LogLevel::Debug => tracing::debug!("{}", data),
            LogLevel::Info | LogLevel::Success => tracing::info!("{}", data),
            LogLevel::Warning => tracing::warn!("{}", data),
            LogLevel::Error => tracing::error!("{}", data),
        }
        self.publish(Event::LogMessage(LogMessage { data, level }));
    }

    pub fn publish_completion(&self, event: CompletionEvent) {
        self.publish(Event::completion(event));
    }

    pub fn publish_operation_ended(&self) {
        self.publish(Event::OperationEnded);
    }

    fn publish(&self, event: Event) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.tx.send(event);
    }
}

/// Receive side for one observer. Dropping it detaches.
pub struct Observer {
    rx: broadcast::Receiver<Event>,
    dropped: u64,
    metrics: Arc<Metrics>,
}

impl Observer {
    /// Next event in publish order, or `None` once the bus is gone.
    ///
    /// Events overwritten while this observer lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.note_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.note_lag(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently buffered.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Events this observer lost to buffer overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn note_lag(&mut self, skipped: u64) {
        tracing::warn!("Observer fell behind, dropped {} oldest events", skipped);
        self.dropped += skipped;
        self.metrics.record_events_dropped(skipped);
    }
}
