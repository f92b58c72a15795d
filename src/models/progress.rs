use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// The three kinds of exclusive background operation.
///
/// The kind decides which [`StepExecutor`](crate::executor::StepExecutor) variant runs,
/// which artifact schema the result uses and which completion event is pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Collect,
    Compare,
    Copy,
}

impl OperationKind {
    /// Name of the completion event pushed to observers for this kind.
    pub fn completion_event(&self) -> &'static str {
        match self {
            OperationKind::Collect => "collection_complete",
            OperationKind::Compare => "comparison_complete",
            OperationKind::Copy => "copy_complete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Collect => "collect",
            OperationKind::Compare => "compare",
            OperationKind::Copy => "copy",
        };
        f.write_str(name)
    }
}

/// Snapshot of "what is happening right now".
///
/// Exactly one instance lives inside a [`ProgressTracker`](crate::state::ProgressTracker);
/// everybody else only ever sees clones of it.
///
/// Invariants maintained by the tracker:
/// - `paused` implies `running`
/// - once `total_files_estimated` is non-zero it never decreases and never drops below
///   `files_processed`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressState {
    pub running: bool,
    pub paused: bool,
    pub kind: Option<OperationKind>,
    pub files_processed: u64,
    /// 0 means unknown.
    pub total_files_estimated: u64,
    pub current_path: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    pub status_message: String,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            running: false,
            paused: false,
            kind: None,
            files_processed: 0,
            total_files_estimated: 0,
            current_path: String::new(),
            started_at: None,
            status_message: "Waiting for an operation".to_string(),
        }
    }
}

impl ProgressState {
    /// Completed fraction in percent, or `None` while the total is unknown.
    pub fn percent(&self) -> Option<f64> {
        if self.total_files_estimated == 0 {
            return None;
        }
        Some(self.files_processed as f64 * 100.0 / self.total_files_estimated as f64)
    }

    /// Whether an operation currently owns the tracker.
    pub fn is_active(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let state = ProgressState::default();
        assert!(!state.running);
        assert!(!state.paused);
        assert_eq!(state.kind, None);
        assert_eq!(state.percent(), None);
    }

    #[test]
    fn test_percent() {
        let state = ProgressState {
            files_processed: 25,
            total_files_estimated: 100,
            ..ProgressState::default()
        };
        assert_eq!(state.percent(), Some(25.0));
    }

    #[test]
    fn test_completion_event_names() {
        assert_eq!(OperationKind::Collect.completion_event(), "collection_complete");
        assert_eq!(OperationKind::Compare.completion_event(), "comparison_complete");
        assert_eq!(OperationKind::Copy.completion_event(), "copy_complete");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&OperationKind::Collect).unwrap();
        assert_eq!(json, "\"collect\"");
    }
}
