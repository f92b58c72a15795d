// Progress state management
//
// This module provides the ProgressTracker which wraps the single ProgressState with
// thread-safe access using Arc<RwLock<T>> and reports which parts of it changed.

use crate::models::{OperationKind, ProgressState};
use std::sync::{Arc, PoisonError, RwLock};
use time::OffsetDateTime;

/// Changes detected by [`ProgressTracker::update`].
///
/// The orchestrator uses these to decide whether a status push is a lifecycle push
/// (always sent) or a progress push (coalesced).
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressChange {
    /// A new operation took ownership of the tracker
    Started { kind: OperationKind },

    /// Files were processed or the current path moved
    Advanced {
        files_processed: u64,
        current_path: String,
    },

    /// The total estimate grew
    EstimateRevised { total: u64 },

    Paused,

    Resumed,

    /// The human readable status line changed
    MessageChanged { message: String },

    /// The tracker went back to idle
    Idle,
}

impl ProgressChange {
    /// Whether observers must see this change immediately.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            ProgressChange::Started { .. }
                | ProgressChange::Paused
                | ProgressChange::Resumed
                | ProgressChange::Idle
        )
    }
}

/// Thread-safe owner of the one [`ProgressState`].
///
/// - Writers go through [`update()`](Self::update) or the convenience mutators; a whole
///   mutation happens under a single write guard, so readers never see half of it
/// - Readers take a [`snapshot()`](Self::snapshot) clone or use [`read()`](Self::read)
///
/// Invariants enforced after every mutation:
/// - `paused` implies `running`
/// - a non-zero estimate is never below `files_processed` and never shrinks
#[derive(Clone, Default)]
pub struct ProgressTracker {
    state: Arc<RwLock<ProgressState>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the current state, safe to hold without locks.
    pub fn snapshot(&self) -> ProgressState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = tracker.read(|state| state.running);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ProgressState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Apply a mutation and report what changed.
    ///
    /// This is the only write path. It:
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Re-establishes the invariants
    /// 4. Returns the detected changes
    pub fn update<F>(&self, update_fn: F) -> Vec<ProgressChange>
    where
        F: FnOnce(&mut ProgressState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        if state.paused && !state.running {
            state.paused = false;
        }
        if state.running && old_state.running && state.started_at == old_state.started_at {
            // estimate only ever grows during one operation
            state.total_files_estimated = state
                .total_files_estimated
                .max(old_state.total_files_estimated);
        }
        if state.total_files_estimated > 0 && state.total_files_estimated < state.files_processed {
            state.total_files_estimated = state.files_processed;
        }

        Self::detect_changes(&old_state, &state)
    }

    fn detect_changes(old: &ProgressState, new: &ProgressState) -> Vec<ProgressChange> {
        let mut changes = Vec::new();

        if !new.running && old.running {
            changes.push(ProgressChange::Idle);
        }
        if new.running && (!old.running || new.started_at != old.started_at) {
            if let Some(kind) = new.kind {
                changes.push(ProgressChange::Started { kind });
            }
        }

        if new.running && old.paused != new.paused {
            if new.paused {
                changes.push(ProgressChange::Paused);
            } else {
                changes.push(ProgressChange::Resumed);
            }
        }

        if old.files_processed != new.files_processed || old.current_path != new.current_path {
            changes.push(ProgressChange::Advanced {
                files_processed: new.files_processed,
                current_path: new.current_path.clone(),
            });
        }

        if new.total_files_estimated > old.total_files_estimated {
            changes.push(ProgressChange::EstimateRevised {
                total: new.total_files_estimated,
            });
        }

        if old.status_message != new.status_message {
            changes.push(ProgressChange::MessageChanged {
                message: new.status_message.clone(),
            });
        }

        changes
    }

    // Convenience methods for the operation lifecycle

    /// Hand the tracker to a new operation of `kind`, clearing all counters.
    pub fn reset(&self, kind: OperationKind, message: impl Into<String>) -> Vec<ProgressChange> {
        let message = message.into();
        self.update(|state| {
            *state = ProgressState {
                running: true,
                paused: false,
                kind: Some(kind),
                files_processed: 0,
                total_files_estimated: 0,
                current_path: String::new(),
                started_at: Some(OffsetDateTime::now_utc()),
                status_message: message,
            };
        })
    }

    /// Count `delta_files` more processed entries and move the current path.
    pub fn advance(&self, delta_files: u64, current_path: &str) -> Vec<ProgressChange> {
        self.update(|state| {
            state.files_processed = state.files_processed.saturating_add(delta_files);
            if state.current_path != current_path {
                state.current_path = current_path.to_string();
            }
        })
    }

    /// Raise the estimate to `total` (never lowers it, never below files_processed).
    pub fn revise_estimate(&self, total: u64) -> Vec<ProgressChange> {
        self.update(|state| {
            let floor = state.total_files_estimated.max(state.files_processed);
            state.total_files_estimated = total.max(floor);
        })
    }

    pub fn set_paused(&self, paused: bool) -> Vec<ProgressChange> {
        self.update(|state| {
            if state.running {
                state.paused = paused;
            }
        })
    }

    pub fn set_message(&self, message: impl Into<String>) -> Vec<ProgressChange> {
        let message = message.into();
        self.update(|state| state.status_message = message)
    }

    /// Return to idle. Only called once no operation is active.
    pub fn mark_idle(&self, message: impl Into<String>) -> Vec<ProgressChange> {
        let message = message.into();
        self.update(|state| {
            state.running = false;
            state.paused = false;
            state.kind = None;
            state.current_path.clear();
            state.status_message = message;
        })
    }
}
