//! Data models for dirsync.
//!
//! - [`ProgressState`]: the live "what is happening" snapshot, plus [`OperationKind`]
//! - [`CollectionRecord`], [`ComparisonRecord`], [`CopyReportRecord`]: registry listings
//! - [`CollectionSnapshot`], [`ComparisonReport`], [`CopyReport`]: the documents behind
//!   those listings, as written to disk
//! - [`Settings`]: runtime configuration
//!
//! # Architecture Note
//!
//! Records and documents are created once, when their operation finishes, and never
//! mutated afterwards. [`ProgressState`] is the only mutable model and is wrapped by
//! [`ProgressTracker`](crate::state::ProgressTracker).

pub mod artifacts;
pub mod config;
pub mod progress;

pub use artifacts::{
    Artifact, ArtifactRecord, CollectionRecord, CollectionSnapshot, CollectionType, ComparisonRecord,
    ComparisonReport, CopyEntry, CopyReport, CopyReportRecord, DifferenceStatus, FileMeta,
    InaccessibleEntry, NotCopiedEntry,
};
pub use config::Settings;
pub use progress::{OperationKind, ProgressState};
