// dirsync - pausable directory collection, comparison and selective copy
//
// This is the library crate containing the orchestrator and everything it drives.
// The binary crate (main.rs) provides the line-oriented console entry point.

pub mod config;
pub mod console;
pub mod control;
pub mod events;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod state;
pub mod store;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use events::{Event, EventBus, Observer};
pub use models::{CollectionType, OperationKind, ProgressState, Settings};
pub use orchestrator::{CommandAck, Orchestrator, OrchestratorError, Phase, StartRequest};
pub use state::{ProgressChange, ProgressTracker};
pub use store::{ArtifactStore, FsArtifactStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
