use super::{StepContext, StepOutcome};
use crate::control::Flow;
use crate::events::LogLevel;
use crate::models::{Artifact, ComparisonReport, DifferenceStatus, NotCopiedEntry};
use crate::store::ArtifactStore;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Diffs an origem collection against a destino collection by path, size and mtime.
pub struct CompareStep {
    pub origem: String,
    pub destino: String,
    store: Arc<dyn ArtifactStore>,
}

impl CompareStep {
    pub fn new(
        origem: impl Into<String>,
        destino: impl Into<String>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            origem: origem.into(),
            destino: destino.into(),
            store,
        }
    }

    pub fn run(&self, ctx: &StepContext) -> StepOutcome {
        let origem = match self.store.load_collection(&self.origem) {
            Ok(doc) => doc,
            Err(e) => return StepOutcome::Failed(format!("Cannot load {}: {}", self.origem, e)),
        };
        let destino = match self.store.load_collection(&self.destino) {
            Ok(doc) => doc,
            Err(e) => return StepOutcome::Failed(format!("Cannot load {}: {}", self.destino, e)),
        };

        ctx.revise_estimate(origem.files.len() as u64);
        ctx.set_message(format!("Comparing {} with {}", self.origem, self.destino));
        ctx.log(
            format!(
                "Comparing {} ({} files) with {} ({} files)",
                origem.base_directory,
                origem.files.len(),
                destino.base_directory,
                destino.files.len()
            ),
            LogLevel::Info,
        );

        let mut not_copied = Vec::new();
        let mut missing = 0u64;
        let mut different = 0u64;
        let mut found_in_both = 0u64;

        for (path, meta) in &origem.files {
            match destino.files.get(path) {
                None => {
                    missing += 1;
                    not_copied.push(NotCopiedEntry {
                        relative_path: path.clone(),
                        status: DifferenceStatus::MissingInDestino,
                        size_origem: Some(meta.size),
                        mtime_origem: Some(meta.mtime),
                        size_destino: None,
                        mtime_destino: None,
                    });
                }
                Some(other) if other.size != meta.size || other.mtime != meta.mtime => {
                    different += 1;
                    not_copied.push(NotCopiedEntry {
                        relative_path: path.clone(),
                        status: DifferenceStatus::Different,
                        size_origem: Some(meta.size),
                        mtime_origem: Some(meta.mtime),
                        size_destino: Some(other.size),
                        mtime_destino: Some(other.mtime),
                    });
                }
                Some(_) => found_in_both += 1,
            }
            ctx.advance(1, path);

            if ctx.checkpoint() == Flow::Cancel {
                ctx.log("Comparison stopped, partial results discarded", LogLevel::Warning);
                return StepOutcome::Stopped(None);
            }
        }

        let report = ComparisonReport {
            session_id: Uuid::new_v4().to_string(),
            timestamp: OffsetDateTime::now_utc(),
            json_origem_filename: self.origem.clone(),
            json_destino_filename: self.destino.clone(),
            dir_origem: origem.base_directory,
            dir_destino: destino.base_directory,
            total_files_origem: origem.files.len() as u64,
            total_files_destino: destino.files.len() as u64,
            files_found_in_both: found_in_both,
            files_missing_in_destino: missing,
            files_different: different,
            not_copied_files_count: not_copied.len() as u64,
            not_copied_files_details: not_copied,
        };
        tracing::info!(
            "Comparison done: {} missing, {} different, {} identical",
            missing,
            different,
            found_in_both
        );

        StepOutcome::Completed(Artifact::Comparison(report))
    }
}
