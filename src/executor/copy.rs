use super::collect::unix_seconds;
use super::{StepContext, StepOutcome};
use crate::control::Flow;
use crate::events::LogLevel;
use crate::models::{Artifact, CopyEntry, CopyReport};
use crate::store::ArtifactStore;
use camino::{Utf8Component, Utf8Path};
use std::fs::{self, File};
use std::io;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Copies every not-copied entry of a comparison from origem to destino.
pub struct CopyStep {
    pub comparison: String,
    store: Arc<dyn ArtifactStore>,
}

/// Why a single copy failed.
#[derive(Debug)]
enum CopyFailure {
    SourceMissing,
    PermissionDenied,
    SameFile,
    Unexpected(String),
}

impl CopyFailure {
    fn status(&self) -> &'static str {
        match self {
            CopyFailure::SourceMissing => "failed: source not found",
            CopyFailure::PermissionDenied => "failed: permission denied",
            CopyFailure::SameFile => "failed: same file",
            CopyFailure::Unexpected(_) => "failed: unexpected error",
        }
    }

    fn level(&self) -> LogLevel {
        match self {
            CopyFailure::SourceMissing | CopyFailure::SameFile => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }

    fn message(&self, source: &Utf8Path, destination: &Utf8Path) -> String {
        match self {
            CopyFailure::SourceMissing => format!("Source not found: {}", source),
            CopyFailure::PermissionDenied => {
                format!("Permission denied copying {} to {}", source, destination)
            }
            CopyFailure::SameFile => format!("Source and destination are the same file: {}", source),
            CopyFailure::Unexpected(e) => format!("Unexpected error: {}", e),
        }
    }
}

impl From<io::Error> for CopyFailure {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CopyFailure::SourceMissing,
            io::ErrorKind::PermissionDenied => CopyFailure::PermissionDenied,
            _ => CopyFailure::Unexpected(err.to_string()),
        }
    }
}

impl CopyStep {
    pub fn new(comparison: impl Into<String>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            comparison: comparison.into(),
            store,
        }
    }

    pub fn run(&self, ctx: &StepContext) -> StepOutcome {
        let report = match self.store.load_comparison(&self.comparison) {
            Ok(report) => report,
            Err(e) => {
                return StepOutcome::Failed(format!("Cannot load {}: {}", self.comparison, e));
            }
        };

        let source_base = Utf8Path::new(&report.dir_origem);
        let destination_base = Utf8Path::new(&report.dir_destino);
        for (label, dir) in [("Source", source_base), ("Destination", destination_base)] {
            if !dir.is_dir() {
                return StepOutcome::Failed(format!(
                    "{} directory {} is not accessible",
                    label, dir
                ));
            }
        }

        let total = report.not_copied_files_details.len() as u64;
        ctx.revise_estimate(total);
        ctx.set_message(format!("Copying {} files into {}", total, destination_base));
        ctx.log(format!("Files to copy: {}", total), LogLevel::Info);

        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for entry in &report.not_copied_files_details {
            let relative = &entry.relative_path;
            let source = source_base.join(relative);
            let destination = destination_base.join(relative);

            let result = copy_one(relative, &source, &destination);
            let mut record = CopyEntry {
                relative_path: relative.clone(),
                source_path: source.to_string(),
                destination_path: destination.to_string(),
                status: "copied".to_string(),
                error_message: None,
                timestamp: OffsetDateTime::now_utc(),
            };
            match result {
                Ok(mtime_error) => {
                    if let Some(e) = mtime_error {
                        ctx.log(
                            format!("Copied {} but could not preserve its mtime: {}", relative, e),
                            LogLevel::Warning,
                        );
                    }
                    tracing::debug!("Copied {} to {}", source, destination);
                    successful.push(record);
                }
                Err(failure) => {
                    let message = failure.message(&source, &destination);
                    ctx.log(format!("Copy failed: {}", message), failure.level());
                    record.status = failure.status().to_string();
                    record.error_message = Some(message);
                    failed.push(record);
                }
            }
            ctx.advance(1, relative);

            if ctx.checkpoint() == Flow::Cancel {
                ctx.log(
                    format!("Copy stopped after {} files, no report kept", successful.len() + failed.len()),
                    LogLevel::Warning,
                );
                return StepOutcome::Stopped(None);
            }
        }

        let copy_report = CopyReport {
            session_id: Uuid::new_v4().to_string(),
            timestamp: OffsetDateTime::now_utc(),
            comparison_json_used: self.comparison.clone(),
            source_base_directory: report.dir_origem.clone(),
            destination_base_directory: report.dir_destino.clone(),
            total_files_attempted: (successful.len() + failed.len()) as u64,
            files_copied_successfully: successful.len() as u64,
            files_failed_to_copy: failed.len() as u64,
            successful_copies: successful,
            failed_copies: failed,
        };
        tracing::info!(
            "Copy done: {} copied, {} failed",
            copy_report.files_copied_successfully,
            copy_report.files_failed_to_copy
        );

        StepOutcome::Completed(Artifact::CopyReport(copy_report))
    }
}

/// Copy one file. A failure to carry over the mtime is returned, not raised: the bytes
/// are already in place at that point.
fn copy_one(
    relative: &str,
    source: &Utf8Path,
    destination: &Utf8Path,
) -> Result<Option<io::Error>, CopyFailure> {
    let escapes = Utf8Path::new(relative)
        .components()
        .any(|c| !matches!(c, Utf8Component::Normal(_)));
    if escapes {
        return Err(CopyFailure::Unexpected(format!(
            "refusing path outside the base directory: {}",
            relative
        )));
    }

    let source_meta = fs::metadata(source)?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    if let (Ok(a), Ok(b)) = (fs::canonicalize(source), fs::canonicalize(destination)) {
        if a == b {
            return Err(CopyFailure::SameFile);
        }
    }

    fs::copy(source, destination)?;
    let Ok(modified) = source_meta.modified() else {
        return Ok(None);
    };
    // Setting file times needs write access on Windows
    let preserved = File::options()
        .write(true)
        .open(destination)
        .and_then(|file| file.set_modified(modified));
    match preserved {
        Ok(()) => {
            tracing::trace!("Set mtime of {} to {}", destination, unix_seconds(modified));
            Ok(None)
        }
        Err(e) => {
            tracing::warn!("Cannot set mtime of {}: {}", destination, e);
            Ok(Some(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::harness;
    use crate::models::{ComparisonReport, DifferenceStatus, NotCopiedEntry};
    use crate::store::MockArtifactStore;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn comparison(origem: &Utf8Path, destino: &Utf8Path, paths: &[&str]) -> ComparisonReport {
        ComparisonReport {
            session_id: "c1".to_string(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            json_origem_filename: "collected_info_origem_1.json".to_string(),
            json_destino_filename: "collected_info_destino_2.json".to_string(),
            dir_origem: origem.to_string(),
            dir_destino: destino.to_string(),
            total_files_origem: paths.len() as u64,
            total_files_destino: 0,
            files_found_in_both: 0,
            files_missing_in_destino: paths.len() as u64,
            files_different: 0,
            not_copied_files_count: paths.len() as u64,
            not_copied_files_details: paths
                .iter()
                .map(|p| NotCopiedEntry {
                    relative_path: p.to_string(),
                    status: DifferenceStatus::MissingInDestino,
                    size_origem: Some(1),
                    mtime_origem: Some(1.0),
                    size_destino: None,
                    mtime_destino: None,
                })
                .collect(),
        }
    }

    fn step_for(report: ComparisonReport) -> CopyStep {
        let mut store = MockArtifactStore::new();
        store
            .expect_load_comparison()
            .returning(move |_| Ok(report.clone()));
        CopyStep::new("comparison_result_c1.json", Arc::new(store))
    }

    fn dirs() -> (TempDir, Utf8PathBuf, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let origem = root.join("origem");
        let destino = root.join("destino");
        fs::create_dir_all(&origem).unwrap();
        fs::create_dir_all(&destino).unwrap();
        (temp, origem, destino)
    }

    #[test]
    fn test_copies_and_records_failures() {
        let (_temp, origem, destino) = dirs();
        fs::create_dir_all(origem.join("sub")).unwrap();
        fs::write(origem.join("sub/b.txt"), b"bee").unwrap();

        let step = step_for(comparison(&origem, &destino, &["sub/b.txt", "c.txt"]));
        let h = harness();
        let report = match step.run(&h.ctx) {
            StepOutcome::Completed(Artifact::CopyReport(report)) => report,
            other => panic!("Expected copy report, got: {:?}", other),
        };

        assert_eq!(report.total_files_attempted, 2);
        assert_eq!(report.files_copied_successfully, 1);
        assert_eq!(report.files_failed_to_copy, 1);
        assert_eq!(report.failed_copies[0].status, "failed: source not found");
        assert_eq!(fs::read(destino.join("sub/b.txt")).unwrap(), b"bee");

        let src_mtime = fs::metadata(origem.join("sub/b.txt")).unwrap().modified().unwrap();
        let dst_mtime = fs::metadata(destino.join("sub/b.txt")).unwrap().modified().unwrap();
        assert_eq!(src_mtime, dst_mtime);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_source_still_counts_as_copied() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, origem, destino) = dirs();
        let source = origem.join("locked.txt");
        fs::write(&source, b"locked").unwrap();
        fs::set_permissions(&source, fs::Permissions::from_mode(0o444)).unwrap();

        let step = step_for(comparison(&origem, &destino, &["locked.txt"]));
        let h = harness();
        let report = match step.run(&h.ctx) {
            StepOutcome::Completed(Artifact::CopyReport(report)) => report,
            other => panic!("Expected copy report, got: {:?}", other),
        };

        assert_eq!(report.files_copied_successfully, 1);
        assert_eq!(report.files_failed_to_copy, 0);
        assert_eq!(report.successful_copies[0].status, "copied");
        assert_eq!(fs::read(destino.join("locked.txt")).unwrap(), b"locked");
    }

    #[test]
    fn test_rejects_parent_components() {
        let (_temp, origem, destino) = dirs();

        let step = step_for(comparison(&origem, &destino, &["../escape.txt"]));
        let h = harness();
        match step.run(&h.ctx) {
            StepOutcome::Completed(Artifact::CopyReport(report)) => {
                assert_eq!(report.files_failed_to_copy, 1);
                assert_eq!(report.failed_copies[0].status, "failed: unexpected error");
            }
            other => panic!("Expected copy report, got: {:?}", other),
        }
    }

    #[test]
    fn test_missing_destination_base_fails() {
        let (_temp, origem, destino) = dirs();
        fs::remove_dir(&destino).unwrap();

        let step = step_for(comparison(&origem, &destino, &["a.txt"]));
        let h = harness();
        assert!(matches!(step.run(&h.ctx), StepOutcome::Failed(msg) if msg.contains("Destination")));
    }

    #[test]
    fn test_stop_discards_report() {
        let (_temp, origem, destino) = dirs();
        fs::write(origem.join("a.txt"), b"a").unwrap();

        let step = step_for(comparison(&origem, &destino, &["a.txt", "b.txt"]));
        let h = harness();
        h.control.cancel();
        assert_eq!(step.run(&h.ctx), StepOutcome::Stopped(None));
    }
}
