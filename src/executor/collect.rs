use super::{StepContext, StepOutcome, portable_path};
use crate::control::Flow;
use crate::events::LogLevel;
use crate::models::{Artifact, CollectionSnapshot, CollectionType, FileMeta, InaccessibleEntry};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use uuid::Uuid;
use walkdir::WalkDir;

/// Walks a directory tree and records size and mtime of every file in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectStep {
    pub directory: Utf8PathBuf,
    pub collection_type: CollectionType,
}

/// Accumulated scan results.
#[derive(Default)]
struct Scan {
    files: IndexMap<String, FileMeta>,
    inaccessible: Vec<InaccessibleEntry>,
    processed: u64,
}

impl Scan {
    fn inaccessible(&mut self, ctx: &StepContext, path: String, reason: String, level: LogLevel) {
        ctx.log(format!("Inaccessible entry {}: {}", path, reason), level);
        self.inaccessible.push(InaccessibleEntry { path, reason });
    }
}

impl CollectStep {
    pub fn new(directory: impl Into<Utf8PathBuf>, collection_type: CollectionType) -> Self {
        Self {
            directory: directory.into(),
            collection_type,
        }
    }

    pub fn run(&self, ctx: &StepContext) -> StepOutcome {
        let root = &self.directory;
        let mut discovered = match count_direct_files(root.as_std_path()) {
            Ok(count) => count,
            Err(e) => return StepOutcome::Failed(format!("Cannot read directory {}: {}", root, e)),
        };
        ctx.revise_estimate(discovered);
        ctx.set_message(format!("Collecting {} ({})", root, self.collection_type));
        ctx.log(
            format!("Starting {} collection of {}", self.collection_type, root),
            LogLevel::Info,
        );

        let mut scan = Scan::default();
        let mut stopped = false;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1);

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    // Unreadable directories surface as a walker error right after this
                    if let Ok(count) = count_direct_files(entry.path()) {
                        discovered += count;
                        ctx.revise_estimate(discovered);
                    }
                }
                Ok(entry) => match relative_utf8(root, entry.path()) {
                    Some(relative) => match probe(entry.path()) {
                        Ok(Some(meta)) => {
                            scan.processed += 1;
                            ctx.advance(1, &relative);
                            scan.files.insert(relative, meta);
                        }
                        // Symlink resolving to a directory; the walker does not descend into it
                        Ok(None) => {}
                        Err(e) => {
                            scan.processed += 1;
                            ctx.advance(1, &relative);
                            let (reason, level) = describe_io_error(&e);
                            scan.inaccessible(ctx, relative, reason, level);
                        }
                    },
                    None => {
                        let shown = entry.path().to_string_lossy().into_owned();
                        scan.processed += 1;
                        ctx.advance(1, &shown);
                        scan.inaccessible(
                            ctx,
                            shown,
                            "file name is not valid UTF-8".to_string(),
                            LogLevel::Warning,
                        );
                    }
                },
                Err(err) => {
                    let path = err
                        .path()
                        .and_then(|p| relative_utf8(root, p))
                        .unwrap_or_else(|| root.to_string());
                    let (reason, level) = match err.io_error() {
                        Some(io_err) => describe_io_error(io_err),
                        None => (format!("unexpected error: {}", err), LogLevel::Error),
                    };
                    scan.processed += 1;
                    scan.inaccessible(ctx, path.clone(), reason, level);
                    ctx.advance(1, &path);
                }
            }

            if ctx.checkpoint() == Flow::Cancel {
                stopped = true;
                break;
            }
        }

        if stopped {
            ctx.log(
                format!("Collection of {} stopped after {} entries", root, scan.processed),
                LogLevel::Warning,
            );
            if scan.processed == 0 {
                return StepOutcome::Stopped(None);
            }
        }

        let snapshot = self.snapshot(scan, stopped);
        tracing::info!(
            "Collection of {} done: {} files, {} inaccessible, partial={}",
            root,
            snapshot.total_files_scanned,
            snapshot.inaccessible_files_count,
            snapshot.partial
        );

        if stopped {
            StepOutcome::Stopped(Some(Artifact::Collection(snapshot)))
        } else {
            StepOutcome::Completed(Artifact::Collection(snapshot))
        }
    }

    fn snapshot(&self, scan: Scan, partial: bool) -> CollectionSnapshot {
        CollectionSnapshot {
            session_id: Uuid::new_v4().to_string(),
            collection_type: self.collection_type,
            base_directory: self.directory.to_string(),
            timestamp: OffsetDateTime::now_utc(),
            partial,
            total_files_scanned: scan.files.len() as u64,
            inaccessible_files_count: scan.inaccessible.len() as u64,
            inaccessible_files_details: scan.inaccessible,
            files: scan.files,
        }
    }
}

/// Direct non-directory children. A symlink counts unless it resolves to a directory.
fn count_direct_files(dir: &Path) -> io::Result<u64> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let is_dir = match entry.file_type() {
            Ok(ft) if ft.is_symlink() => fs::metadata(entry.path()).is_ok_and(|m| m.is_dir()),
            Ok(ft) => ft.is_dir(),
            Err(_) => false,
        };
        if !is_dir {
            count += 1;
        }
    }
    Ok(count)
}

/// Metadata (following links) plus an open-for-read probe. `None` for directories.
fn probe(path: &Path) -> io::Result<Option<FileMeta>> {
    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        return Ok(None);
    }
    File::open(path)?;
    let mtime = metadata.modified().map(unix_seconds).unwrap_or_default();
    Ok(Some(FileMeta {
        size: metadata.len(),
        mtime,
        md5: None,
    }))
}

fn describe_io_error(err: &io::Error) -> (String, LogLevel) {
    match err.kind() {
        io::ErrorKind::NotFound => ("file not found during scan".to_string(), LogLevel::Warning),
        io::ErrorKind::PermissionDenied => ("permission denied".to_string(), LogLevel::Error),
        _ => (format!("unexpected error: {}", err), LogLevel::Error),
    }
}

fn relative_utf8(root: &Utf8Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root.as_std_path()).ok()?;
    Utf8Path::from_path(relative).map(portable_path)
}

/// Seconds since the unix epoch, negative before it.
pub(crate) fn unix_seconds(at: SystemTime) -> f64 {
    match at.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}
