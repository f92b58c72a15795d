//! Artifact persistence.
//!
//! The orchestrator only talks to the [`ArtifactStore`] trait. [`FsArtifactStore`] is the
//! filesystem implementation: collection snapshots go to `info_dir`, comparison and copy
//! reports (plus their CSV side-files) go to `results_dir`, all as pretty JSON.

mod csv;

use crate::models::{
    Artifact, ArtifactRecord, CollectionSnapshot, ComparisonReport, CopyReport,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use thiserror::Error;

pub const COLLECTION_PREFIX: &str = "collected_info_";
pub const COMPARISON_PREFIX: &str = "comparison_result_";
pub const COMPARISON_CSV_PREFIX: &str = "not_copied_comparison_";
pub const COPY_REPORT_PREFIX: &str = "copy_report_";
pub const COPY_CSV_PREFIX: &str = "copy_failed_";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact {0} not found")]
    NotFound(String),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed artifact {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Files written for one artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistedArtifact {
    pub filename: String,
    pub csv_filename: Option<String>,
}

/// Persistence boundary used by the orchestrator and the executors.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactStore: Send + Sync {
    /// Write the document (and its CSV side-file, if it has one).
    fn persist(&self, artifact: &Artifact) -> Result<PersistedArtifact, StoreError>;

    fn load_collection(&self, filename: &str) -> Result<CollectionSnapshot, StoreError>;

    fn load_comparison(&self, filename: &str) -> Result<ComparisonReport, StoreError>;

    fn load_copy_report(&self, filename: &str) -> Result<CopyReport, StoreError>;

    /// Raw bytes of any artifact file, JSON or CSV.
    fn read_raw(&self, filename: &str) -> Result<Vec<u8>, StoreError>;

    /// Records of every readable artifact on disk. Unreadable files are skipped.
    fn discover(&self) -> Vec<ArtifactRecord>;
}

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    info_dir: Utf8PathBuf,
    results_dir: Utf8PathBuf,
}

impl FsArtifactStore {
    /// Create the store, creating both directories if needed.
    pub fn new<P: AsRef<Utf8Path>, Q: AsRef<Utf8Path>>(
        info_dir: P,
        results_dir: Q,
    ) -> Result<Self, StoreError> {
        let info_dir = info_dir.as_ref().to_path_buf();
        let results_dir = results_dir.as_ref().to_path_buf();

        for dir in [&info_dir, &results_dir] {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            info_dir,
            results_dir,
        })
    }

    pub fn info_dir(&self) -> &Utf8Path {
        &self.info_dir
    }

    pub fn results_dir(&self) -> &Utf8Path {
        &self.results_dir
    }

    /// Map a filename to its location, refusing anything that is not a plain artifact name.
    pub fn resolve(&self, filename: &str) -> Result<Utf8PathBuf, StoreError> {
        if !is_safe_name(filename) {
            return Err(StoreError::InvalidName(filename.to_string()));
        }
        if filename.starts_with(COLLECTION_PREFIX) {
            return Ok(self.info_dir.join(filename));
        }
        let in_results = [
            COMPARISON_PREFIX,
            COMPARISON_CSV_PREFIX,
            COPY_REPORT_PREFIX,
            COPY_CSV_PREFIX,
        ]
        .iter()
        .any(|prefix| filename.starts_with(prefix));
        if in_results {
            Ok(self.results_dir.join(filename))
        } else {
            Err(StoreError::InvalidName(filename.to_string()))
        }
    }

    fn write_json<T: Serialize>(&self, path: &Utf8Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_file(path, &json)
    }

    fn load_json<T: DeserializeOwned>(&self, filename: &str) -> Result<T, StoreError> {
        let path = self.resolve(filename)?;
        let bytes = read_file(&path, filename)?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json { path, source })
    }

    fn discover_in(&self, dir: &Utf8Path, prefix: &str, records: &mut Vec<ArtifactRecord>) {
        let entries = match dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot list artifact directory {}: {}", dir, e);
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.starts_with(prefix) || !name.ends_with(".json") {
                continue;
            }
            let record = match prefix {
                COLLECTION_PREFIX => self
                    .load_collection(name)
                    .map(|doc| ArtifactRecord::Collection(doc.record())),
                COMPARISON_PREFIX => self
                    .load_comparison(name)
                    .map(|doc| ArtifactRecord::Comparison(doc.record())),
                _ => self
                    .load_copy_report(name)
                    .map(|doc| ArtifactRecord::CopyReport(doc.record())),
            };
            match record {
                Ok(record) if record.filename() == name => records.push(record),
                Ok(_) => tracing::warn!("Skipping artifact {}: name does not match its session", name),
                Err(e) => tracing::warn!("Skipping unreadable artifact {}: {}", name, e),
            }
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn persist(&self, artifact: &Artifact) -> Result<PersistedArtifact, StoreError> {
        let filename = artifact.filename();
        let path = self.resolve(&filename)?;

        match artifact {
            Artifact::Collection(snapshot) => self.write_json(&path, snapshot)?,
            Artifact::Comparison(report) => self.write_json(&path, report)?,
            Artifact::CopyReport(report) => self.write_json(&path, report)?,
        }
        tracing::info!("Saved artifact {}", path);

        let csv_filename = artifact.csv_filename();
        if let Some(csv_name) = &csv_filename {
            let csv_path = self.resolve(csv_name)?;
            let content = match artifact {
                Artifact::Comparison(report) => csv::not_copied(report),
                Artifact::CopyReport(report) => csv::failed_copies(report),
                Artifact::Collection(_) => String::new(),
            };
            // A document without its side-file must not be rediscovered on the next start
            if let Err(e) = write_file(&csv_path, content.as_bytes()) {
                if let Err(remove) = fs::remove_file(&path) {
                    tracing::warn!("Cannot remove incomplete artifact {}: {}", path, remove);
                }
                return Err(e);
            }
            tracing::info!("Saved CSV side-file {}", csv_path);
        }

        Ok(PersistedArtifact {
            filename,
            csv_filename,
        })
    }

    fn load_collection(&self, filename: &str) -> Result<CollectionSnapshot, StoreError> {
        self.load_json(filename)
    }

    fn load_comparison(&self, filename: &str) -> Result<ComparisonReport, StoreError> {
        self.load_json(filename)
    }

    fn load_copy_report(&self, filename: &str) -> Result<CopyReport, StoreError> {
        self.load_json(filename)
    }

    fn read_raw(&self, filename: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(filename)?;
        read_file(&path, filename)
    }

    fn discover(&self) -> Vec<ArtifactRecord> {
        let mut records = Vec::new();
        self.discover_in(&self.info_dir, COLLECTION_PREFIX, &mut records);
        self.discover_in(&self.results_dir, COMPARISON_PREFIX, &mut records);
        self.discover_in(&self.results_dir, COPY_REPORT_PREFIX, &mut records);
        tracing::info!("Discovered {} artifacts on disk", records.len());
        records
    }
}

/// Plain file name: no separators, no parent references, no hidden files.
fn is_safe_name(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains("..")
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn write_file(path: &Utf8Path, bytes: &[u8]) -> Result<(), StoreError> {
    fs::write(path, bytes).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_file(path: &Utf8Path, filename: &str) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(filename.to_string()),
        _ => StoreError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}
