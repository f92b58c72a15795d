use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Which side of a later comparison a collection describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Origem,
    Destino,
}

impl CollectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionType::Origem => "origem",
            CollectionType::Destino => "destino",
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "origem" => Ok(CollectionType::Origem),
            "destino" => Ok(CollectionType::Destino),
            other => Err(format!("unknown collection type '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry records
// ---------------------------------------------------------------------------

/// Listing entry for a finished collection snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub filename: String,
    pub collection_type: CollectionType,
    pub directory_path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub inaccessible_count: u64,
}

/// Listing entry for a finished comparison.
///
/// Only holds the directory paths of the two collections, never a handle to them, so
/// deleting a collection does not invalidate the comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub filename: String,
    pub dir_origem: String,
    pub dir_destino: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub not_copied_count: u64,
}

/// Listing entry for a finished copy run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CopyReportRecord {
    pub filename: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub source_base_directory: String,
    pub destination_base_directory: String,
    pub total_files_attempted: u64,
    pub files_copied_successfully: u64,
    pub files_failed_to_copy: u64,
}

// ---------------------------------------------------------------------------
// Artifact documents (what gets written to disk)
// ---------------------------------------------------------------------------

/// Identity fields captured per collected file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: u64,
    /// Seconds since the unix epoch.
    pub mtime: f64,
    /// Never computed; kept so documents stay compatible with readers expecting it.
    pub md5: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InaccessibleEntry {
    pub path: String,
    pub reason: String,
}

/// Full content of a `collected_info_*.json` file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub session_id: String,
    pub collection_type: CollectionType,
    pub base_directory: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub partial: bool,
    pub total_files_scanned: u64,
    pub inaccessible_files_count: u64,
    pub inaccessible_files_details: Vec<InaccessibleEntry>,
    pub files: IndexMap<String, FileMeta>,
}

impl CollectionSnapshot {
    pub fn filename(&self) -> String {
        format!("collected_info_{}_{}.json", self.collection_type, self.session_id)
    }

    pub fn record(&self) -> CollectionRecord {
        CollectionRecord {
            filename: self.filename(),
            collection_type: self.collection_type,
            directory_path: self.base_directory.clone(),
            timestamp: self.timestamp,
            inaccessible_count: self.inaccessible_files_count,
        }
    }
}

/// Why a path ended up in the not-copied list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceStatus {
    MissingInDestino,
    Different,
}

impl DifferenceStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            DifferenceStatus::MissingInDestino => "not found in destination",
            DifferenceStatus::Different => "size or modification time differs",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotCopiedEntry {
    pub relative_path: String,
    pub status: DifferenceStatus,
    pub size_origem: Option<u64>,
    pub mtime_origem: Option<f64>,
    pub size_destino: Option<u64>,
    pub mtime_destino: Option<f64>,
}

/// Full content of a `comparison_result_*.json` file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub json_origem_filename: String,
    pub json_destino_filename: String,
    pub dir_origem: String,
    pub dir_destino: String,
    pub total_files_origem: u64,
    pub total_files_destino: u64,
    pub files_found_in_both: u64,
    pub files_missing_in_destino: u64,
    pub files_different: u64,
    pub not_copied_files_count: u64,
    pub not_copied_files_details: Vec<NotCopiedEntry>,
}

impl ComparisonReport {
    pub fn filename(&self) -> String {
        format!("comparison_result_{}.json", self.session_id)
    }

    /// Name of the CSV side-file listing the not-copied entries.
    pub fn csv_filename(&self) -> String {
        format!("not_copied_comparison_{}.csv", self.session_id)
    }

    pub fn record(&self) -> ComparisonRecord {
        ComparisonRecord {
            filename: self.filename(),
            dir_origem: self.dir_origem.clone(),
            dir_destino: self.dir_destino.clone(),
            timestamp: self.timestamp,
            not_copied_count: self.not_copied_files_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CopyEntry {
    pub relative_path: String,
    pub source_path: String,
    pub destination_path: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Full content of a `copy_report_*.json` file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CopyReport {
    pub session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub comparison_json_used: String,
    pub source_base_directory: String,
    pub destination_base_directory: String,
    pub total_files_attempted: u64,
    pub files_copied_successfully: u64,
    pub files_failed_to_copy: u64,
    pub successful_copies: Vec<CopyEntry>,
    pub failed_copies: Vec<CopyEntry>,
}

impl CopyReport {
    pub fn filename(&self) -> String {
        format!("copy_report_{}.json", self.session_id)
    }

    /// Name of the CSV side-file listing failed copies.
    pub fn csv_filename(&self) -> String {
        format!("copy_failed_{}.csv", self.session_id)
    }

    pub fn record(&self) -> CopyReportRecord {
        CopyReportRecord {
            filename: self.filename(),
            timestamp: self.timestamp,
            source_base_directory: self.source_base_directory.clone(),
            destination_base_directory: self.destination_base_directory.clone(),
            total_files_attempted: self.total_files_attempted,
            files_copied_successfully: self.files_copied_successfully,
            files_failed_to_copy: self.files_failed_to_copy,
        }
    }
}

/// A finished result document, one variant per operation kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Artifact {
    Collection(CollectionSnapshot),
    Comparison(ComparisonReport),
    CopyReport(CopyReport),
}

impl Artifact {
    pub fn filename(&self) -> String {
        match self {
            Artifact::Collection(snapshot) => snapshot.filename(),
            Artifact::Comparison(report) => report.filename(),
            Artifact::CopyReport(report) => report.filename(),
        }
    }

    /// CSV side-file written next to the document, if any.
    pub fn csv_filename(&self) -> Option<String> {
        match self {
            Artifact::Collection(_) => None,
            Artifact::Comparison(report) if !report.not_copied_files_details.is_empty() => {
                Some(report.csv_filename())
            }
            Artifact::CopyReport(report) if !report.failed_copies.is_empty() => {
                Some(report.csv_filename())
            }
            _ => None,
        }
    }

    pub fn record(&self) -> ArtifactRecord {
        match self {
            Artifact::Collection(snapshot) => ArtifactRecord::Collection(snapshot.record()),
            Artifact::Comparison(report) => ArtifactRecord::Comparison(report.record()),
            Artifact::CopyReport(report) => ArtifactRecord::CopyReport(report.record()),
        }
    }
}

/// Registry listing entry of any kind.
#[derive(Clone, Debug, PartialEq)]
pub enum ArtifactRecord {
    Collection(CollectionRecord),
    Comparison(ComparisonRecord),
    CopyReport(CopyReportRecord),
}

impl ArtifactRecord {
    pub fn filename(&self) -> &str {
        match self {
            ArtifactRecord::Collection(r) => &r.filename,
            ArtifactRecord::Comparison(r) => &r.filename,
            ArtifactRecord::CopyReport(r) => &r.filename,
        }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        match self {
            ArtifactRecord::Collection(r) => r.timestamp,
            ArtifactRecord::Comparison(r) => r.timestamp,
            ArtifactRecord::CopyReport(r) => r.timestamp,
        }
    }
}
