// Plain-text views of comparison and copy reports

use crate::models::{ComparisonReport, CopyEntry, CopyReport, NotCopiedEntry};
use std::fmt::Write;
use time::OffsetDateTime;
use time::macros::format_description;

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[day]/[month]/[year] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| at.to_string())
}

fn format_mtime(mtime: Option<f64>) -> String {
    mtime
        .and_then(|secs| OffsetDateTime::from_unix_timestamp_nanos((secs * 1e9) as i128).ok())
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string())
}

fn format_size(size: Option<u64>) -> String {
    size.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
}

fn not_copied_line(out: &mut String, entry: &NotCopiedEntry) {
    let _ = writeln!(
        out,
        "  {} [{}] size {} -> {}, modified {} -> {}",
        entry.relative_path,
        entry.status.describe(),
        format_size(entry.size_origem),
        format_size(entry.size_destino),
        format_mtime(entry.mtime_origem),
        format_mtime(entry.mtime_destino),
    );
}

fn copy_line(out: &mut String, entry: &CopyEntry) {
    let _ = write!(
        out,
        "  {} -> {} [{}] at {}",
        entry.source_path,
        entry.destination_path,
        entry.status,
        format_timestamp(entry.timestamp)
    );
    if let Some(error) = &entry.error_message {
        let _ = write!(out, ": {}", error);
    }
    out.push('\n');
}

pub fn comparison(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Comparison report {}", report.filename());
    let _ = writeln!(out, "Generated:  {}", format_timestamp(report.timestamp));
    let _ = writeln!(
        out,
        "Origem:     {} ({}, {} files)",
        report.dir_origem, report.json_origem_filename, report.total_files_origem
    );
    let _ = writeln!(
        out,
        "Destino:    {} ({}, {} files)",
        report.dir_destino, report.json_destino_filename, report.total_files_destino
    );
    let _ = writeln!(out, "Identical:  {}", report.files_found_in_both);
    let _ = writeln!(out, "Missing:    {}", report.files_missing_in_destino);
    let _ = writeln!(out, "Different:  {}", report.files_different);
    let _ = writeln!(out);

    if report.not_copied_files_details.is_empty() {
        out.push_str("Destination is up to date.\n");
    } else {
        let _ = writeln!(out, "Not copied ({}):", report.not_copied_files_count);
        for entry in &report.not_copied_files_details {
            not_copied_line(&mut out, entry);
        }
    }
    out
}

pub fn copy_report(report: &CopyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Copy report {}", report.filename());
    let _ = writeln!(out, "Generated:   {}", format_timestamp(report.timestamp));
    let _ = writeln!(out, "Comparison:  {}", report.comparison_json_used);
    let _ = writeln!(out, "Source:      {}", report.source_base_directory);
    let _ = writeln!(out, "Destination: {}", report.destination_base_directory);
    let _ = writeln!(
        out,
        "Attempted {}, copied {}, failed {}",
        report.total_files_attempted, report.files_copied_successfully, report.files_failed_to_copy
    );

    if !report.failed_copies.is_empty() {
        let _ = writeln!(out, "\nFailed:");
        for entry in &report.failed_copies {
            copy_line(&mut out, entry);
        }
    }
    if !report.successful_copies.is_empty() {
        let _ = writeln!(out, "\nCopied:");
        for entry in &report.successful_copies {
            copy_line(&mut out, entry);
        }
    }
    out
}
