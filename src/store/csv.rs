// CSV side-files for comparison and copy reports (RFC 4180 quoting)

use crate::models::{ComparisonReport, CopyReport, DifferenceStatus};

pub(super) fn not_copied(report: &ComparisonReport) -> String {
    let mut out = String::from(
        "relative_path,status,size_origem,mtime_origem,size_destino,mtime_destino\n",
    );
    for entry in &report.not_copied_files_details {
        let status = match entry.status {
            DifferenceStatus::MissingInDestino => "missing_in_destino",
            DifferenceStatus::Different => "different",
        };
        push_row(
            &mut out,
            &[
                entry.relative_path.clone(),
                status.to_string(),
                optional(entry.size_origem),
                optional(entry.mtime_origem),
                optional(entry.size_destino),
                optional(entry.mtime_destino),
            ],
        );
    }
    out
}

pub(super) fn failed_copies(report: &CopyReport) -> String {
    let mut out = String::from(
        "relative_path,source_path,destination_path,status,error_message,timestamp\n",
    );
    for entry in &report.failed_copies {
        let timestamp = entry
            .timestamp
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        push_row(
            &mut out,
            &[
                entry.relative_path.clone(),
                entry.source_path.clone(),
                entry.destination_path.clone(),
                entry.status.clone(),
                entry.error_message.clone().unwrap_or_default(),
                timestamp,
            ],
        );
    }
    out
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn push_row(out: &mut String, fields: &[String]) {
    let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
