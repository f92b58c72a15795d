use serde::{Deserialize, Serialize};

/// Runtime settings loaded from `dirsync.yaml` and `DIRSYNC_*` environment variables.
///
/// Every field has a default so a missing file or a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `collected_info_*.json` snapshots.
    pub info_dir: String,

    /// Directory holding comparison and copy reports plus their CSV side-files.
    pub results_dir: String,

    /// Directory for rolling log files.
    pub log_dir: String,

    pub debug_mode: bool,

    /// Per-observer event buffer; the oldest events are dropped when it overflows.
    pub event_buffer: usize,

    /// Minimum gap between two progress-driven status pushes.
    pub status_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            info_dir: "info_data".to_string(),
            results_dir: "results".to_string(),
            log_dir: "logs".to_string(),
            debug_mode: false,
            event_buffer: default_event_buffer(),
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

fn default_event_buffer() -> usize {
    256
}

fn default_status_interval_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings: Settings = serde_yaml_ng::from_str("debug_mode: true\n").unwrap();
        assert!(settings.debug_mode);
        assert_eq!(settings.info_dir, "info_data");
        assert_eq!(settings.event_buffer, 256);
        assert_eq!(settings.status_interval_ms, 100);
    }
}
