/// Status report for the `status` subcommand: a one-line summary for people,
/// JSON for scripts.
use crate::supervisor::Status;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Record states as written in the JSON report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    NoRecord,
    Running,
    Stale,
}

/// The JSON payload printed by `status --json`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub pid_file: String,
    pub state: RecordState,
    pub pid: Option<u32>,
    pub probe: &'static str,
    pub checked_at: DateTime<Utc>,
}

impl StatusReport {
    pub fn new(pid_file: &Path, status: Status, probe: &'static str) -> Self {
        let (state, pid) = match status {
            Status::NoRecord => (RecordState::NoRecord, None),
            Status::Running(pid) => (RecordState::Running, Some(pid)),
            Status::Stale(pid) => (RecordState::Stale, Some(pid)),
        };
        Self {
            pid_file: pid_file.display().to_string(),
            state,
            pid,
            probe,
            checked_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        match (self.state, self.pid) {
            (RecordState::Running, Some(pid)) => {
                format!("running under process {pid} ({})", self.pid_file)
            }
            (RecordState::Stale, Some(pid)) => format!(
                "not running: process {pid} from {} no longer exists",
                self.pid_file
            ),
            _ => format!("not running: no pid file at {}", self.pid_file),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exit status for `status`: 1 when something is running, otherwise 0.
    pub fn exit_code(&self) -> i32 {
        match self.state {
            RecordState::Running => 1,
            RecordState::NoRecord | RecordState::Stale => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_fields() {
        let report = StatusReport::new(Path::new("/run/svc.pid"), Status::Running(321), "signal");
        let parsed: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed["pid_file"], "/run/svc.pid");
        assert_eq!(parsed["state"], "running");
        assert_eq!(parsed["pid"], 321);
        assert_eq!(parsed["probe"], "signal");
        assert!(parsed["checked_at"].is_string());
    }

    #[test]
    fn test_report_no_record_has_null_pid() {
        let report = StatusReport::new(Path::new("svc.pid"), Status::NoRecord, "signal");
        let parsed: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed["state"], "no_record");
        assert!(parsed["pid"].is_null());
    }

    #[test]
    fn test_all_record_states_serialize() {
        for (state, expected) in [
            (RecordState::NoRecord, "\"no_record\""),
            (RecordState::Running, "\"running\""),
            (RecordState::Stale, "\"stale\""),
        ] {
            assert_eq!(serde_json::to_string(&state).unwrap(), expected);
        }
    }

    #[test]
    fn test_summaries() {
        let path = Path::new("svc.pid");
        assert_eq!(
            StatusReport::new(path, Status::Running(9), "signal").summary(),
            "running under process 9 (svc.pid)"
        );
        assert_eq!(
            StatusReport::new(path, Status::Stale(9), "signal").summary(),
            "not running: process 9 from svc.pid no longer exists"
        );
        assert_eq!(
            StatusReport::new(path, Status::NoRecord, "signal").summary(),
            "not running: no pid file at svc.pid"
        );
    }

    #[test]
    fn test_exit_codes() {
        let path = Path::new("svc.pid");
        assert_eq!(StatusReport::new(path, Status::Running(9), "x").exit_code(), 1);
        assert_eq!(StatusReport::new(path, Status::Stale(9), "x").exit_code(), 0);
        assert_eq!(StatusReport::new(path, Status::NoRecord, "x").exit_code(), 0);
    }
}
