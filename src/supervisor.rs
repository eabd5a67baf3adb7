/// Single-instance supervision through a PID file.
///
/// A start attempt walks one path through:
///
/// ```text
/// CheckingRecord -> NoRecord | Stale -> Launching -> Recorded
/// CheckingRecord -> Running -> Refused
/// CheckingRecord -> CorruptRecord
/// Launching      -> LaunchFailed | PersistFailed
/// ```
///
/// Two supervisors racing on the same PID file can both pass the check.
/// No lock guards against that; operators start the service interactively.
use crate::config::SupervisorConfig;
use crate::launch::{LaunchCommand, LaunchError};
use crate::liveness::{platform_probe, Liveness, LivenessProbe};
use crate::pid_record::{PidRecord, RecordError};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// What an existing PID file says about the tracked process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No PID file: safe to start.
    NoRecord,
    /// The recorded process is alive, or liveness could not be determined.
    Running(u32),
    /// The recorded process is gone: safe to reclaim the file and start.
    Stale(u32),
}

pub struct Supervisor {
    pid_file: PathBuf,
    probe: Box<dyn LivenessProbe>,
}

impl Supervisor {
    pub fn new(pid_file: impl Into<PathBuf>, probe: Box<dyn LivenessProbe>) -> Self {
        Self {
            pid_file: pid_file.into(),
            probe,
        }
    }

    /// Build from resolved configuration with the platform's liveness probe.
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.pid.file.clone(), platform_probe())
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    pub fn probe_name(&self) -> &'static str {
        self.probe.name()
    }

    /// Inspect the configured PID file.
    pub fn status(&self) -> Result<Status, SupervisorError> {
        self.check_existing(&self.pid_file)
    }

    /// Check, then launch `command` if nothing live is recorded.
    pub fn start(&self, command: &LaunchCommand) -> Result<PidRecord, SupervisorError> {
        match self.check_existing(&self.pid_file)? {
            Status::Running(pid) => {
                warn!(pid, path = %self.pid_file.display(), "already running, refusing to start");
                Err(SupervisorError::Refused {
                    pid,
                    path: self.pid_file.clone(),
                })
            }
            Status::Stale(pid) => {
                info!(pid, path = %self.pid_file.display(), "recorded process is gone, reclaiming pid file");
                self.launch(command, &self.pid_file)
            }
            Status::NoRecord => self.launch(command, &self.pid_file),
        }
    }

    /// Read the PID file at `pid_file` and classify it. Never writes.
    pub fn check_existing(&self, pid_file: &Path) -> Result<Status, SupervisorError> {
        let record = match PidRecord::read(pid_file) {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(path = %pid_file.display(), "no pid file");
                return Ok(Status::NoRecord);
            }
            Err(RecordError::Corrupt { path, content }) => {
                return Err(SupervisorError::CorruptRecord { path, content })
            }
            Err(e) => return Err(SupervisorError::Unreadable { source: e }),
        };

        let pid = record.pid();
        let status = match self.probe.probe(pid) {
            Liveness::Alive => Status::Running(pid),
            Liveness::Dead => Status::Stale(pid),
            Liveness::Unknown => {
                warn!(
                    pid,
                    probe = self.probe.name(),
                    "cannot determine whether recorded process is alive, assuming it is"
                );
                Status::Running(pid)
            }
        };
        info!(pid, ?status, path = %pid_file.display(), "checked pid file");
        Ok(status)
    }

    /// Spawn `command` and record its pid in `pid_file`, replacing prior content.
    ///
    /// Callers must have seen `NoRecord` or `Stale` from `check_existing`.
    pub fn launch(
        &self,
        command: &LaunchCommand,
        pid_file: &Path,
    ) -> Result<PidRecord, SupervisorError> {
        let child = command
            .spawn()
            .map_err(|e| SupervisorError::LaunchFailed { source: e })?;
        let pid = child.id();
        // Dropping a std Child neither waits on nor kills the process.
        drop(child);
        info!(pid, command = %command.program, "subordinate process started");

        match PidRecord::write(pid_file, pid) {
            Ok(record) => {
                info!(pid, path = %pid_file.display(), "pid recorded");
                Ok(record)
            }
            Err(e) => {
                error!(
                    pid,
                    error = %e,
                    "process is running but its pid could not be recorded"
                );
                Err(SupervisorError::PersistFailed { pid, source: e })
            }
        }
    }
}

/// Terminal failures of a supervisor invocation. None are retried.
#[derive(Debug)]
pub enum SupervisorError {
    /// A live (or possibly live) process is already recorded.
    Refused { pid: u32, path: PathBuf },
    /// The PID file exists but holds no valid identifier.
    CorruptRecord { path: PathBuf, content: String },
    /// The PID file exists but could not be read.
    Unreadable { source: RecordError },
    /// The subordinate process could not be created.
    LaunchFailed { source: LaunchError },
    /// The process is running but untracked. Needs manual cleanup.
    PersistFailed { pid: u32, source: RecordError },
}

impl SupervisorError {
    /// Process exit status the CLI reports for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::Refused { .. } => 1,
            SupervisorError::CorruptRecord { .. } => 2,
            SupervisorError::LaunchFailed { .. } => 3,
            SupervisorError::PersistFailed { .. } => 4,
            SupervisorError::Unreadable { .. } => 6,
        }
    }
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorError::Refused { pid, path } => {
                write!(
                    f,
                    "already running under process {pid} (pid file {})",
                    path.display()
                )
            }
            SupervisorError::CorruptRecord { path, content } => {
                write!(
                    f,
                    "pid file {} is corrupt (found {content:?}); remove it and retry",
                    path.display()
                )
            }
            SupervisorError::Unreadable { source } => write!(f, "{source}"),
            SupervisorError::LaunchFailed { source } => {
                write!(f, "launch failed: {source}")
            }
            SupervisorError::PersistFailed { pid, source } => {
                write!(
                    f,
                    "process {pid} is RUNNING BUT UNTRACKED: {source}; \
                     stop process {pid} manually or record it before starting again"
                )
            }
        }
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupervisorError::Refused { .. } => None,
            SupervisorError::CorruptRecord { .. } => None,
            SupervisorError::Unreadable { source } => Some(source),
            SupervisorError::LaunchFailed { source } => Some(source),
            SupervisorError::PersistFailed { source, .. } => Some(source),
        }
    }
}
