/// PID record persistence: the PID file holds one decimal process identifier.
///
/// Writes go through a temp file in the same directory followed by a rename,
/// so a reader never observes a half-written identifier.
use std::io::Write;
use std::path::{Path, PathBuf};

/// Largest identifier accepted. Anything above cannot be a POSIX pid and
/// `kill(2)` would read it as a negative process-group target.
const MAX_PID: u32 = i32::MAX as u32;

/// Mode of a written PID file: owner read/write, readable by everyone.
#[cfg(unix)]
const PID_FILE_MODE: u32 = 0o644;

/// Longest slice of bad content echoed back in error messages.
const CONTENT_PREVIEW_LEN: usize = 32;

/// A PID file on disk together with the identifier it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidRecord {
    path: PathBuf,
    pid: u32,
}

impl PidRecord {
    pub fn new(path: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            path: path.into(),
            pid,
        }
    }

    /// Location of the PID file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded process identifier.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Read the record at `path`.
    ///
    /// Returns `Ok(None)` when no file exists. Content that is not a single
    /// positive integer (surrounding whitespace aside) is `RecordError::Corrupt`.
    pub fn read(path: &Path) -> Result<Option<PidRecord>, RecordError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RecordError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let content = String::from_utf8_lossy(&bytes);
        match parse_pid(&content) {
            Some(pid) => Ok(Some(PidRecord::new(path, pid))),
            None => Err(RecordError::Corrupt {
                path: path.to_path_buf(),
                content: preview(&content),
            }),
        }
    }

    /// Replace whatever is at `path` with a record for `pid`.
    pub fn write(path: &Path, pid: u32) -> Result<PidRecord, RecordError> {
        let write_err = |source: std::io::Error| RecordError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".pidwarden.tmp.")
            .tempfile_in(dir)
            .map_err(write_err)?;
        tmp.write_all(pid.to_string().as_bytes())
            .map_err(write_err)?;
        // Temp files start out 0600; other accounts must be able to run `status`.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(PID_FILE_MODE))
                .map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        tracing::debug!(pid, path = %path.display(), "pid record written");
        Ok(PidRecord::new(path, pid))
    }
}

/// Parse PID file content. Only plain decimal digits in `1..=i32::MAX` qualify.
pub fn parse_pid(content: &str) -> Option<u32> {
    let trimmed = content.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let pid: u32 = trimmed.parse().ok()?;
    (1..=MAX_PID).contains(&pid).then_some(pid)
}

fn preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= CONTENT_PREVIEW_LEN {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(CONTENT_PREVIEW_LEN).collect();
    cut.push_str("...");
    cut
}

/// Errors from reading or writing a PID record.
#[derive(Debug)]
pub enum RecordError {
    /// The file exists but could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file exists but does not hold a valid identifier.
    Corrupt { path: PathBuf, content: String },
    /// The record could not be written.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::Read { path, source } => {
                write!(f, "failed to read pid file {}: {source}", path.display())
            }
            RecordError::Corrupt { path, content } => {
                write!(
                    f,
                    "pid file {} does not contain a valid process id (found {content:?})",
                    path.display()
                )
            }
            RecordError::Write { path, source } => {
                write!(f, "failed to write pid file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Read { source, .. } => Some(source),
            RecordError::Corrupt { .. } => None,
            RecordError::Write { source, .. } => Some(source),
        }
    }
}
