/// Subordinate process creation: build the command, route its output to the
/// log directory, spawn it detached from the launcher's terminal.
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Timestamp used to name per-launch output files.
const LOG_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// An opaque start command supplied by whoever assembled the service's
/// options and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// Where stdout/stderr files go. `None` discards output.
    pub log_dir: Option<PathBuf>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            log_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Program and arguments joined for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the process. The pid comes from the returned `Child`, taken at
    /// creation time.
    ///
    /// On POSIX the child gets its own process group so a Ctrl-C aimed at the
    /// launcher does not reach it.
    pub fn spawn(&self) -> Result<Child, LaunchError> {
        let mut log_paths = Vec::new();
        let (stdout, stderr) = match &self.log_dir {
            Some(dir) => {
                let (out_path, err_path) = prepare_log_files(dir, Local::now())?;
                tracing::info!(
                    stdout = %out_path.display(),
                    stderr = %err_path.display(),
                    "redirecting process output"
                );
                let stdout = open_log(&out_path)?;
                log_paths.push(out_path);
                let stderr = match open_log(&err_path) {
                    Ok(file) => file,
                    Err(e) => {
                        remove_empty_logs(&log_paths);
                        return Err(e);
                    }
                };
                log_paths.push(err_path);
                (Stdio::from(stdout), Stdio::from(stderr))
            }
            None => (Stdio::null(), Stdio::null()),
        };

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        tracing::info!(
            command = %self.program,
            args = ?self.args,
            "spawning subordinate process"
        );
        command.spawn().map_err(|e| {
            remove_empty_logs(&log_paths);
            LaunchError::Spawn {
                program: self.program.clone(),
                source: e,
            }
        })
    }
}

/// Delete output files a failed launch created but never wrote to.
/// Files holding output from an earlier launch in the same second stay.
fn remove_empty_logs(paths: &[PathBuf]) {
    for path in paths {
        let empty = std::fs::metadata(path).is_ok_and(|m| m.len() == 0);
        if empty {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove unused log file");
            }
        }
    }
}

/// Ensure `dir` exists and return the stdout/stderr paths for a launch at `now`.
pub fn prepare_log_files(
    dir: &Path,
    now: DateTime<Local>,
) -> Result<(PathBuf, PathBuf), LaunchError> {
    std::fs::create_dir_all(dir).map_err(|e| LaunchError::LogDir {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let stamp = now.format(LOG_STAMP_FORMAT).to_string();
    Ok((
        dir.join(format!("{stamp}.out")),
        dir.join(format!("{stamp}.err")),
    ))
}

fn open_log(path: &Path) -> Result<File, LaunchError> {
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LaunchError::LogFile {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Errors that prevent the subordinate process from being created.
#[derive(Debug)]
pub enum LaunchError {
    /// The log directory could not be created.
    LogDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// An output file could not be opened.
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The process itself could not be started.
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::LogDir { path, source } => {
                write!(
                    f,
                    "failed to create log directory {}: {source}",
                    path.display()
                )
            }
            LaunchError::LogFile { path, source } => {
                write!(f, "failed to open log file {}: {source}", path.display())
            }
            LaunchError::Spawn { program, source } => {
                write!(f, "failed to spawn {program}: {source}")
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::LogDir { source, .. } => Some(source),
            LaunchError::LogFile { source, .. } => Some(source),
            LaunchError::Spawn { source, .. } => Some(source),
        }
    }
}
