use crate::launch::LaunchCommand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from pidwarden.toml.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[derive(Default)]
pub struct SupervisorConfig {
    pub pid: PidConfig,
    pub process: ProcessConfig,
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PidConfig {
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[derive(Default)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[derive(Default)]
pub struct LogsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Values given on the command line. Each `Some` replaces the config value;
/// `extra_args` are appended after the configured arguments.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pid_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub program: Option<String>,
    pub extra_args: Vec<String>,
}

// --- Default implementations ---

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("pidwarden.pid"),
        }
    }
}

impl SupervisorConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(pid_file) = &overrides.pid_file {
            self.pid.file = pid_file.clone();
        }
        if let Some(log_dir) = &overrides.log_dir {
            self.logs.dir = Some(log_dir.clone());
        }
        if let Some(program) = &overrides.program {
            self.process.command = program.clone();
        }
        self.process
            .args
            .extend(overrides.extra_args.iter().cloned());
    }

    /// The start command this configuration describes.
    pub fn launch_command(&self) -> Result<LaunchCommand, ConfigError> {
        let program = self.process.command.trim();
        if program.is_empty() {
            return Err(ConfigError::MissingCommand);
        }
        let mut command = LaunchCommand::new(program).args(self.process.args.iter().cloned());
        command.working_dir = self.process.working_dir.clone();
        command.env = self.process.env.clone();
        if let Some(dir) = &self.logs.dir {
            command = command.log_dir(dir);
        }
        Ok(command)
    }

    /// Render the resolved settings back as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Errors from loading or resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Neither the config nor the command line named a program to run.
    MissingCommand,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            ConfigError::MissingCommand => {
                write!(
                    f,
                    "no command to launch: set [process] command or pass --program"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingCommand => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.pid.file, PathBuf::from("pidwarden.pid"));
        assert!(config.process.command.is_empty());
        assert!(config.process.args.is_empty());
        assert_eq!(config.logs.dir, None);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = SupervisorConfig::load(&dir.path().join("pidwarden.toml")).unwrap();
        assert_eq!(config, SupervisorConfig::default());
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pidwarden.toml");
        std::fs::write(
            &path,
            r#"
[pid]
file = "/var/run/atlas.pid"

[process]
command = "java"
args = ["-Xmx1024m", "-Djava.net.preferIPv4Stack=true", "org.apache.atlas.Atlas"]
working_dir = "/opt/atlas"

[process.env]
ATLAS_HOME = "/opt/atlas"

[logs]
dir = "/opt/atlas/logs"
"#,
        )
        .unwrap();

        let config = SupervisorConfig::load(&path).unwrap();
        assert_eq!(config.pid.file, PathBuf::from("/var/run/atlas.pid"));
        assert_eq!(config.process.command, "java");
        assert_eq!(config.process.args.len(), 3);
        assert_eq!(config.process.working_dir, Some(PathBuf::from("/opt/atlas")));
        assert_eq!(config.process.env["ATLAS_HOME"], "/opt/atlas");
        assert_eq!(config.logs.dir, Some(PathBuf::from("/opt/atlas/logs")));
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pidwarden.toml");
        std::fs::write(&path, "[process]\ncommand = \"sleep\"\n").unwrap();

        let config = SupervisorConfig::load(&path).unwrap();
        assert_eq!(config.process.command, "sleep");
        assert_eq!(config.pid.file, PathBuf::from("pidwarden.pid"));
        assert_eq!(config.logs.dir, None);
    }

    #[test]
    fn test_load_invalid_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pidwarden.toml");
        std::fs::write(&path, "[process\ncommand = ").unwrap();

        let err = SupervisorConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn test_load_wrong_type_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pidwarden.toml");
        std::fs::write(&path, "[process]\nargs = \"not-a-list\"\n").unwrap();

        assert!(matches!(
            SupervisorConfig::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_overrides_replace_and_append() {
        let mut config = SupervisorConfig::default();
        config.process.command = "java".to_string();
        config.process.args = vec!["-app".to_string(), "webapp".to_string()];

        config.apply_overrides(&Overrides {
            pid_file: Some(PathBuf::from("run/svc.pid")),
            log_dir: Some(PathBuf::from("logs")),
            program: None,
            extra_args: vec!["--port".to_string(), "21000".to_string()],
        });

        assert_eq!(config.pid.file, PathBuf::from("run/svc.pid"));
        assert_eq!(config.logs.dir, Some(PathBuf::from("logs")));
        assert_eq!(config.process.command, "java");
        assert_eq!(config.process.args, vec!["-app", "webapp", "--port", "21000"]);
    }

    #[test]
    fn test_program_override_replaces_command() {
        let mut config = SupervisorConfig::default();
        config.process.command = "java".to_string();
        config.apply_overrides(&Overrides {
            program: Some("sleep".to_string()),
            ..Default::default()
        });
        assert_eq!(config.process.command, "sleep");
    }

    #[test]
    fn test_launch_command_requires_program() {
        let config = SupervisorConfig::default();
        assert!(matches!(
            config.launch_command().unwrap_err(),
            ConfigError::MissingCommand
        ));

        let mut blank = SupervisorConfig::default();
        blank.process.command = "   ".to_string();
        assert!(blank.launch_command().is_err());
    }

    #[test]
    fn test_launch_command_carries_everything() {
        let mut config = SupervisorConfig::default();
        config.process.command = "java".to_string();
        config.process.args = vec!["-version".to_string()];
        config.process.working_dir = Some(PathBuf::from("/opt/svc"));
        config
            .process
            .env
            .insert("JAVA_HOME".to_string(), "/usr/lib/jvm".to_string());
        config.logs.dir = Some(PathBuf::from("logs"));

        let cmd = config.launch_command().unwrap();
        assert_eq!(cmd.program, "java");
        assert_eq!(cmd.args, vec!["-version"]);
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/opt/svc")));
        assert_eq!(cmd.env["JAVA_HOME"], "/usr/lib/jvm");
        assert_eq!(cmd.log_dir, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_to_toml_reloads_to_same_config() {
        let mut config = SupervisorConfig::default();
        config.process.command = "java".to_string();
        config.process.args = vec!["-Xmx512m".to_string()];
        config.logs.dir = Some(PathBuf::from("logs"));

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[process]"));
        let reloaded: SupervisorConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reloaded, config);
    }
}
