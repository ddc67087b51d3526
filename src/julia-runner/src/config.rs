//! Runner configuration.
//!
//! Loaded from a TOML file (`--config`, then
//! `<config dir>/julia-runner/config.toml`), falling back to defaults.
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Default per-execution deadline, matching the usual exec timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default number of interpreter processes allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Interpreter executable, resolved through `PATH` when not absolute.
    #[serde(default = "default_julia_path")]
    pub julia_path: String,
    /// Flag that makes the interpreter evaluate its next argument.
    #[serde(default = "default_eval_flag")]
    pub eval_flag: String,
    /// Working directory and `Pkg.activate` target. Defaults to the
    /// directory containing the running executable.
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    /// Per-execution deadline in seconds. `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum concurrently running interpreter processes.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Reject package and function names that are not plain identifiers.
    #[serde(default = "default_true")]
    pub validate_names: bool,
    /// Log filter directive, e.g. `info` or `julia_runner=debug`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_julia_path() -> String {
    "julia".to_string()
}

fn default_eval_flag() -> String {
    "-e".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            julia_path: default_julia_path(),
            eval_flag: default_eval_flag(),
            project_dir: None,
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            validate_names: true,
            log_level: default_log_level(),
        }
    }
}

impl RunnerConfig {
    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("julia-runner").join("config.toml"))
    }

    /// Load from `path` if given, else from [`Self::default_path`] when that
    /// file exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.julia_path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "julia_path",
                message: "must not be empty".to_string(),
            });
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent",
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(dir) = &self.project_dir
            && !dir.is_dir()
        {
            return Err(ConfigError::Invalid {
                field: "project_dir",
                message: format!("{} is not a directory", dir.display()),
            });
        }
        Ok(())
    }

    /// Deadline for a single execution, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// The configured project directory, or the executable's directory.
    ///
    /// Always absolute: the same path is both the child's working directory
    /// and the `Pkg.activate` target, so a relative one would be resolved
    /// twice.
    pub fn resolved_project_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.project_dir {
            return std::path::absolute(dir).map_err(ConfigError::ProjectDir);
        }

        let exe = std::env::current_exe().map_err(ConfigError::ProjectDir)?;
        exe.parent().map(Path::to_path_buf).ok_or_else(|| {
            ConfigError::ProjectDir(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} has no parent directory", exe.display()),
            ))
        })
    }
}
