//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::RunnerConfig;

/// Log verbosity accepted on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors
    Warn,
    /// Show informational messages, warnings, and errors (default)
    #[default]
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// MCP server that runs Julia code, manages packages and looks up
/// documentation over stdio.
#[derive(Debug, Parser)]
#[command(name = "julia-runner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(long, env = "JULIA_RUNNER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Julia project to activate and run in
    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Julia executable
    #[arg(long = "julia", value_name = "PATH")]
    pub julia_path: Option<String>,

    /// Per-call deadline in seconds (0 disables)
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Maximum Julia processes running at once
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_concurrent: Option<u64>,

    /// Accept any package or function name instead of plain identifiers
    #[arg(long)]
    pub allow_any_names: bool,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Verbose output (debug logging)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the tool catalog as JSON and exit
    Tools,
}

impl Cli {
    /// Overlay command-line flags on a loaded configuration.
    pub fn apply(&self, config: &mut RunnerConfig) {
        if let Some(dir) = &self.project_dir {
            config.project_dir = Some(dir.clone());
        }
        if let Some(path) = &self.julia_path {
            config.julia_path = path.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = usize::try_from(max).unwrap_or(usize::MAX);
        }
        if self.allow_any_names {
            config.validate_names = false;
        }
        if self.verbose {
            config.log_level = LogLevel::Debug.as_filter_str().to_string();
        } else if let Some(level) = self.log_level {
            config.log_level = level.as_filter_str().to_string();
        }
    }
}
