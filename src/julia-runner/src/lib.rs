//! Julia runner: an MCP tool server that executes Julia code.
//!
//! Four tools are exposed: `execute_julia`, `add_julia_package`,
//! `get_installed_julia_packages` and `get_julia_documentation`. Each call
//! runs one `julia -e` process in the configured project directory and
//! returns its output.
//!
//! The pieces:
//! - [`ToolRegistry`] - static tool catalog
//! - [`RequestDispatcher`] - validation, program construction, result mapping
//! - [`ProcessExecutor`] - bounded, cancellable interpreter processes
//! - [`RunnerConfig`] - TOML configuration

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod registry;
pub mod source;

pub use config::RunnerConfig;
pub use dispatcher::{PreparedCall, RequestDispatcher};
pub use error::{ConfigError, DispatchError};
pub use executor::{CodeRunner, ExecutionFailure, ExecutionOutcome, FailureKind, ProcessExecutor};
pub use registry::{JuliaTool, ToolRegistry};

/// Name reported to MCP clients.
pub const SERVER_NAME: &str = "julia-runner";

/// Server version reported to MCP clients.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Instructions returned from `initialize`.
pub const INSTRUCTIONS: &str = "Runs Julia code in a fixed project environment. \
Each tool call starts a fresh Julia process, so no state is kept between calls.";
