//! Error types for the Julia runner.

use std::path::PathBuf;

use julia_mcp_types::JsonRpcError;
use thiserror::Error;

/// Protocol-level failure of a tool call, raised before any process runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    InvalidParams(String),
}

impl From<DispatchError> for JsonRpcError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownTool(name) => JsonRpcError::unknown_tool(&name),
            DispatchError::InvalidParams(message) => JsonRpcError::invalid_params(message),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {field} - {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Cannot determine project directory: {0}")]
    ProjectDir(#[source] std::io::Error),
}
