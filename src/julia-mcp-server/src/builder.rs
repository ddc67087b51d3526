//! MCP server builder.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, bail};
use julia_mcp_types::{Implementation, LogLevel, ServerCapabilities};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::handlers::ToolHandler;
use crate::server::{LogLevelHook, McpServer, ServerState};

/// Builder for [`McpServer`].
pub struct McpServerBuilder {
    name: String,
    version: String,
    capabilities: ServerCapabilities,
    handler: Option<Arc<dyn ToolHandler>>,
    instructions: Option<String>,
    log_level: LogLevel,
    log_level_hook: Option<LogLevelHook>,
}

impl McpServerBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities: ServerCapabilities::default(),
            handler: None,
            instructions: None,
            log_level: LogLevel::Info,
            log_level_hook: None,
        }
    }

    /// Set the tool handler. Enables the tools capability.
    pub fn tool_handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = Some(handler);
        self.capabilities = self.capabilities.with_tools();
        self
    }

    /// Enable the logging capability.
    pub fn with_logging_capability(mut self) -> Self {
        self.capabilities = self.capabilities.with_logging();
        self
    }

    /// Level reported before the client sends `logging/setLevel`.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Called whenever the client changes the log level.
    pub fn on_log_level<F>(mut self, hook: F) -> Self
    where
        F: Fn(LogLevel) + Send + Sync + 'static,
    {
        self.log_level_hook = Some(Box::new(hook));
        self.capabilities = self.capabilities.with_logging();
        self
    }

    /// Instructions returned to clients from `initialize`.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn build(self) -> Result<Arc<McpServer>> {
        let Some(handler) = self.handler else {
            bail!("MCP server '{}' has no tool handler", self.name);
        };

        Ok(Arc::new(McpServer {
            info: Implementation::new(self.name, self.version),
            capabilities: self.capabilities,
            handler,
            instructions: self.instructions,
            log_level: RwLock::new(self.log_level),
            log_level_hook: self.log_level_hook,
            state: RwLock::new(ServerState::Uninitialized),
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            pending_requests: Mutex::new(HashMap::new()),
            client_info: RwLock::new(None),
        }))
    }

    /// Build and serve over stdin/stdout until EOF.
    pub async fn build_and_run_stdio(self) -> Result<()> {
        let server = self.build()?;
        server.run_stdio().await
    }
}
