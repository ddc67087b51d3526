//! Tool call dispatch.
//!
//! Validates a call, resolves the tool, builds the Julia program, runs it
//! and maps the outcome onto a tool result. Validation failures are
//! protocol errors and never reach the runner; execution failures come back
//! as results with `is_error` set.

use std::path::{Path, PathBuf};

use julia_mcp_server::ToolHandler;
use julia_mcp_types::{CallToolParams, CallToolResult, JsonRpcError, Tool};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::{ConfigError, DispatchError};
use crate::executor::{CodeRunner, ExecutionOutcome, ProcessExecutor};
use crate::registry::{JuliaTool, RequiredArgument, ToolRegistry};
use crate::source;

/// Immutable dispatch context shared by every call.
pub struct RequestDispatcher<R = ProcessExecutor> {
    registry: ToolRegistry,
    project_dir: PathBuf,
    runner: R,
    validate_names: bool,
}

impl RequestDispatcher<ProcessExecutor> {
    pub fn from_config(config: &RunnerConfig) -> Result<Self, ConfigError> {
        let project_dir = config.resolved_project_dir()?;
        Ok(Self::new(ProcessExecutor::from_config(config), project_dir)
            .with_name_validation(config.validate_names))
    }
}

impl<R: CodeRunner> RequestDispatcher<R> {
    pub fn new(runner: R, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry: ToolRegistry::new(),
            project_dir: project_dir.into(),
            runner,
            validate_names: true,
        }
    }

    /// Enable or disable package and function name allow-listing.
    pub fn with_name_validation(mut self, enabled: bool) -> Self {
        self.validate_names = enabled;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Resolve and validate a call, returning the tool, its argument and
    /// the program to run.
    pub fn prepare(&self, params: &CallToolParams) -> Result<PreparedCall, DispatchError> {
        let tool = self
            .registry
            .get(&params.name)
            .ok_or_else(|| DispatchError::UnknownTool(params.name.clone()))?;

        let argument = match tool.required_argument() {
            Some(required) => extract_argument(params, required)?,
            None => String::new(),
        };
        if self.validate_names {
            source::check_argument(tool, &argument)?;
        }

        let source = source::build_source(tool, &self.project_dir, &argument);
        Ok(PreparedCall {
            tool,
            argument,
            source,
        })
    }

    /// Execute one tool call.
    pub async fn dispatch(
        &self,
        params: CallToolParams,
        cancel: &CancellationToken,
    ) -> Result<CallToolResult, DispatchError> {
        let call = match self.prepare(&params) {
            Ok(call) => call,
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Rejected tool call");
                return Err(e);
            }
        };

        info!(tool = call.tool.name(), "Running tool");
        debug!(source = %call.source, "Generated program");

        let outcome = self
            .runner
            .run(&call.source, &self.project_dir, cancel)
            .await;

        Ok(match outcome {
            ExecutionOutcome::Success { stdout } => {
                debug!(tool = call.tool.name(), stdout_len = stdout.len(), "Tool succeeded");
                CallToolResult::text(call.success_text(stdout))
            }
            ExecutionOutcome::Failure(failure) => {
                warn!(
                    tool = call.tool.name(),
                    kind = ?failure.kind,
                    exit_code = ?failure.exit_code,
                    "Tool failed"
                );
                CallToolResult::error(format!("{}: {failure}", call.tool.failure_prefix()))
            }
        })
    }
}

#[async_trait::async_trait]
impl<R: CodeRunner + 'static> ToolHandler for RequestDispatcher<R> {
    fn tools(&self) -> Vec<Tool> {
        self.registry.list_tools()
    }

    async fn call(
        &self,
        params: CallToolParams,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, JsonRpcError> {
        Ok(self.dispatch(params, &cancel).await?)
    }
}

/// A validated call, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub tool: JuliaTool,
    /// The required argument, empty for tools without one.
    pub argument: String,
    pub source: String,
}

impl PreparedCall {
    fn success_text(&self, stdout: String) -> String {
        match self.tool {
            JuliaTool::AddPackage => {
                format!("Package {} added successfully:\n{stdout}", self.argument)
            }
            _ => stdout,
        }
    }
}

/// Read a required argument as text. Numbers and booleans are accepted in
/// their JSON form; absent, null and empty values count as missing.
fn extract_argument(
    params: &CallToolParams,
    required: RequiredArgument,
) -> Result<String, DispatchError> {
    let value = match params.argument(required.name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        Some(_) => {
            return Err(DispatchError::InvalidParams(format!(
                "{} must be a string",
                required.name
            )));
        }
    };

    if value.is_empty() {
        return Err(DispatchError::InvalidParams(
            required.missing_message.to_string(),
        ));
    }
    Ok(value)
}
