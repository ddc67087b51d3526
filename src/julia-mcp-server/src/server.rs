//! MCP server core: JSON-RPC routing and the line-delimited stdio transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use julia_mcp_types::{
    CallToolParams, CancelledNotification, Implementation, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, LogLevel,
    RequestId, ServerCapabilities, SetLogLevelParams, Tool, methods,
};

use crate::handlers::ToolHandler;

pub(crate) type LogLevelHook = Box<dyn Fn(LogLevel) + Send + Sync>;

// Helper trait for pipe syntax
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}

/// MCP server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    /// `initialize` answered, waiting for `notifications/initialized`.
    Initializing,
    Ready,
    /// Input closed or `stop` called; in-flight calls are draining.
    ShuttingDown,
    Stopped,
}

/// MCP server. Immutable apart from protocol bookkeeping; all tool
/// behavior lives behind the [`ToolHandler`].
pub struct McpServer {
    pub(crate) info: Implementation,
    pub(crate) capabilities: ServerCapabilities,
    pub(crate) handler: Arc<dyn ToolHandler>,
    pub(crate) instructions: Option<String>,
    pub(crate) log_level: RwLock<LogLevel>,
    pub(crate) log_level_hook: Option<LogLevelHook>,
    pub(crate) state: RwLock<ServerState>,
    pub(crate) running: AtomicBool,
    /// Cancelled by [`McpServer::stop`] to end the read loop.
    pub(crate) shutdown: CancellationToken,
    /// Cancellation tokens of in-flight `tools/call` requests.
    pub(crate) pending_requests: Mutex<HashMap<RequestId, CancellationToken>>,
    pub(crate) client_info: RwLock<Option<Implementation>>,
}

impl McpServer {
    pub fn info(&self) -> &Implementation {
        &self.info
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.handler.tools()
    }

    pub async fn log_level(&self) -> LogLevel {
        *self.log_level.read().await
    }

    /// Client that completed `initialize`, if any.
    pub async fn client_info(&self) -> Option<Implementation> {
        self.client_info.read().await.clone()
    }

    /// Number of tool calls currently executing.
    pub async fn in_flight(&self) -> usize {
        self.pending_requests.lock().await.len()
    }

    // ========================================================================
    // Request Handlers
    // ========================================================================

    /// Handle a JSON-RPC request that nobody can cancel.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        self.handle_request_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Handle a JSON-RPC request; `cancel` is forwarded to tool calls.
    pub async fn handle_request_with_cancel(
        &self,
        request: JsonRpcRequest,
        cancel: CancellationToken,
    ) -> JsonRpcResponse {
        debug!(method = %request.method, id = %request.id, "Handling request");

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.params).await,
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => self.handle_list_tools(),
            methods::TOOLS_CALL => self.handle_call_tool(request.params, cancel).await,
            methods::LOGGING_SET_LEVEL => self.handle_set_log_level(request.params).await,
            _ => Err(JsonRpcError::method_not_found(&request.method)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        }
    }

    /// Handle a JSON-RPC notification.
    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        debug!(method = %notification.method, "Handling notification");

        match notification.method.as_str() {
            methods::INITIALIZED => {
                *self.state.write().await = ServerState::Ready;
                info!("Server initialized and ready");
            }
            methods::CANCELLED => {
                if let Some(params) = notification.params
                    && let Ok(cancelled) = serde_json::from_value::<CancelledNotification>(params)
                {
                    self.handle_cancellation(cancelled).await;
                }
            }
            _ => {
                warn!(method = %notification.method, "Unknown notification");
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        // Check and transition under one write lock so two concurrent
        // initialize requests cannot both succeed.
        {
            let mut state_guard = self.state.write().await;
            if *state_guard != ServerState::Uninitialized {
                return Err(JsonRpcError::invalid_request("Server already initialized"));
            }
            *state_guard = ServerState::Initializing;
        }

        let init_params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?
            .unwrap_or_default();

        info!(
            client = %init_params.client_info.name,
            version = %init_params.client_info.version,
            protocol = %init_params.protocol_version,
            "Client connected"
        );
        *self.client_info.write().await = Some(init_params.client_info);

        let result = InitializeResult::new(self.info.clone(), self.capabilities.clone())
            .with_instructions(self.instructions.clone());

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        let result = ListToolsResult::new(self.handler.tools());
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<Value, JsonRpcError> {
        let call_params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?
            .pipe(serde_json::from_value)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?;

        debug!(tool = %call_params.name, "Calling tool");

        let result = self.handler.call(call_params, cancel).await?;
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_set_log_level(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let level_params: SetLogLevelParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?
            .pipe(serde_json::from_value)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?;

        *self.log_level.write().await = level_params.level;
        if let Some(hook) = &self.log_level_hook {
            hook(level_params.level);
        }
        debug!(level = %level_params.level, "Log level changed");

        Ok(json!({}))
    }

    async fn handle_cancellation(&self, cancelled: CancelledNotification) {
        match self.pending_requests.lock().await.get(&cancelled.request_id) {
            Some(token) => {
                token.cancel();
                debug!(
                    request_id = %cancelled.request_id,
                    reason = cancelled.reason.as_deref().unwrap_or(""),
                    "Request cancelled"
                );
            }
            None => {
                debug!(request_id = %cancelled.request_id, "Cancellation for unknown or finished request");
            }
        }
    }

    /// Register an in-flight call. `None` if a call with the same id is
    /// still running.
    async fn track(&self, id: &RequestId) -> Option<CancellationToken> {
        let mut pending = self.pending_requests.lock().await;
        if pending.contains_key(id) {
            return None;
        }
        let token = CancellationToken::new();
        pending.insert(id.clone(), token.clone());
        Some(token)
    }

    /// Run a tracked tool call and queue its response, unless the client
    /// cancelled it in the meantime.
    async fn respond(
        &self,
        request: JsonRpcRequest,
        cancel: CancellationToken,
        responses: mpsc::UnboundedSender<JsonRpcResponse>,
    ) {
        let id = request.id.clone();
        let response = self.handle_request_with_cancel(request, cancel.clone()).await;
        self.pending_requests.lock().await.remove(&id);

        if cancel.is_cancelled() {
            debug!(request_id = %id, "Dropping response to cancelled request");
            return;
        }
        if responses.send(response).is_err() {
            warn!(request_id = %id, "Response writer closed before response was sent");
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Run the server over stdin/stdout until stdin closes.
    pub async fn run_stdio(self: Arc<Self>) -> Result<()> {
        info!(server = %self.info.name, "Starting MCP server with stdio transport");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, writing responses to
    /// `writer`.
    ///
    /// `tools/call` requests run concurrently in their own tasks; everything
    /// else is answered inline, in arrival order. Responses go through a
    /// single writer task so lines never interleave. On EOF, in-flight calls
    /// are awaited and their responses flushed before returning.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.running.store(true, Ordering::SeqCst);

        let (responses, queued) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, queued));
        let mut in_flight = JoinSet::new();

        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let read = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("Stop requested, shutting down");
                    break;
                }
                read = reader.read_line(&mut line) => read,
            };

            match read {
                Ok(0) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let message = match serde_json::from_str::<Value>(trimmed) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!(error = %e, "Unparseable message");
                            let _ = responses.send(JsonRpcResponse::error(
                                RequestId::Number(0),
                                JsonRpcError::parse_error("Invalid JSON"),
                            ));
                            continue;
                        }
                    };

                    if let Ok(request) = serde_json::from_value::<JsonRpcRequest>(message.clone()) {
                        if request.method != methods::TOOLS_CALL {
                            let response = self.handle_request(request).await;
                            let _ = responses.send(response);
                        } else if let Some(cancel) = self.track(&request.id).await {
                            let server = Arc::clone(&self);
                            let responses = responses.clone();
                            in_flight.spawn(async move {
                                server.respond(request, cancel, responses).await;
                            });
                        } else {
                            warn!(request_id = %request.id, "Duplicate in-flight request id");
                            let _ = responses.send(JsonRpcResponse::error(
                                request.id.clone(),
                                JsonRpcError::invalid_request(format!(
                                    "Request {} is already in flight",
                                    request.id
                                )),
                            ));
                        }
                    } else if let Ok(notification) =
                        serde_json::from_value::<JsonRpcNotification>(message.clone())
                    {
                        self.handle_notification(notification).await;
                    } else {
                        warn!(line = %trimmed, "Invalid JSON-RPC message");
                        let id = message
                            .get("id")
                            .cloned()
                            .and_then(|id| serde_json::from_value::<RequestId>(id).ok())
                            .unwrap_or(RequestId::Number(0));
                        let _ = responses.send(JsonRpcResponse::error(
                            id,
                            JsonRpcError::invalid_request("Not a JSON-RPC request or notification"),
                        ));
                    }

                    while in_flight.try_join_next().is_some() {}
                }
                Err(e) => {
                    error!(error = %e, "Error reading from transport");
                    break;
                }
            }
        }

        *self.state.write().await = ServerState::ShuttingDown;
        if !in_flight.is_empty() {
            info!(count = in_flight.len(), "Waiting for in-flight tool calls");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Tool call task failed");
            }
        }

        drop(responses);
        writer_task
            .await
            .context("Response writer task failed")??;

        *self.state.write().await = ServerState::Stopped;
        self.running.store(false, Ordering::SeqCst);
        info!("MCP server stopped");

        Ok(())
    }

    /// Stop reading new messages and cancel every in-flight tool call.
    pub async fn stop(&self) {
        info!("Stopping MCP server");
        *self.state.write().await = ServerState::ShuttingDown;
        self.shutdown.cancel();
        for token in self.pending_requests.lock().await.values() {
            token.cancel();
        }
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut queued: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = queued.recv().await {
        let mut line = serde_json::to_string(&response).context("Failed to serialize response")?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .context("Failed to write response")?;
        writer.flush().await.context("Failed to flush response")?;
    }
    Ok(())
}
