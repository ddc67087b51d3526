//! Tool handler trait.

use julia_mcp_types::{CallToolParams, CallToolResult, JsonRpcError, Tool};
use tokio_util::sync::CancellationToken;

/// Serves the tool catalog and executes tool calls on behalf of the server.
///
/// `Err` is a protocol-level failure and becomes a JSON-RPC error object.
/// Tool failures the caller should read are returned as `Ok` with
/// `is_error` set.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// The tool catalog, in the order it should be advertised.
    fn tools(&self) -> Vec<Tool>;

    /// Execute one tool call. `cancel` fires when the client cancels the
    /// request or the server is shutting down the call.
    async fn call(
        &self,
        params: CallToolParams,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, JsonRpcError>;
}
