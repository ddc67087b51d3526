//! Model Context Protocol wire types used by the Julia runner.
//!
//! Covers the JSON-RPC 2.0 envelope plus the subset of MCP the bridge
//! speaks: the `initialize` handshake, tool listing and invocation,
//! log levels, and request cancellation.
//!
//! # Example
//! ```rust
//! use julia_mcp_types::{PropertySchema, Tool, ToolInputSchema};
//!
//! let tool = Tool::new("execute_julia", "Execute Julia code").with_schema(
//!     ToolInputSchema::object()
//!         .required_property("code", PropertySchema::string().description("Julia code to execute")),
//! );
//! assert_eq!(tool.input_schema.required, vec!["code"]);
//! ```

mod capabilities;
mod content;
mod initialization;
mod jsonrpc;
mod logging;
mod notifications;
mod tools;

/// MCP method name constants.
pub mod methods;

/// MCP protocol version spoken by the server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub use capabilities::{ClientCapabilities, LoggingCapability, ServerCapabilities, ToolsCapability};
pub use content::Content;
pub use initialization::{Implementation, InitializeParams, InitializeResult};
pub use jsonrpc::{
    ErrorCode, JSONRPC_VERSION, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
pub use logging::{LogLevel, SetLogLevelParams};
pub use notifications::CancelledNotification;
pub use tools::{CallToolParams, CallToolResult, ListToolsResult, PropertySchema, Tool, ToolInputSchema};
