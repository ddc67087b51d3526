//! MCP server for the Julia runner.
//!
//! Speaks newline-delimited JSON-RPC 2.0 over stdio, answers the
//! lifecycle and logging methods itself, and hands tool listing and
//! tool calls to a [`ToolHandler`]. Tool calls run concurrently and can
//! be cancelled by the client with `notifications/cancelled`.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use julia_mcp_server::{McpServerBuilder, ToolHandler};
//!
//! async fn serve(handler: Arc<dyn ToolHandler>) -> anyhow::Result<()> {
//!     McpServerBuilder::new("julia-runner", "0.1.0")
//!         .tool_handler(handler)
//!         .build_and_run_stdio()
//!         .await
//! }
//! ```

mod builder;
mod handlers;
mod server;

pub use builder::McpServerBuilder;
pub use handlers::ToolHandler;
pub use server::{McpServer, ServerState};

pub use julia_mcp_types;
