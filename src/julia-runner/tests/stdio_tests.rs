//! JSON-RPC over a byte stream, from request line to response line.
#![cfg(unix)]

use std::sync::Arc;

use julia_mcp_server::McpServerBuilder;
use julia_mcp_types::{ErrorCode, JsonRpcResponse, RequestId};
use julia_runner::{INSTRUCTIONS, ProcessExecutor, RequestDispatcher, SERVER_NAME, VERSION};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn session(lines: &[Value]) -> Vec<JsonRpcResponse> {
    let project = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::new("sh").with_eval_flag("-c");
    let dispatcher = RequestDispatcher::new(executor, project.path());

    let server = McpServerBuilder::new(SERVER_NAME, VERSION)
        .tool_handler(Arc::new(dispatcher))
        .instructions(INSTRUCTIONS)
        .with_logging_capability()
        .build()
        .unwrap();

    let (client, transport) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(transport);
    let serving = tokio::spawn(server.serve(server_read, server_write));

    let (mut client_read, mut client_write) = tokio::io::split(client);
    for line in lines {
        client_write
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }
    client_write.shutdown().await.unwrap();

    let mut output = String::new();
    client_read.read_to_string(&mut output).await.unwrap();
    serving.await.unwrap().unwrap();

    output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn response(responses: &[JsonRpcResponse], id: i64) -> &JsonRpcResponse {
    responses
        .iter()
        .find(|r| r.id == RequestId::from(id))
        .unwrap_or_else(|| panic!("no response for id {id}"))
}

#[tokio::test]
async fn test_full_session() {
    let responses = session(&[
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "0.1" }
            }
        }),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": { "name": "execute_julia", "arguments": {} }
        }),
        json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "evaluate", "arguments": { "code": "1" } }
        }),
        json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": { "name": "get_julia_documentation", "arguments": { "function_name": "a;b" } }
        }),
        json!({ "jsonrpc": "2.0", "id": 6, "method": "ping" }),
    ])
    .await;

    assert_eq!(responses.len(), 6);

    let init = response(&responses, 1).result.clone().unwrap();
    assert_eq!(init["protocolVersion"], json!("2024-11-05"));
    assert_eq!(init["serverInfo"]["name"], json!("julia-runner"));
    assert_eq!(init["instructions"], json!(INSTRUCTIONS));
    assert!(init["capabilities"]["tools"].is_object());
    assert!(init["capabilities"]["logging"].is_object());

    let tools = response(&responses, 2).result.clone().unwrap();
    let names: Vec<_> = tools["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "execute_julia",
            "add_julia_package",
            "get_installed_julia_packages",
            "get_julia_documentation",
        ]
    );

    let missing = response(&responses, 3).error.clone().unwrap();
    assert_eq!(missing.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(missing.message, "Code is required");

    let unknown = response(&responses, 4).error.clone().unwrap();
    assert_eq!(unknown.code, ErrorCode::METHOD_NOT_FOUND);
    assert_eq!(unknown.message, "Unknown tool: evaluate");

    let rejected = response(&responses, 5).error.clone().unwrap();
    assert_eq!(rejected.code, ErrorCode::INVALID_PARAMS);

    assert!(response(&responses, 6).is_success());
}

#[tokio::test]
async fn test_execution_failure_is_result_not_error() {
    // `sh -c` cannot parse the activation prelude, so the call fails the
    // way a Julia error would: non-zero exit with stderr.
    let responses = session(&[json!({
        "jsonrpc": "2.0", "id": 9, "method": "tools/call",
        "params": { "name": "execute_julia", "arguments": { "code": "x" } }
    })])
    .await;

    let result = response(&responses, 9).result.clone().unwrap();
    assert_eq!(result["isError"], json!(true));
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error executing Julia code: Julia process exited with code "));
}
