use std::path::{Path, PathBuf};
use std::sync::Mutex;

use julia_mcp_server::ToolHandler;
use julia_mcp_types::{CallToolParams, ErrorCode};
use julia_runner::{
    CodeRunner, DispatchError, ExecutionFailure, ExecutionOutcome, FailureKind, RequestDispatcher,
    RunnerConfig,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Returns a fixed outcome and records every program it is asked to run.
struct RecordingRunner {
    outcome: ExecutionOutcome,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingRunner {
    fn new(outcome: ExecutionOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CodeRunner for RecordingRunner {
    async fn run(&self, code: &str, cwd: &Path, _cancel: &CancellationToken) -> ExecutionOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((code.to_string(), cwd.to_path_buf()));
        self.outcome.clone()
    }
}

fn dispatcher(outcome: ExecutionOutcome) -> RequestDispatcher<RecordingRunner> {
    RequestDispatcher::new(RecordingRunner::new(outcome), "/work/project")
}

fn call(name: &str, arguments: serde_json::Value) -> CallToolParams {
    CallToolParams::new(name).with_arguments(arguments)
}

#[tokio::test]
async fn test_execute_returns_stdout() {
    let dispatcher = dispatcher(ExecutionOutcome::success("42"));

    let result = dispatcher
        .dispatch(call("execute_julia", json!({ "code": "6 * 7" })), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_error());
    assert_eq!(result.first_text(), Some("42"));
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({ "content": [{ "type": "text", "text": "42" }], "isError": false })
    );
    assert_eq!(
        dispatcher.runner().calls(),
        vec![(
            r#"using Pkg; Pkg.activate("/work/project"); 6 * 7"#.to_string(),
            PathBuf::from("/work/project")
        )]
    );
}

#[tokio::test]
async fn test_non_zero_exit_is_error_result() {
    let dispatcher = dispatcher(ExecutionOutcome::Failure(ExecutionFailure::new(
        FailureKind::NonZeroExit,
        Some(1),
        "ERROR: UndefVarError: `x` not defined",
    )));

    let result = dispatcher
        .dispatch(call("execute_julia", json!({ "code": "x" })), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_error());
    assert_eq!(
        result.first_text(),
        Some(
            "Error executing Julia code: Julia process exited with code 1: \
             ERROR: UndefVarError: `x` not defined"
        )
    );
}

#[tokio::test]
async fn test_failure_prefix_per_tool() {
    let failure = ExecutionOutcome::Failure(ExecutionFailure::new(
        FailureKind::SpawnError,
        None,
        "No such file or directory (os error 2)",
    ));
    let cases = [
        ("add_julia_package", json!({ "package_name": "Plots" }), "Error adding Julia package"),
        ("get_installed_julia_packages", json!({}), "Error getting installed Julia packages"),
        ("get_julia_documentation", json!({ "function_name": "sum" }), "Error getting Julia documentation"),
    ];

    for (name, arguments, prefix) in cases {
        let result = dispatcher(failure.clone())
            .dispatch(call(name, arguments), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_error());
        assert_eq!(
            result.first_text().unwrap(),
            format!("{prefix}: Failed to start Julia process: No such file or directory (os error 2)")
        );
    }
}

#[tokio::test]
async fn test_add_package_builds_pkg_add_and_confirms() {
    let dispatcher = dispatcher(ExecutionOutcome::success("   Resolving package versions...\n"));

    let result = dispatcher
        .dispatch(
            call("add_julia_package", json!({ "package_name": "Plots" })),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let calls = dispatcher.runner().calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.contains(r#"Pkg.add("Plots")"#));
    assert_eq!(
        result.first_text(),
        Some("Package Plots added successfully:\n   Resolving package versions...\n")
    );
}

#[tokio::test]
async fn test_documentation_and_status_sources() {
    let dispatcher = dispatcher(ExecutionOutcome::success(""));
    let cancel = CancellationToken::new();

    dispatcher
        .dispatch(call("get_julia_documentation", json!({ "function_name": "Base.push!" })), &cancel)
        .await
        .unwrap();
    dispatcher
        .dispatch(CallToolParams::new("get_installed_julia_packages"), &cancel)
        .await
        .unwrap();

    let sources: Vec<_> = dispatcher
        .runner()
        .calls()
        .into_iter()
        .map(|(source, _)| source)
        .collect();
    assert_eq!(
        sources,
        vec![
            r#"using Pkg; Pkg.activate("/work/project"); println(@doc Base.push!)"#.to_string(),
            r#"using Pkg; Pkg.activate("/work/project"); Pkg.status()"#.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_invalid_calls_never_reach_runner() {
    let dispatcher = dispatcher(ExecutionOutcome::success("unused"));
    let cancel = CancellationToken::new();

    let cases = [
        (call("execute_julia", json!({})), DispatchError::InvalidParams("Code is required".into())),
        (
            call("add_julia_package", json!({ "package_name": "" })),
            DispatchError::InvalidParams("Package name is required".into()),
        ),
        (
            CallToolParams::new("get_julia_documentation"),
            DispatchError::InvalidParams("Function name is required".into()),
        ),
        (
            call("add_julia_package", json!({ "package_name": "Plots\"); run(`id`); (\"" })),
            DispatchError::InvalidParams(
                "Invalid package_name for add_julia_package: \"Plots\\\"); run(`id`); (\\\"\"".into(),
            ),
        ),
        (call("julia_repl", json!({})), DispatchError::UnknownTool("julia_repl".into())),
    ];

    for (params, expected) in cases {
        assert_eq!(dispatcher.dispatch(params, &cancel).await.unwrap_err(), expected);
    }
    assert!(dispatcher.runner().calls().is_empty());
}

#[tokio::test]
async fn test_tool_handler_error_codes() {
    let dispatcher = dispatcher(ExecutionOutcome::success(""));

    let unknown = dispatcher
        .call(CallToolParams::new("julia_repl"), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(unknown.code, ErrorCode::METHOD_NOT_FOUND);
    assert_eq!(unknown.message, "Unknown tool: julia_repl");

    let missing = dispatcher
        .call(CallToolParams::new("execute_julia"), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(missing.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(missing.message, "Code is required");

    let names: Vec<_> = dispatcher.tools().into_iter().map(|t| t.name).collect();
    assert_eq!(names[0], "execute_julia");
    assert_eq!(names.len(), 4);
}

#[test]
fn test_relative_project_dir_is_activated_by_absolute_path() {
    let config = RunnerConfig {
        project_dir: Some(PathBuf::from("proj")),
        ..Default::default()
    };
    let dispatcher = RequestDispatcher::from_config(&config).unwrap();
    let expected = std::env::current_dir().unwrap().join("proj");

    assert_eq!(dispatcher.project_dir(), expected.as_path());
    let prepared = dispatcher
        .prepare(&CallToolParams::new("get_installed_julia_packages"))
        .unwrap();
    assert_eq!(
        prepared.source,
        format!("using Pkg; Pkg.activate(\"{}\"); Pkg.status()", expected.display())
    );
}
