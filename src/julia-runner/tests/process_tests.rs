//! Dispatcher and executor against a real child process.
//!
//! A small shell script stands in for `julia`: it is started as
//! `sh fake_julia.sh <program>` and reacts to the generated program text.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use julia_mcp_types::CallToolParams;
use julia_runner::{ProcessExecutor, RequestDispatcher, RunnerConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const FAKE_JULIA: &str = r#"
case "$1" in
  *'Pkg.add("Missing")'*)
    echo 'ERROR: The following package names could not be resolved: Missing' >&2
    exit 1 ;;
  *UndefVarError*)
    echo 'ERROR: UndefVarError: `x` not defined' >&2
    exit 1 ;;
  *'sleep('*)
    exec sleep 10 ;;
  *'pwd()'*)
    pwd -P
    exit 0 ;;
  *'print(42)'*)
    printf 42
    exit 0 ;;
esac
printf '%s\n' "$1"
"#;

struct Fixture {
    project: TempDir,
    script: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let project = tempfile::tempdir().unwrap();
        let script = project.path().join("fake_julia.sh");
        std::fs::write(&script, FAKE_JULIA).unwrap();
        Self { project, script }
    }

    fn config(&self) -> RunnerConfig {
        RunnerConfig {
            julia_path: "sh".into(),
            eval_flag: self.script.display().to_string(),
            project_dir: Some(self.project.path().to_path_buf()),
            ..Default::default()
        }
    }

    fn dispatcher(&self) -> RequestDispatcher {
        RequestDispatcher::from_config(&self.config()).unwrap()
    }

    fn project_dir(&self) -> &Path {
        self.project.path()
    }
}

async fn run(dispatcher: &RequestDispatcher, name: &str, arguments: serde_json::Value) -> (bool, String) {
    let result = dispatcher
        .dispatch(
            CallToolParams::new(name).with_arguments(arguments),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    (result.is_error(), result.first_text().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_execute_passes_program_as_single_argument() {
    let fixture = Fixture::new();

    let (is_error, text) = run(
        &fixture.dispatcher(),
        "execute_julia",
        json!({ "code": "println(\"a b\"); 1 + 1" }),
    )
    .await;

    assert!(!is_error);
    assert_eq!(
        text,
        format!(
            "using Pkg; Pkg.activate(\"{}\"); println(\"a b\"); 1 + 1\n",
            fixture.project_dir().display()
        )
    );
}

#[tokio::test]
async fn test_stdout_becomes_text_content() {
    let fixture = Fixture::new();

    let result = fixture
        .dispatcher()
        .dispatch(
            CallToolParams::new("execute_julia").with_arguments(json!({ "code": "print(42)" })),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({ "content": [{ "type": "text", "text": "42" }], "isError": false })
    );
}

#[tokio::test]
async fn test_runs_in_project_directory() {
    let fixture = Fixture::new();

    let (is_error, text) = run(&fixture.dispatcher(), "execute_julia", json!({ "code": "println(pwd())" })).await;

    assert!(!is_error);
    assert_eq!(
        text.trim_end(),
        fixture.project_dir().canonicalize().unwrap().display().to_string()
    );
}

#[tokio::test]
async fn test_undefined_variable_reports_exit_code_and_stderr() {
    let fixture = Fixture::new();

    let (is_error, text) = run(
        &fixture.dispatcher(),
        "execute_julia",
        json!({ "code": "throw(UndefVarError(:x))" }),
    )
    .await;

    assert!(is_error);
    assert!(text.starts_with("Error executing Julia code: Julia process exited with code 1: "));
    assert!(text.contains("UndefVarError"));
}

#[tokio::test]
async fn test_add_package_success_and_failure() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();

    let (is_error, text) = run(&dispatcher, "add_julia_package", json!({ "package_name": "Plots" })).await;
    assert!(!is_error);
    assert!(text.starts_with("Package Plots added successfully:\n"));
    assert!(text.contains(r#"Pkg.add("Plots")"#));

    let (is_error, text) = run(&dispatcher, "add_julia_package", json!({ "package_name": "Missing" })).await;
    assert!(is_error);
    assert!(text.starts_with("Error adding Julia package: Julia process exited with code 1: "));
    assert!(text.contains("could not be resolved: Missing"));
}

#[tokio::test]
async fn test_missing_interpreter_fails_fast() {
    let fixture = Fixture::new();
    let config = RunnerConfig {
        julia_path: "julia-runner-no-such-interpreter".into(),
        ..fixture.config()
    };
    let dispatcher = RequestDispatcher::from_config(&config).unwrap();

    let start = Instant::now();
    let (is_error, text) = run(&dispatcher, "get_installed_julia_packages", json!({})).await;

    assert!(is_error);
    assert!(text.starts_with("Error getting installed Julia packages: Failed to start Julia process: "));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_deadline_reported_as_timeout() {
    let fixture = Fixture::new();
    let executor = ProcessExecutor::new("sh")
        .with_eval_flag(fixture.script.display().to_string())
        .with_timeout(Some(Duration::from_millis(200)));
    let dispatcher = RequestDispatcher::new(executor, fixture.project_dir());

    let start = Instant::now();
    let (is_error, text) = run(&dispatcher, "execute_julia", json!({ "code": "sleep(10)" })).await;

    assert!(is_error);
    assert_eq!(text, "Error executing Julia code: Julia process timed out after 0.2s");
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancellation_kills_process() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = dispatcher
        .dispatch(
            CallToolParams::new("execute_julia").with_arguments(json!({ "code": "sleep(10)" })),
            &cancel,
        )
        .await
        .unwrap();

    assert!(result.is_error());
    assert_eq!(
        result.first_text(),
        Some("Error executing Julia code: Julia process was cancelled")
    );
    assert!(start.elapsed() < Duration::from_secs(5));
}
