//! Interpreter process execution.
//!
//! One child process per call: spawned with the generated program as its
//! only evaluated argument, both output streams drained concurrently into
//! per-call buffers, and a single [`ExecutionOutcome`] produced once the
//! process has exited. Admission is bounded by a semaphore; a deadline or a
//! cancellation kills the child.

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT_SECS, RunnerConfig};

/// Why an execution did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The interpreter could not be started.
    SpawnError,
    /// The interpreter exited with a non-zero status or was killed by a signal.
    NonZeroExit,
    /// The deadline passed and the child was killed.
    Timeout { after: Duration },
    /// The call was cancelled and the child was killed.
    Cancelled,
    /// Output could not be collected from a running child.
    Io,
}

/// Failed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    /// `None` when the process never started or ended without an exit code.
    pub exit_code: Option<i32>,
    /// Captured stderr, or the OS error message for spawn failures.
    pub stderr: String,
}

impl ExecutionFailure {
    pub fn new(kind: FailureKind, exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            kind,
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn spawn(err: &std::io::Error) -> Self {
        Self::new(FailureKind::SpawnError, None, err.to_string())
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(FailureKind::Timeout { after }, None, String::new())
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, None, String::new())
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::SpawnError => {
                write!(f, "Failed to start Julia process: {}", self.stderr)
            }
            FailureKind::NonZeroExit => match self.exit_code {
                Some(code) => write!(
                    f,
                    "Julia process exited with code {code}: {}",
                    self.stderr
                ),
                None => write!(
                    f,
                    "Julia process exited with code unknown: {}",
                    self.stderr
                ),
            },
            FailureKind::Timeout { after } => {
                write!(f, "Julia process timed out after {}s", after.as_secs_f64())
            }
            FailureKind::Cancelled => write!(f, "Julia process was cancelled"),
            FailureKind::Io => write!(f, "Failed to read Julia process output: {}", self.stderr),
        }
    }
}

impl std::error::Error for ExecutionFailure {}

/// Terminal result of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit code 0. Stderr is discarded.
    Success { stdout: String },
    Failure(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::Success {
            stdout: stdout.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn into_result(self) -> Result<String, ExecutionFailure> {
        match self {
            Self::Success { stdout } => Ok(stdout),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl From<ExecutionFailure> for ExecutionOutcome {
    fn from(failure: ExecutionFailure) -> Self {
        Self::Failure(failure)
    }
}

/// Runs a generated program. Implementations must resolve with exactly one
/// outcome and must not return before the program has finished.
#[async_trait::async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str, cwd: &Path, cancel: &CancellationToken) -> ExecutionOutcome;
}

/// Runs programs in a fresh interpreter process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    eval_flag: String,
    timeout: Option<Duration>,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            eval_flag: "-e".to_string(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.julia_path.clone())
            .with_eval_flag(config.eval_flag.clone())
            .with_timeout(config.timeout())
            .with_max_concurrent(config.max_concurrent)
    }

    pub fn with_eval_flag(mut self, flag: impl Into<String>) -> Self {
        self.eval_flag = flag.into();
        self
    }

    /// Set the per-execution deadline. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of concurrently running processes.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self.semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Slots currently free for new processes.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn command(&self, code: &str, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(&self.eval_flag)
            .arg(code)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn execute(&self, code: &str, cwd: &Path, cancel: &CancellationToken) -> ExecutionOutcome {
        let start = Instant::now();

        debug!(program = %self.program, cwd = %cwd.display(), "Spawning interpreter");
        let mut child = match self.command(code, cwd).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(program = %self.program, error = %e, "Failed to spawn interpreter");
                return ExecutionFailure::spawn(&e).into();
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let deadline = async {
            match self.timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        };

        let collected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                kill(&mut child).await;
                info!(elapsed_ms = start.elapsed().as_millis() as u64, "Interpreter cancelled");
                return ExecutionFailure::cancelled().into();
            }
            _ = deadline => {
                kill(&mut child).await;
                let after = self.timeout.unwrap_or_default();
                warn!(timeout_secs = after.as_secs_f64(), "Interpreter timed out");
                return ExecutionFailure::timeout(after).into();
            }
            collected = wait_with_output(&mut child, stdout, stderr) => collected,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match collected {
            Ok((status, stdout, stderr)) => {
                let stdout = String::from_utf8_lossy(&stdout).into_owned();
                let stderr = String::from_utf8_lossy(&stderr).into_owned();
                if status.success() {
                    debug!(duration_ms, stderr_len = stderr.len(), "Interpreter exited successfully");
                    ExecutionOutcome::Success { stdout }
                } else {
                    warn!(exit_code = ?status.code(), duration_ms, "Interpreter exited with failure");
                    ExecutionFailure::new(FailureKind::NonZeroExit, status.code(), stderr).into()
                }
            }
            Err(e) => {
                kill(&mut child).await;
                error!(error = %e, "Failed to collect interpreter output");
                ExecutionFailure::new(FailureKind::Io, None, e.to_string()).into()
            }
        }
    }
}

#[async_trait::async_trait]
impl CodeRunner for ProcessExecutor {
    async fn run(&self, code: &str, cwd: &Path, cancel: &CancellationToken) -> ExecutionOutcome {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ExecutionFailure::cancelled().into(),
            permit = self.semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "Failed to acquire execution slot");
                    return ExecutionFailure::new(FailureKind::SpawnError, None, e.to_string()).into();
                }
            },
        };

        self.execute(code, cwd, cancel).await
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill interpreter");
    }
}

/// Wait for exit while draining both pipes, so neither can fill and block
/// the child.
async fn wait_with_output<O, E>(
    child: &mut Child,
    stdout: Option<O>,
    stderr: Option<E>,
) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let (stdout, stderr) = tokio::try_join!(drain(stdout), drain(stderr))?;
    let status = child.wait().await?;
    Ok((status, stdout, stderr))
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
