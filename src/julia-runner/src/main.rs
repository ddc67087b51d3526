//! julia-runner - main entry point.
//!
//! Serves the Julia tools over MCP on stdin/stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

use julia_mcp_server::McpServerBuilder;
use julia_mcp_server::julia_mcp_types::LogLevel as McpLogLevel;
use julia_runner::cli::{Cli, Command};
use julia_runner::{
    INSTRUCTIONS, RequestDispatcher, RunnerConfig, SERVER_NAME, ToolRegistry, VERSION,
};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the stderr subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_logging(level: &str) -> FilterHandle {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    handle
}

fn print_tools() -> Result<()> {
    let tools = ToolRegistry::new().list_tools();
    let json = serde_json::to_string_pretty(&tools).context("Failed to serialize tools")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Tools) = cli.command {
        return print_tools();
    }

    let mut config =
        RunnerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    let filter = init_logging(&config.log_level);

    if let Err(e) = which::which(&config.julia_path) {
        warn!(
            julia = %config.julia_path,
            error = %e,
            "Julia executable not found; tool calls will fail until it is installed"
        );
    }

    let dispatcher =
        RequestDispatcher::from_config(&config).context("Failed to set up dispatcher")?;
    info!(
        project_dir = %dispatcher.project_dir().display(),
        julia = %config.julia_path,
        timeout_secs = config.timeout_secs,
        max_concurrent = config.max_concurrent,
        validate_names = config.validate_names,
        "Starting julia-runner"
    );

    McpServerBuilder::new(SERVER_NAME, VERSION)
        .tool_handler(Arc::new(dispatcher))
        .instructions(INSTRUCTIONS)
        .on_log_level(move |level: McpLogLevel| {
            if let Err(e) = filter.reload(EnvFilter::new(level.as_filter_str())) {
                warn!(error = %e, "Failed to apply log level");
            }
        })
        .build_and_run_stdio()
        .await
}
