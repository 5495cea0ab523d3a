// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use zetmem::config::Config;
use zetmem::logging::{self, LogFormat};
use zetmem::metrics::PrometheusMetrics;
use zetmem::shutdown::{self, ShutdownTrigger};
use zetmem::tools::StrategyGuideTool;
use zetmem::McpServer;

const DEFAULT_ENV_FILE: &str = ".env";

/// ZetMem MCP server over stdio.
#[derive(Debug, Parser)]
#[command(name = "zetmem", version, about)]
struct Cli {
    /// JSON config file layered over the environment
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dotenv file loaded before reading the environment [default: .env]
    #[arg(long)]
    env: Option<PathBuf>,

    /// Overrides ZETMEM_LOG_LEVEL (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Environment, then config. Logging is not up yet, so keep the
    // dotenv outcome for later.
    let env_path = cli.env.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));
    let dotenv_result = dotenv::from_path(&env_path);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.server.log_level = level;
        config.validate().context("Invalid --log-level")?;
    }

    // 2. Logging
    logging::init(&config.server.log_level, cli.log_format)?;
    if let Err(e) = dotenv_result {
        // Only worth a warning when the file was asked for by name.
        if cli.env.is_some() {
            tracing::warn!(path = %env_path.display(), error = %e, "No .env file loaded");
        } else {
            tracing::debug!(path = %env_path.display(), error = %e, "No .env file loaded");
        }
    }

    // 3. Runtime. A blocked stdin read must not hold up exit.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(
        name = %config.server.name,
        version = %config.server.version,
        "Starting ZetMem MCP Server"
    );

    let metrics = if config.monitoring.enabled {
        Some(Arc::new(PrometheusMetrics::new()?))
    } else {
        None
    };

    let mut server = McpServer::from_config(&config);
    if let Some(metrics) = &metrics {
        server = server.with_metrics(metrics.clone());
    }
    server.register_tool(StrategyGuideTool::new(&config.onboarding));

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(wait_for_signal(trigger));

    let served = server.start(signal).await;

    if let Some(metrics) = &metrics {
        match metrics.render() {
            Ok(text) => tracing::debug!(metrics = %text, "Final metrics"),
            Err(e) => tracing::warn!(error = %e, "Failed to render metrics"),
        }
    }

    served.context("MCP server failed")?;
    tracing::info!("ZetMem MCP Server shutdown complete");
    Ok(())
}

async fn wait_for_signal(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = shutdown::signal_or_pending(tokio::signal::ctrl_c(), "ctrl-c") => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                shutdown::signal_or_pending(tokio::signal::ctrl_c(), "ctrl-c").await;
            }
        }
    }
    #[cfg(not(unix))]
    shutdown::signal_or_pending(tokio::signal::ctrl_c(), "ctrl-c").await;

    tracing::info!("Received shutdown signal");
    trigger.trigger();
}
