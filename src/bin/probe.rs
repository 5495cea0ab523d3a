// src/bin/probe.rs
// Spawns an MCP server, runs the handshake, lists its tools and optionally
// calls one. Results go to stdout, logs to stderr.
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use zetmem::client::McpClient;
use zetmem::logging::{self, LogFormat};
use zetmem::runtime::McpProcess;

#[derive(Debug, Parser)]
#[command(name = "probe", version, about = "Exercise an MCP server over stdio")]
struct Args {
    /// Server executable
    #[arg(long, default_value = "target/debug/zetmem")]
    server: String,

    /// Argument passed to the server (repeatable)
    #[arg(long = "arg")]
    server_args: Vec<String>,

    /// Tool to call after listing
    #[arg(long)]
    tool: Option<String>,

    /// JSON object of tool arguments
    #[arg(long, default_value = "{}")]
    arguments: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init("info", LogFormat::Text)?;

    let arguments: Value =
        serde_json::from_str(&args.arguments).context("--arguments is not valid JSON")?;

    // 1. Spawn
    let server_args: Vec<&str> = args.server_args.iter().map(String::as_str).collect();
    let process = McpProcess::start(&args.server, &server_args)?;
    let mut client = McpClient::new(process);

    // 2. Handshake
    let init = client.initialize().await?;
    client.notify_initialized().await?;
    println!(
        "Connected to {} v{} (protocol {})",
        init.server_info.name, init.server_info.version, init.protocol_version
    );

    // 3. Discovery
    let listing = client.list_tools().await?;
    println!("{} tool(s):", listing.tools.len());
    for tool in &listing.tools {
        println!("  {} - {}", tool.name, tool.description);
    }
    if let Some(summary) = &listing.strategy_guide_summary {
        println!("Strategy: {summary}");
    }

    // 4. Optional call
    if let Some(tool) = &args.tool {
        let result = client.call_tool(tool, arguments).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    let status = client.shutdown().await?;
    tracing::info!(status = %status, "Server exited");
    Ok(())
}
