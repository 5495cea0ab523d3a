//! Drives the real `zetmem` binary over its stdio with the bundled client.

use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use zetmem::client::McpClient;
use zetmem::protocol::{JsonRpcRequest, JsonRpcResponse, DEFAULT_PROTOCOL_VERSION};
use zetmem::runtime::McpProcess;

const SERVER: &str = env!("CARGO_BIN_EXE_zetmem");
const ARGS: [&str; 4] = ["--env", "/nonexistent/.env", "--log-level", "error"];
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn handshake_list_and_call_over_stdio() {
    let process = McpProcess::start(SERVER, &ARGS).expect("Failed to spawn server");
    let mut client = McpClient::new(process);

    let init = timeout(STEP_TIMEOUT, client.initialize())
        .await
        .expect("initialize timed out")
        .unwrap();
    assert_eq!(init.protocol_version, DEFAULT_PROTOCOL_VERSION);
    assert_eq!(init.server_info.name, "ZetMem MCP Server");

    client.notify_initialized().await.unwrap();

    let listing = timeout(STEP_TIMEOUT, client.list_tools())
        .await
        .expect("tools/list timed out")
        .unwrap();
    let names: Vec<&str> = listing.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["strategy_guide"]);
    assert!(listing.tools[0].usage_triggers.is_some());
    assert!(listing.strategy_guide_summary.is_some());

    let result = timeout(
        STEP_TIMEOUT,
        client.call_tool(
            "strategy_guide",
            json!({"project_name": "ledger", "include_strategy_guide": false}),
        ),
    )
    .await
    .expect("tools/call timed out")
    .unwrap();
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("**Name**: ledger"));

    let err = client
        .call_tool("nonexistent", json!({}))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Tool not found: nonexistent"));

    // Closing stdin ends the session with a clean exit.
    let status = timeout(STEP_TIMEOUT, client.shutdown())
        .await
        .expect("server did not exit")
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn garbage_before_handshake_does_not_kill_the_server() {
    let mut process = McpProcess::start(SERVER, &ARGS).expect("Failed to spawn server");

    process
        .stdin
        .write_frame(&json!("not a request"))
        .await
        .unwrap();
    let reply: JsonRpcResponse = serde_json::from_str(&process.read_line().await.unwrap()).unwrap();
    assert_eq!(reply.error.unwrap().code, -32700);

    process
        .send_request(&JsonRpcRequest::new("tools/list", None, Some(1)))
        .await
        .unwrap();
    let reply: JsonRpcResponse = serde_json::from_str(&process.read_line().await.unwrap()).unwrap();
    assert_eq!(reply.id, json!(1));
    assert_eq!(reply.error.unwrap().code, -32600);

    let status = timeout(STEP_TIMEOUT, process.shutdown())
        .await
        .expect("server did not exit")
        .unwrap();
    assert!(status.success());
}

// Runs the server with stdin already closed and returns what it logged.
async fn stderr_of(args: &[&str]) -> String {
    let mut command = Command::new(SERVER);
    command
        .args(args)
        .current_dir(std::env::temp_dir())
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let output = timeout(STEP_TIMEOUT, command.output())
        .await
        .expect("server did not exit on closed stdin")
        .unwrap();
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[tokio::test]
async fn missing_env_file_is_quiet_unless_named() {
    let quiet = stderr_of(&["--log-level", "warn", "--log-format", "text"]).await;
    assert!(!quiet.contains("No .env file loaded"), "unexpected warning: {quiet}");

    let named = stderr_of(&[
        "--env",
        "/nonexistent/.env",
        "--log-level",
        "warn",
        "--log-format",
        "text",
    ])
    .await;
    assert!(named.contains("No .env file loaded"));
}
