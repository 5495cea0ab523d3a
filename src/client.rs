// src/client.rs
//! A minimal client for driving an MCP server over a child process's stdio.
//! Used by the `probe` binary and the end-to-end tests.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::protocol::{
    ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, DEFAULT_PROTOCOL_VERSION, METHOD_CALL_TOOL,
    METHOD_INITIALIZE, METHOD_LIST_TOOLS, NOTIFICATION_INITIALIZED,
};
use crate::runtime::McpProcess;

pub struct McpClient {
    transport: McpProcess,
    request_id_counter: u64,
}

impl McpClient {
    pub fn new(transport: McpProcess) -> Self {
        Self {
            transport,
            request_id_counter: 0,
        }
    }

    // 1. The Handshake
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities { experimental: None },
            client_info: ClientInfo {
                name: "zetmem-probe".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result: InitializeResult = self
            .request(METHOD_INITIALIZE, Some(serde_json::to_value(params)?))
            .await
            .context("MCP initialize failed")?;

        tracing::info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "Handshake complete"
        );
        Ok(result)
    }

    /// Sends `notifications/initialized`. No reply is expected.
    pub async fn notify_initialized(&mut self) -> Result<()> {
        let notification = JsonRpcRequest::new(NOTIFICATION_INITIALIZED, None, None);
        self.transport.send_request(&notification).await
    }

    pub async fn list_tools(&mut self) -> Result<ListToolsResult> {
        self.request(METHOD_LIST_TOOLS, None)
            .await
            .context("Failed to list tools")
    }

    /// Returns the raw `result` of a `tools/call`.
    pub async fn call_tool(&mut self, tool_name: &str, arguments: Value) -> Result<Value> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments
        });

        self.request(METHOD_CALL_TOOL, Some(params))
            .await
            .with_context(|| format!("Tool '{tool_name}' failed"))
    }

    /// Closes the server's stdin and waits for it to exit.
    pub async fn shutdown(self) -> Result<std::process::ExitStatus> {
        self.transport.shutdown().await
    }

    // Send one request and wait for its reply. The server answers in order,
    // so the next line is ours.
    async fn request<T: DeserializeOwned>(&mut self, method: &str, params: Option<Value>) -> Result<T> {
        let request = JsonRpcRequest::new(method, params, Some(self.next_id()));
        self.transport.send_request(&request).await?;

        let line = self.transport.read_line().await?;
        let response: JsonRpcResponse = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse {method} response"))?;

        if let Some(err) = response.error {
            return Err(anyhow!("{} (code {})", err.message, err.code));
        }

        let result = response
            .result
            .ok_or_else(|| anyhow!("Server returned no result for {method}"))?;
        serde_json::from_value(result).with_context(|| format!("Unexpected {method} result format"))
    }

    fn next_id(&mut self) -> u64 {
        self.request_id_counter += 1;
        self.request_id_counter
    }
}
