// src/server/dispatch.rs
use serde_json::{Map, Value};

use super::McpServer;
use crate::metrics::{Timer, OUTCOME_OK};
use crate::protocol::{
    Envelope, Frame, InitializeResult, ListToolsResult, RpcError, ServerCapabilities,
    METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_LIST_TOOLS, NOTIFICATION_INITIALIZED,
};
use crate::tools::CallContext;

// Metric label for anything the server does not know by name.
const UNKNOWN_LABEL: &str = "unknown";

fn method_label(method: &str) -> &'static str {
    match method {
        METHOD_INITIALIZE => METHOD_INITIALIZE,
        METHOD_LIST_TOOLS => METHOD_LIST_TOOLS,
        METHOD_CALL_TOOL => METHOD_CALL_TOOL,
        NOTIFICATION_INITIALIZED => NOTIFICATION_INITIALIZED,
        _ => UNKNOWN_LABEL,
    }
}

impl McpServer {
    /// Classifies one inbound line and produces the reply to write, if any.
    /// Notifications never produce a reply, not even an error.
    pub async fn handle_line(&self, line: &str, ctx: &CallContext) -> Option<Envelope> {
        match Frame::classify(line) {
            Frame::Request { id, method, params } => {
                Some(self.handle_request(id, &method, params, ctx).await)
            }
            Frame::Notification { method, .. } => {
                self.handle_notification(&method);
                None
            }
            Frame::Malformed(err) => {
                tracing::warn!(error = %err, "Failed to parse frame");
                self.metrics.inc_parse_errors();
                Some(Envelope::error(Value::Null, &RpcError::Parse))
            }
        }
    }

    pub async fn handle_request(
        &self,
        id: Value,
        method: &str,
        params: Option<Value>,
        ctx: &CallContext,
    ) -> Envelope {
        tracing::debug!(method = %method, id = %id, "Handling request");
        let mut timer = Timer::dispatch(self.metrics.as_ref(), method_label(method));

        let outcome = match method {
            METHOD_INITIALIZE => self.handle_initialize(),
            METHOD_LIST_TOOLS => self.handle_list_tools(),
            METHOD_CALL_TOOL => self.handle_call_tool(params, ctx).await,
            _ => Err(RpcError::MethodNotFound(method.to_string())),
        };

        match outcome {
            Ok(result) => {
                timer.set_outcome(OUTCOME_OK);
                Envelope::success(id, result)
            }
            Err(err) => {
                timer.set_outcome(err.kind());
                tracing::debug!(method = %method, code = err.code(), error = %err, "Request failed");
                Envelope::error(id, &err)
            }
        }
    }

    // Client params are accepted but not validated or negotiated.
    fn handle_initialize(&self) -> Result<Value, RpcError> {
        self.state.mark_initialized();
        tracing::info!(server = %self.info.name, "MCP server initialized");

        to_result(&InitializeResult {
            protocol_version: self.protocol_version.clone(),
            capabilities: ServerCapabilities::default(),
            server_info: self.info.clone(),
        })
    }

    fn handle_list_tools(&self) -> Result<Value, RpcError> {
        self.state.require_initialized()?;

        to_result(&ListToolsResult {
            tools: self.registry.describe_all(),
            strategy_guide_summary: self.strategy_summary.clone(),
        })
    }

    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        ctx: &CallContext,
    ) -> Result<Value, RpcError> {
        self.state.require_initialized()?;

        // 1. Params must be an object carrying a string name
        let Some(Value::Object(mut params)) = params else {
            return Err(RpcError::InvalidParams("Invalid params".into()));
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(RpcError::InvalidParams("Tool name required".into())),
        };

        // 2. Lookup
        let tool = self
            .registry
            .get(&name)
            .ok_or_else(|| RpcError::ToolNotFound(name.clone()))?;

        // 3. Arguments fall back to an empty object
        let arguments = match params.remove("arguments") {
            Some(Value::Object(arguments)) => arguments,
            _ => Map::new(),
        };

        tracing::info!(tool = %name, arguments = ?arguments, "Executing tool");

        // 4. Execute under the call deadline, if one is configured
        let ctx = match self.tool_timeout {
            Some(timeout) => ctx.clone().with_timeout(timeout),
            None => ctx.clone(),
        };
        let mut timer = Timer::tool_call(self.metrics.as_ref(), tool.name());
        let execution = tool.execute(&ctx, arguments);
        let result = match ctx.deadline() {
            Some(deadline) => match tokio::time::timeout_at(deadline, execution).await {
                Ok(result) => result,
                Err(_) => {
                    timer.set_outcome("timeout");
                    tracing::warn!(tool = %name, "Tool execution timed out");
                    return Err(RpcError::Internal(format!(
                        "Tool '{name}' timed out before completing"
                    )));
                }
            },
            None => execution.await,
        };

        match result {
            Ok(result) => {
                timer.set_outcome(OUTCOME_OK);
                to_result(&result)
            }
            Err(err) => {
                timer.set_outcome("error");
                let message = format!("{err:#}");
                tracing::error!(tool = %name, error = %message, "Tool execution failed");
                Err(RpcError::Internal(message))
            }
        }
    }

    pub fn handle_notification(&self, method: &str) {
        self.metrics.inc_notifications(method_label(method));
        match method {
            NOTIFICATION_INITIALIZED => tracing::debug!("Client initialized notification received"),
            _ => tracing::debug!(method = %method, "Unknown notification ignored"),
        }
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.to_string()))
}
