// src/protocol/mod.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub mod error;

pub use error::{codes, RpcError};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision advertised when the embedding application does not pick one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_LIST_TOOLS: &str = "tools/list";
pub const METHOD_CALL_TOOL: &str = "tools/call";
pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";

// 1. The Request Struct
// `jsonrpc` and `method` default to empty so that any JSON object decodes.
// A null id decodes to `None`, which makes the frame a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Option<Value>, id: Option<u64>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: id.map(Value::from),
        }
    }
}

// 2. The Notification Struct (no id field at all)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// One inbound line, classified.
#[derive(Debug)]
pub enum Frame {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Malformed(serde_json::Error),
}

impl Frame {
    /// Request decoding is attempted first; only a frame that yields a
    /// non-null id is a request. Anything else that still decodes is a
    /// notification, including a bare `null`, which decodes to an empty one.
    pub fn classify(line: &str) -> Frame {
        if let Ok(Some(JsonRpcRequest {
            id: Some(id),
            method,
            params,
            ..
        })) = serde_json::from_str::<Option<JsonRpcRequest>>(line)
        {
            return Frame::Request { id, method, params };
        }

        match serde_json::from_str::<Option<JsonRpcNotification>>(line) {
            Ok(Some(notification)) => Frame::Notification {
                method: notification.method,
                params: notification.params,
            },
            Ok(None) => Frame::Notification {
                method: String::new(),
                params: None,
            },
            Err(err) => Frame::Malformed(err),
        }
    }
}

// 3. The Response Structs
// What the client decodes. Either side may be missing on the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// What the server writes: exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Success {
        jsonrpc: &'static str,
        id: Value,
        result: Value,
    },
    Error {
        jsonrpc: &'static str,
        id: Value,
        error: JsonRpcError,
    },
}

impl Envelope {
    pub fn success(id: Value, result: Value) -> Self {
        Envelope::Success {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }

    pub fn error(id: Value, err: &RpcError) -> Self {
        Envelope::Error {
            jsonrpc: JSONRPC_VERSION,
            id,
            error: err.into(),
        }
    }

    pub fn id(&self) -> &Value {
        match self {
            Envelope::Success { id, .. } | Envelope::Error { id, .. } => id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error { .. })
    }
}

// --- MCP SPECIFIC TYPES ---

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    pub client_info: ClientInfo,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    pub experimental: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

// `tools` is not negotiated; the server always declares it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

// --- TOOL DISCOVERY TYPES ---

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_guide_summary: Option<String>,
}

/// The `tools/list` projection of a registered tool. The four discovery
/// fields are present only for tools exposing extended metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_triggers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_practices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synergies: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_snippets: Option<Vec<Value>>,
}

// --- TOOL INVOCATION TYPES ---

#[derive(Debug, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// A failure the tool reports in-band; the call itself still succeeds.
    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}
