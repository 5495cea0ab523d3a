// src/protocol/error.rs
use thiserror::Error;

use super::JsonRpcError;

/// Standard JSON-RPC 2.0 error codes
pub mod codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The frame is not acceptable in the current session state
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method (or tool) does not exist
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;
    /// The handler failed
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Every recoverable failure the dispatcher can report to a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("Invalid JSON")]
    Parse,

    #[error("Server not initialized")]
    NotInitialized,

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::Parse => codes::PARSE_ERROR,
            RpcError::NotInitialized => codes::INVALID_REQUEST,
            RpcError::MethodNotFound(_) | RpcError::ToolNotFound(_) => codes::METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => codes::INVALID_PARAMS,
            RpcError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Label used for the outcome dimension of metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::Parse => "parse_error",
            RpcError::NotInitialized => "invalid_request",
            RpcError::MethodNotFound(_) | RpcError::ToolNotFound(_) => "method_not_found",
            RpcError::InvalidParams(_) => "invalid_params",
            RpcError::Internal(_) => "internal_error",
        }
    }
}

impl From<&RpcError> for JsonRpcError {
    fn from(err: &RpcError) -> Self {
        JsonRpcError {
            code: err.code(),
            message: err.to_string(),
            data: None,
        }
    }
}
