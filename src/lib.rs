// src/lib.rs
//! ZetMem's MCP protocol engine: JSON-RPC 2.0 over newline-delimited stdio,
//! a handshake-gated dispatcher and a registry of async tools.

pub mod client;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod runtime;
pub mod server;
pub mod shutdown;
pub mod tools;

pub use config::Config;
pub use server::McpServer;
pub use tools::{CallContext, EnhancedTool, Tool, ToolRegistry};
