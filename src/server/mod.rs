// src/server/mod.rs
//! The protocol engine: owns the tool registry and the handshake state, and
//! serves one client over a line-delimited byte stream.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::Config;
use crate::metrics::{MetricsSink, NopSink};
use crate::protocol::{ServerInfo, DEFAULT_PROTOCOL_VERSION};
use crate::runtime::{FrameReader, FrameWriter, TransportError};
use crate::shutdown::Shutdown;
use crate::tools::{CallContext, Tool, ToolRegistry};

mod dispatch;
mod state;

pub use state::{ProtocolState, SessionState};

pub struct McpServer {
    info: ServerInfo,
    protocol_version: String,
    strategy_summary: Option<String>,
    tool_timeout: Option<Duration>,
    registry: ToolRegistry,
    state: SessionState,
    metrics: Arc<dyn MetricsSink>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            strategy_summary: None,
            tool_timeout: None,
            registry: ToolRegistry::new(),
            state: SessionState::new(),
            metrics: Arc::new(NopSink),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut server = Self::new(&config.server.name, &config.server.version)
            .with_protocol_version(&config.server.protocol_version)
            .with_strategy_summary(&config.onboarding.summary);
        server.tool_timeout = config.tool_timeout();
        server
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    pub fn with_strategy_summary(mut self, summary: impl Into<String>) -> Self {
        self.strategy_summary = Some(summary.into());
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register before serving. A tool with an existing name replaces it.
    pub fn register_tool<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.registry.register(Arc::new(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        self.registry.register(tool);
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.state.current()
    }

    /// Serve stdin/stdout until the client disconnects or `shutdown` fires.
    pub async fn start(&self, shutdown: Shutdown) -> Result<(), TransportError> {
        self.serve(tokio::io::stdin(), tokio::io::stdout(), shutdown)
            .await
    }

    /// The serving loop. Frames are handled strictly one at a time: each is
    /// classified, dispatched and answered before the next is taken.
    ///
    /// Returns `Ok(())` on end of stream and on shutdown. Shutdown abandons
    /// the frame in flight without writing anything. Only a failed write is
    /// an error.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        writer: W,
        shutdown: Shutdown,
    ) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            server = %self.info.name,
            tools = self.registry.len(),
            "Starting MCP server"
        );

        let mut frames = FrameReader::spawn(reader);
        let mut writer = FrameWriter::new(writer);
        let ctx = CallContext::new(shutdown.clone());

        loop {
            let line = tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                line = frames.next_frame() => line,
            };

            let Some(line) = line else {
                tracing::info!("Client disconnected");
                return Ok(());
            };

            let reply = tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                reply = self.handle_line(&line, &ctx) => reply,
            };

            if let Some(envelope) = reply {
                if let Err(e) = writer.write_frame(&envelope).await {
                    tracing::error!(error = %e, "Failed to write response, closing session");
                    return Err(e);
                }
            }
        }

        tracing::info!("MCP server shutting down");
        Ok(())
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("info", &self.info)
            .field("protocol_version", &self.protocol_version)
            .field("state", &self.state.current())
            .field("registry", &self.registry)
            .finish()
    }
}
