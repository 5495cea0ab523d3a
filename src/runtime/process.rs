// src/runtime/process.rs
use anyhow::{anyhow, Context, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::FrameWriter;
use crate::protocol::JsonRpcRequest;

// A server running as a child process, spoken to over its stdio.
pub struct McpProcess {
    // We keep the child handle so we can stop it
    pub child: Child,
    pub stdin: FrameWriter<ChildStdin>,
    pub stdout: BufReader<ChildStdout>,
}

impl McpProcess {
    pub fn start(command: &str, args: &[&str]) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args);

        // Pipe the streams, or the child inherits OUR terminal.
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // server logs go to our stderr
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server: {command}"))?;

        let stdin = child.stdin.take().ok_or(anyhow!("Failed to open stdin"))?;
        let stdout = child.stdout.take().ok_or(anyhow!("Failed to open stdout"))?;

        Ok(Self {
            child,
            stdin: FrameWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    pub async fn send_request(&mut self, request: &JsonRpcRequest) -> Result<()> {
        self.stdin
            .write_frame(request)
            .await
            .context("Failed to send frame to MCP server")
    }

    // Wait for ONE line
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let bytes_read = self.stdout.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Err(anyhow!("Process closed the connection (EOF)"));
        }

        Ok(line)
    }

    /// Close the server's stdin and wait for it to exit.
    pub async fn shutdown(self) -> Result<std::process::ExitStatus> {
        let McpProcess {
            mut child, stdin, ..
        } = self;
        drop(stdin.into_inner());
        child.wait().await.context("Failed to wait for MCP server")
    }
}
