// src/runtime/mod.rs
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

mod process;

pub use process::McpProcess;

/// Frames buffered between the reader task and the serving loop.
pub const FRAME_QUEUE_DEPTH: usize = 32;

/// A stream that fails this many times in a row is treated as disconnected.
pub const MAX_CONSECUTIVE_READ_ERRORS: usize = 16;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write frame: {0}")]
    Io(#[from] io::Error),
}

// The "Ear": a dedicated task reads lines and publishes them on a queue,
// so the serving loop can select between the next frame and shutdown.
pub struct FrameReader {
    frames: mpsc::Receiver<String>,
    task: JoinHandle<()>,
}

impl FrameReader {
    pub fn spawn<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, frames) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let task = tokio::spawn(read_frames(reader, tx));
        Self { frames, task }
    }

    /// The next line, or `None` once the stream is closed.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.frames.recv().await
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_frames<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut failures = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                tracing::debug!("Input stream closed");
                return;
            }
            Ok(_) => {
                failures = 0;
                // Undecodable bytes become U+FFFD; the frame still gets a reply.
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(line).await.is_err() {
                    return; // serving loop is gone
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(error = %e, "Error reading frame");
            }
        }

        if failures >= MAX_CONSECUTIVE_READ_ERRORS {
            tracing::error!(failures, "Input stream keeps failing, closing session");
            return;
        }
    }
}

// The "Pipe" we speak into. One call writes one whole frame.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_frame<T>(&mut self, frame: &T) -> Result<(), TransportError>
    where
        T: Serialize + ?Sized,
    {
        // Serialize first so a failed encode never leaves half a frame behind.
        let mut bytes = serde_json::to_vec(frame)?;
        bytes.push(b'\n');

        self.inner.write_all(&bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn reader_yields_lines_then_none() {
        let input: &[u8] = b"{\"a\":1}\n{\"b\":2}\n";
        let mut frames = FrameReader::spawn(input);

        assert_eq!(frames.next_frame().await.as_deref(), Some("{\"a\":1}\n"));
        assert_eq!(frames.next_frame().await.as_deref(), Some("{\"b\":2}\n"));
        assert_eq!(frames.next_frame().await, None);
    }

    #[tokio::test]
    async fn last_line_without_newline_is_still_a_frame() {
        let input: &[u8] = b"first\nsecond";
        let mut frames = FrameReader::spawn(input);

        assert_eq!(frames.next_frame().await.as_deref(), Some("first\n"));
        assert_eq!(frames.next_frame().await.as_deref(), Some("second"));
        assert_eq!(frames.next_frame().await, None);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_dropped() {
        let input: &[u8] = b"caf\xe9\n{\"ok\":true}\n";
        let mut frames = FrameReader::spawn(input);

        assert_eq!(frames.next_frame().await.as_deref(), Some("caf\u{FFFD}\n"));
        assert_eq!(frames.next_frame().await.as_deref(), Some("{\"ok\":true}\n"));
        assert_eq!(frames.next_frame().await, None);
    }

    #[tokio::test]
    async fn writer_emits_one_terminated_line_per_frame() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(server);

        writer.write_frame(&json!({"id": 1})).await.unwrap();
        writer.write_frame(&json!({"id": 2})).await.unwrap();
        drop(writer);

        let mut out = String::new();
        let mut client = client;
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "{\"id\":1}\n{\"id\":2}\n");
    }
}
