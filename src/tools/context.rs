// src/tools/context.rs
use std::time::Duration;
use tokio::time::Instant;

use crate::shutdown::Shutdown;

/// Handed to every tool invocation: the session's cancellation signal and an
/// optional deadline for the call.
#[derive(Debug, Clone)]
pub struct CallContext {
    shutdown: Shutdown,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            deadline: None,
        }
    }

    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::new(Shutdown::never())
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_triggered() || self.remaining() == Some(Duration::ZERO)
    }

    /// Resolves when the session shuts down or the deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.shutdown.triggered() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            },
            None => self.shutdown.triggered().await,
        }
    }
}
