// src/server/state.rs
use std::sync::atomic::{AtomicBool, Ordering};

use crate::protocol::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Uninitialized,
    Initialized,
}

/// Handshake state. The only transition is Uninitialized -> Initialized,
/// and nothing resets it.
#[derive(Debug, Default)]
pub struct SessionState {
    initialized: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ProtocolState {
        if self.initialized.load(Ordering::Acquire) {
            ProtocolState::Initialized
        } else {
            ProtocolState::Uninitialized
        }
    }

    /// Returns the state before the call; re-initializing is allowed.
    pub fn mark_initialized(&self) -> ProtocolState {
        if self.initialized.swap(true, Ordering::AcqRel) {
            ProtocolState::Initialized
        } else {
            ProtocolState::Uninitialized
        }
    }

    pub fn require_initialized(&self) -> Result<(), RpcError> {
        match self.current() {
            ProtocolState::Initialized => Ok(()),
            ProtocolState::Uninitialized => Err(RpcError::NotInitialized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized_and_gates() {
        let state = SessionState::new();
        assert_eq!(state.current(), ProtocolState::Uninitialized);
        assert_eq!(state.require_initialized(), Err(RpcError::NotInitialized));
    }

    #[test]
    fn initialize_is_idempotent() {
        let state = SessionState::new();
        assert_eq!(state.mark_initialized(), ProtocolState::Uninitialized);
        assert_eq!(state.mark_initialized(), ProtocolState::Initialized);
        assert_eq!(state.current(), ProtocolState::Initialized);
        assert!(state.require_initialized().is_ok());
    }
}
