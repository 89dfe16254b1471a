//! Cooperative cancellation.
//!
//! The task layer may revoke a job at any time; the engine polls the token
//! at coarse checkpoints (after each rank, fault, section or tunnel-segment
//! batch) and bails out with [`crate::error::StrataError::Cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, StrataError};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observed at the next checkpoint.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Checkpoint: error out if the job was revoked.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(StrataError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_passes_checkpoints() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancelled_token_fails_checkpoints() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(matches!(token.check(), Err(StrataError::Cancelled)));
    }
}
