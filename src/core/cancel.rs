//! Cooperative cancellation.
//!
//! The pipeline is sequential and blocking; instead of threading an async
//! context everywhere, a single [`Cancellation`] token is passed down and
//! polled at coarse boundaries (before each file in a walk, before each
//! artifact fetch, between download chunks). File copies are not interrupted
//! mid-stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::GokError;

/// Shared cancellation flag.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    /// Create a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Poll the token, returning [`GokError::Cancelled`] once cancellation
    /// has been requested.
    pub fn check(&self) -> Result<(), GokError> {
        if self.is_cancelled() {
            Err(GokError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Spawn a background task that flips this token on Ctrl-C.
    pub fn install_ctrl_c_handler(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                token.cancel();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_starts_clear() {
        let token = Cancellation::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let token = Cancellation::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(GokError::Cancelled)));
    }
}
