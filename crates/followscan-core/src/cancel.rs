//! Cooperative cancellation for pipeline runs.

use crate::error::FollowscanError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Cancelling any clone is observed by all clones.
///
/// ```
/// use followscan_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker = token.clone();
/// token.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(FollowscanError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), FollowscanError> {
        if self.is_cancelled() {
            Err(FollowscanError::Cancelled)
        } else {
            Ok(())
        }
    }
}
