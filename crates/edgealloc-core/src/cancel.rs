//! Cooperative cancellation.
//!
//! Allocators poll a [`CancelToken`] between iterations or between task
//! commits. Lock-free and safe to share across threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A clonable flag that requests an allocator to stop early.
///
/// All clones observe the same flag. Cancellation is sticky until
/// [`reset`](Self::reset) is called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Convenience for optional tokens.
pub fn is_cancelled(token: Option<&CancelToken>) -> bool {
    token.is_some_and(CancelToken::is_cancelled)
}
