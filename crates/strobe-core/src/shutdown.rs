//! Process-wide shutdown signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared shutdown flag checked by the dispatcher and by millisecond delays
///
/// Clones observe the same flag. Once raised it is never lowered.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create a new, lowered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether shutdown has been requested
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
