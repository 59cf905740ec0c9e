//! One-shot initialization latch

use crate::error::Fatal;
use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks the single "initializing → initialized" transition
#[derive(Debug, Default)]
pub struct InitGate {
    initialized: AtomicBool,
}

impl InitGate {
    /// Create a latch in the initializing state
    pub fn new() -> Self {
        Self::default()
    }

    /// True until the first successful [`InitGate::mark_initialized`]
    pub fn is_initializing(&self) -> bool {
        !self.initialized.load(Ordering::Acquire)
    }

    /// Perform the transition; a second call is an invariant violation
    pub fn mark_initialized(&self) -> Result<(), Fatal> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(Fatal::DoubleInitialize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_transition() {
        let gate = InitGate::new();
        assert!(gate.is_initializing());
        assert_eq!(gate.mark_initialized(), Ok(()));
        assert!(!gate.is_initializing());
    }

    #[test]
    fn test_second_transition_is_fatal() {
        let gate = InitGate::new();
        gate.mark_initialized().unwrap();
        assert_eq!(gate.mark_initialized(), Err(Fatal::DoubleInitialize));
        assert!(!gate.is_initializing());
    }
}
