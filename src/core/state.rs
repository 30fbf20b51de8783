//! Engine lifecycle state.
//!
//! ```text
//! Accepting ──wait_for_completion()/shutdown()──► Draining ──queue drained──► Stopped
//! ```
//! Transitions only move forward.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`Dispatcher`](crate::Dispatcher).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EngineState {
    /// Normal operation: publishes are accepted.
    Accepting,
    /// No new jobs are accepted; queued and running jobs finish.
    Draining,
    /// Terminal; every publish fails fast.
    Stopped,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => EngineState::Accepting,
            1 => EngineState::Draining,
            _ => EngineState::Stopped,
        }
    }
}

/// Atomic cell holding an [`EngineState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(EngineState::Accepting as u8))
    }

    pub(crate) fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves forward to `next`; never moves backwards.
    ///
    /// Returns `true` if the state changed.
    pub(crate) fn advance(&self, next: EngineState) -> bool {
        self.0.fetch_max(next as u8, Ordering::AcqRel) < next as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_forward() {
        let s = StateCell::new();
        assert_eq!(s.get(), EngineState::Accepting);
        assert!(s.advance(EngineState::Draining));
        assert!(!s.advance(EngineState::Draining));
        assert!(!s.advance(EngineState::Accepting));
        assert_eq!(s.get(), EngineState::Draining);
        assert!(s.advance(EngineState::Stopped));
        assert_eq!(s.get(), EngineState::Stopped);
    }
}
