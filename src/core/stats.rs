//! Dispatch counters.
//!
//! Plain relaxed atomics updated by the publish path and the job runner;
//! [`DispatchStats`] is a consistent-enough snapshot for diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the dispatcher counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events accepted by `publish` (and written to the broadcast channel).
    pub published: u64,
    /// Jobs enqueued (publishes that found at least one handler).
    pub dispatched: u64,
    /// Jobs that finished executing.
    pub jobs_completed: u64,
    /// Handler invocations that completed successfully.
    pub handlers_completed: u64,
    /// Handler invocations that failed or panicked.
    pub handlers_failed: u64,
    /// Handler invocations cut off by the job deadline.
    pub handlers_timed_out: u64,
    /// Handler invocations cancelled by the caller or by shutdown.
    pub handlers_cancelled: u64,
    /// Jobs executing right now (holding a concurrency permit).
    pub in_flight: u64,
}

impl DispatchStats {
    /// Jobs enqueued but not yet finished (queued or in flight).
    pub fn pending_jobs(&self) -> u64 {
        self.dispatched.saturating_sub(self.jobs_completed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) published: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) jobs_completed: AtomicU64,
    pub(crate) handlers_completed: AtomicU64,
    pub(crate) handlers_failed: AtomicU64,
    pub(crate) handlers_timed_out: AtomicU64,
    pub(crate) handlers_cancelled: AtomicU64,
}

impl Counters {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, in_flight: usize) -> DispatchStats {
        DispatchStats {
            published: self.published.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            handlers_completed: self.handlers_completed.load(Ordering::Relaxed),
            handlers_failed: self.handlers_failed.load(Ordering::Relaxed),
            handlers_timed_out: self.handlers_timed_out.load(Ordering::Relaxed),
            handlers_cancelled: self.handlers_cancelled.load(Ordering::Relaxed),
            in_flight: in_flight as u64,
        }
    }
}
