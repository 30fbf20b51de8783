//! # In-flight job tracker.
//!
//! Records which jobs are executing so a shutdown that exceeds its grace
//! period can name them.
//!
//! ## Rules
//! - A job is tracked from the moment it holds a concurrency permit until its
//!   guard drops (normal completion, panic, or abort alike).
//! - Entries are keyed by envelope sequence number and rendered as
//!   `EventType#event_id`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::events::Envelope;

/// Thread-safe set of executing jobs.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    jobs: Mutex<HashMap<u64, String>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `env`; the entry is removed when the guard drops.
    pub(crate) fn track<'a>(&'a self, env: &Envelope) -> InFlightGuard<'a> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(env.seq, format!("{}#{}", env.event_type, env.id));
        InFlightGuard {
            owner: self,
            seq: env.seq,
        }
    }

    /// Sorted labels of the jobs currently executing.
    pub(crate) fn snapshot(&self) -> Vec<String> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut seqs: Vec<(&u64, &String)> = jobs.iter().collect();
        seqs.sort_unstable_by_key(|(seq, _)| **seq);
        seqs.into_iter().map(|(_, label)| label.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Removes its job from the tracker on drop.
pub(crate) struct InFlightGuard<'a> {
    owner: &'a InFlight,
    seq: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use std::sync::Arc;

    struct Job(&'static str);
    impl Event for Job {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn guard_tracks_until_drop_in_publish_order() {
        let tracker = InFlight::new();
        let a = Envelope::new(Arc::new(Job("a")));
        let b = Envelope::new(Arc::new(Job("b")));

        let gb = tracker.track(&b);
        let ga = tracker.track(&a);
        assert_eq!(tracker.snapshot(), vec!["Job#a", "Job#b"]);

        drop(ga);
        assert_eq!(tracker.snapshot(), vec!["Job#b"]);
        drop(gb);
        assert_eq!(tracker.len(), 0);
    }
}
