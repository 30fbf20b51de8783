//! # All-events broadcast channel.
//!
//! [`BroadcastChannel`] receives **every** published event, whether or not
//! handlers are registered for its type. It exists for diagnostics and
//! observability.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Cursors (many, independent):
//!   publish::<A>() ──┐                ┌──► [queue] EventStream #1
//!   publish::<B>() ──┼──► channel ────┼──► [queue] EventStream #2
//!   publish::<C>() ──┘                └──► [queue] Observer worker (ObserverSet)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits on subscribers.
//! - **No replay**: a stream only sees events sent after it subscribed.
//! - **Lossless cursors**: each stream owns an unbounded queue, so a slow
//!   stream only grows its own backlog. It never misses an event and never
//!   blocks the publisher or other streams.
//! - **Completion**: after [`complete`](BroadcastChannel::complete) every
//!   stream drains what it already buffered and then ends.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::envelope::Envelope;
use super::stream::EventStream;

/// Multicast stream of every published [`Envelope`].
///
/// Cheap to clone; all clones share the same channel.
#[derive(Clone, Debug)]
pub struct BroadcastChannel {
    // `None` once completed.
    subscribers: Arc<Mutex<Option<Vec<mpsc::UnboundedSender<Envelope>>>>>,
}

impl BroadcastChannel {
    /// Creates an open channel with no streams.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    /// Publishes an envelope to all current streams.
    ///
    /// Returns the number of streams that will observe it. Dropped streams
    /// are pruned here. After [`complete`](Self::complete) the envelope is
    /// discarded and `0` is returned.
    pub fn publish(&self, env: Envelope) -> usize {
        let mut guard = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = guard.as_mut() else {
            return 0;
        };
        subs.retain(|tx| tx.send(env.clone()).is_ok());
        subs.len()
    }

    /// Attaches a new independent cursor.
    ///
    /// Subscribing to a completed channel yields a stream that ends immediately.
    pub fn subscribe(&self) -> EventStream {
        let mut guard = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(subs) => {
                let (tx, rx) = mpsc::unbounded_channel();
                subs.push(tx);
                EventStream::new(rx)
            }
            None => EventStream::closed(),
        }
    }

    /// Signals that no more events will ever be published.
    ///
    /// Idempotent.
    pub fn complete(&self) {
        let taken = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subs) = taken {
            debug!(streams = subs.len(), "broadcast channel completed");
        }
    }

    /// Returns `true` once [`complete`](Self::complete) was called.
    pub fn is_completed(&self) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Number of live streams.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new()
    }
}
