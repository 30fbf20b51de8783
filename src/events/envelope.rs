//! # Type-erased event envelope.
//!
//! [`Envelope`] carries one published event through the broadcast channel and
//! the dispatch queue. It keeps the original `Arc<E>` (no copy), the runtime
//! [`EventType`] discriminator, the event identifier and publish metadata.
//!
//! ## Ordering
//! Each envelope has a globally unique sequence number (`seq`) that increases
//! monotonically in publish order. Use `seq` to restore order when observers
//! receive envelopes concurrently.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use super::event::{Event, EventType};

/// Global sequence counter for envelope ordering.
static ENVELOPE_SEQ: AtomicU64 = AtomicU64::new(0);

/// One published event, erased to `dyn Any`.
///
/// - `seq`: monotonic global sequence
/// - `at`: wall-clock timestamp of the publish call
/// - `event_type`: dispatch key
/// - `id`: the event's own identifier
#[derive(Clone)]
pub struct Envelope {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Runtime type discriminator.
    pub event_type: EventType,
    /// Event identifier (copied from [`Event::id`]).
    pub id: Arc<str>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    /// Wraps a shared event, assigning the next sequence number.
    pub fn new<E: Event>(event: Arc<E>) -> Self {
        Self {
            seq: ENVELOPE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            event_type: EventType::of::<E>(),
            id: Arc::from(event.id()),
            payload: event,
        }
    }

    /// Returns `true` if the payload is an `E`.
    #[inline]
    pub fn is<E: Event>(&self) -> bool {
        self.payload.is::<E>()
    }

    /// Borrows the payload as `E`.
    #[inline]
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Recovers the original `Arc<E>` (same allocation that was published).
    #[inline]
    pub fn downcast<E: Event>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.payload).downcast::<E>().ok()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("seq", &self.seq)
            .field("event_type", &self.event_type.name())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping {
        id: String,
    }

    impl Event for Ping {
        fn id(&self) -> &str {
            &self.id
        }
    }

    struct Pong;

    impl Event for Pong {
        fn id(&self) -> &str {
            "pong"
        }
    }

    #[test]
    fn downcast_returns_same_allocation() {
        let ev = Arc::new(Ping { id: "p1".into() });
        let env = Envelope::new(Arc::clone(&ev));

        assert!(env.is::<Ping>());
        assert!(!env.is::<Pong>());
        assert_eq!(&*env.id, "p1");
        assert_eq!(env.event_type, EventType::of::<Ping>());

        let back = env.downcast::<Ping>().unwrap();
        assert!(Arc::ptr_eq(&ev, &back));
        assert!(env.downcast::<Pong>().is_none());
        assert_eq!(env.downcast_ref::<Ping>().map(|p| p.id.as_str()), Some("p1"));
    }

    #[test]
    fn sequence_is_monotonic() {
        let a = Envelope::new(Arc::new(Pong));
        let b = Envelope::new(Arc::new(Pong));
        assert!(b.seq > a.seq);
    }
}
