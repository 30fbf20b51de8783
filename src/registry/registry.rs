//! # Listener registry - typed handler lookup with copy-on-write slots.
//!
//! Maps each [`EventType`] to the list of handlers registered for it.
//!
//! ## Architecture
//! ```text
//! register::<E>(h) ──► Typed<E>(h) ──► slots[TypeId(E)] = old ++ [reg]   (new Arc<[..]>)
//! unregister::<E>(h) ──────────────► slots[TypeId(E)] = old - identity(h)
//! snapshot(E) ─────────────────────► Arc::clone(slots[TypeId(E)])         (no copy)
//! ```
//!
//! ## Rules
//! - Every mutation replaces the slot's `Arc<[Registration]>` under a short
//!   write lock; readers clone the `Arc` under a short read lock.
//! - A snapshot is immutable: a concurrent register/unregister never changes
//!   a list a dispatch is already iterating.
//! - No lock is ever held while a handler runs.
//! - Removing an unknown handler is a silent no-op.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::events::{Event, EventType};
use crate::handlers::HandlerRef;
use crate::registry::adapter::{identity_of, ErasedHandler, Typed};
use crate::registry::subscription::Subscription;

/// Unique id of one registration (not of the handler: the same handler may be
/// registered several times).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg-{}", self.0)
    }
}

/// One (event type, handler, identity) entry.
#[derive(Clone)]
pub struct Registration {
    id: RegistrationId,
    event_type: EventType,
    handler: Arc<dyn ErasedHandler>,
}

impl Registration {
    /// Id of this registration.
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Event type the handler was registered for.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Name of the registered handler.
    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    pub(crate) fn handler(&self) -> &Arc<dyn ErasedHandler> {
        &self.handler
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("event_type", &self.event_type.name())
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Immutable point-in-time list of handlers for one event type.
pub type Listeners = Arc<[Registration]>;

/// Thread-safe registry of handlers keyed by event type.
pub struct ListenerRegistry {
    slots: RwLock<HashMap<TypeId, Listeners>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Adds `handler` under `E` and returns the handle that removes exactly
    /// this registration.
    pub fn register<E: Event>(self: &Arc<Self>, handler: HandlerRef<E>) -> Subscription {
        let event_type = EventType::of::<E>();
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let reg = Registration {
            id,
            event_type,
            handler: Arc::new(Typed::new(handler)),
        };
        let name = reg.handler_name().to_owned();

        {
            let mut slots = self.write();
            let next: Listeners = match slots.get(&event_type.type_id()) {
                Some(old) => old.iter().cloned().chain(Some(reg)).collect(),
                None => Arc::from(vec![reg]),
            };
            slots.insert(event_type.type_id(), next);
        }

        debug!(
            event_type = event_type.name(),
            handler = %name,
            registration = %id,
            "listener registered"
        );
        Subscription::new(id, event_type, Arc::downgrade(self))
    }

    /// Removes every registration of `handler` (by `Arc` identity) under `E`.
    ///
    /// Returns how many registrations were removed; `0` if it was unknown.
    pub fn unregister<E: Event>(&self, handler: &HandlerRef<E>) -> usize {
        let identity = identity_of(handler);
        let removed = self.retain(EventType::of::<E>(), |r| r.handler.identity() != identity);
        if removed > 0 {
            debug!(
                event_type = E::name(),
                handler = handler.name(),
                removed,
                "listener unregistered"
            );
        }
        removed
    }

    /// Removes a single registration by id. Returns `false` if it was already gone.
    pub fn remove(&self, event_type: EventType, id: RegistrationId) -> bool {
        let removed = self.retain(event_type, |r| r.id != id) > 0;
        if removed {
            debug!(
                event_type = event_type.name(),
                registration = %id,
                "listener released"
            );
        }
        removed
    }

    /// Point-in-time list of handlers for `event_type` (empty if none).
    pub fn snapshot(&self, event_type: EventType) -> Listeners {
        self.read()
            .get(&event_type.type_id())
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Number of handlers registered for `E`.
    pub fn count<E: Event>(&self) -> usize {
        self.count_of(EventType::of::<E>())
    }

    /// Number of handlers registered for `event_type`.
    pub fn count_of(&self, event_type: EventType) -> usize {
        self.read()
            .get(&event_type.type_id())
            .map_or(0, |l| l.len())
    }

    /// Number of handlers across all event types.
    pub fn count_all(&self) -> usize {
        self.read().values().map(|l| l.len()).sum()
    }

    /// Sorted names of the event types that currently have handlers.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .read()
            .values()
            .filter_map(|l| l.first().map(|r| r.event_type.name()))
            .collect();
        names.sort_unstable();
        names
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    /// Replaces the slot with the entries matching `keep`; drops empty slots.
    fn retain<F>(&self, event_type: EventType, keep: F) -> usize
    where
        F: Fn(&Registration) -> bool,
    {
        let key = event_type.type_id();
        let mut slots = self.write();
        let Some(old) = slots.get(&key) else {
            return 0;
        };

        let next: Vec<Registration> = old.iter().filter(|r| keep(r)).cloned().collect();
        let removed = old.len() - next.len();
        if removed == 0 {
            return 0;
        }
        if next.is_empty() {
            slots.remove(&key);
        } else {
            slots.insert(key, Arc::from(next));
        }
        removed
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Listeners>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Listeners>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.count_all())
            .finish()
    }
}
