//! # Subscription handle.
//!
//! [`Subscription`] is returned by every registration. [`release`](Subscription::release)
//! removes exactly that registration, once; later calls are no-ops.
//!
//! ## Rules
//! - Release is idempotent and safe to call from several threads at once.
//! - Release never touches a dispatch already in flight: that job iterates its
//!   own snapshot and still delivers to the handler.
//! - Dropping the handle does **not** unregister; the registration lives until
//!   it is released or the handler is unregistered by identity.
//! - The handle holds the registry weakly and never keeps it alive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use crate::events::EventType;
use crate::registry::registry::{ListenerRegistry, RegistrationId};

/// Capability to remove one registration.
#[must_use = "keep the Subscription to be able to release the handler later"]
pub struct Subscription {
    id: RegistrationId,
    event_type: EventType,
    registry: Weak<ListenerRegistry>,
    released: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        id: RegistrationId,
        event_type: EventType,
        registry: Weak<ListenerRegistry>,
    ) -> Self {
        Self {
            id,
            event_type,
            registry,
            released: AtomicBool::new(false),
        }
    }

    /// Removes the registration.
    ///
    /// Returns `true` only for the call that actually removed it; `false` if
    /// it was already released, unregistered by identity, or the registry is gone.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.event_type, self.id),
            None => false,
        }
    }

    /// Whether [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Id of the registration this handle controls.
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Event type the handler was registered for.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type.name())
            .field("released", &self.is_released())
            .finish()
    }
}
