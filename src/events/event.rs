//! # Event trait and identifiers.
//!
//! Every value published through the [`Dispatcher`](crate::Dispatcher)
//! implements [`Event`]: it exposes a stable string identifier and its
//! concrete Rust type is the dispatch key ([`EventType`]).
//!
//! ## Example
//! ```rust
//! use courier::{Event, EventId};
//!
//! struct OrderPlaced {
//!     id: EventId,
//!     order: u64,
//! }
//!
//! impl Event for OrderPlaced {
//!     fn id(&self) -> &str { self.id.as_str() }
//! }
//!
//! let ev = OrderPlaced { id: EventId::new(), order: 7 };
//! assert_eq!(ev.id().len(), 32);
//! assert_eq!(OrderPlaced::name(), "OrderPlaced");
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// An immutable value that can be published.
///
/// The engine never mutates or re-emits events; handlers receive the exact
/// instance handed to `publish` behind an [`Arc`].
pub trait Event: Send + Sync + 'static {
    /// Caller-assigned or generated identifier. Must not be empty.
    fn id(&self) -> &str;

    /// Human-readable type name used in logs.
    ///
    /// Defaults to the last path segment of [`std::any::type_name`].
    fn name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }
}

/// Auto-generated event identifier (UUIDv4, 32 lowercase hex chars).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EventId(Arc<str>);

impl EventId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(Arc::from(Uuid::new_v4().simple().to_string()))
    }

    /// Wraps a caller-assigned identifier.
    pub fn from_string(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime discriminator of an event type: the registry and queue key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Discriminator of `E`.
    #[inline]
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: E::name(),
        }
    }

    /// Underlying [`TypeId`].
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Human-readable name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `a::b::Foo<c::Bar>` → `Foo<c::Bar>`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}
