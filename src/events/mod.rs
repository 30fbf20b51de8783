//! Events: data model and the all-events broadcast channel.
//!
//! ## Contents
//! - [`Event`], [`EventId`], [`EventType`] the publishable value and its dispatch key
//! - [`Envelope`] type-erased carrier used by the channel and the job queue
//! - [`BroadcastChannel`], [`EventStream`] multicast of every published event
//! - [`ServerStarted`], [`ServerStopping`] host lifecycle events
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod envelope;
mod event;
mod lifecycle;
mod stream;

pub use bus::BroadcastChannel;
pub use envelope::Envelope;
pub use event::{Event, EventId, EventType};
pub(crate) use event::short_type_name;
pub use lifecycle::{ServerStarted, ServerStopping};
pub use stream::{EventStream, StreamClosed};
