//! Host lifecycle events published by [`Dispatcher::run_until_signal`](crate::Dispatcher::run_until_signal).
//!
//! Components that must act when the host comes up or goes down (e.g. a
//! scripting binding waiting for the server to be ready) register a handler
//! for [`ServerStarted`] / [`ServerStopping`].

use super::event::{Event, EventId};

/// The host finished starting; the dispatcher is accepting events.
#[derive(Debug, Clone, Default)]
pub struct ServerStarted {
    id: EventId,
}

impl ServerStarted {
    /// Creates the event with a fresh identifier.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Event for ServerStarted {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// The host received a stop signal; the dispatcher is about to drain.
#[derive(Debug, Clone, Default)]
pub struct ServerStopping {
    id: EventId,
}

impl ServerStopping {
    /// Creates the event with a fresh identifier.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Event for ServerStopping {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}
