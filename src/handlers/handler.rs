//! # Handler abstraction.
//!
//! This module defines the [`Handler`] trait (async, cancelable, typed by event)
//! and the shared handle type [`HandlerRef`], an `Arc<dyn Handler<E>>`.
//!
//! A handler receives the published `Arc<E>` and a [`CancellationToken`] that
//! fires on caller cancellation, on the job deadline, or on forced shutdown.
//! Handlers should check it at their await points and return promptly.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::events::{short_type_name, Event};

/// Shared reference to a handler of `E`.
///
/// The `Arc` allocation is the handler's identity: passing the same `Arc` to
/// [`Dispatcher::unregister`](crate::Dispatcher::unregister) removes it.
pub type HandlerRef<E> = Arc<dyn Handler<E>>;

/// # Asynchronous, cancelable consumer of one event type.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use courier::{Event, EventId, Handler, HandlerError};
///
/// struct UserCreated { id: EventId, email: String }
///
/// impl Event for UserCreated {
///     fn id(&self) -> &str { self.id.as_str() }
/// }
///
/// struct Welcome;
///
/// #[async_trait]
/// impl Handler<UserCreated> for Welcome {
///     async fn handle(&self, ev: Arc<UserCreated>, ctx: CancellationToken) -> Result<(), HandlerError> {
///         if ctx.is_cancelled() {
///             return Err(HandlerError::Canceled);
///         }
///         if ev.email.is_empty() {
///             return Err(HandlerError::fail("no address"));
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &str { "welcome-mail" }
/// }
/// ```
#[async_trait]
pub trait Handler<E: Event>: Send + Sync + 'static {
    /// Processes one event.
    ///
    /// Runs on its own task, concurrently with the other handlers of the same
    /// dispatch. Errors and panics are contained at the handler boundary.
    async fn handle(&self, event: Arc<E>, ctx: CancellationToken) -> Result<(), HandlerError>;

    /// Returns the handler name used in logs and in [`DispatchError`](crate::DispatchError).
    ///
    /// Defaults to the short type name of the implementor.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}
