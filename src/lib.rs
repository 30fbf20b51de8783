//! # courier
//!
//! **Courier** is a typed, in-process publish/subscribe event dispatcher.
//!
//! Producers publish strongly-typed events; handlers registered by event type
//! consume them asynchronously with bounded concurrency, backpressure, a
//! per-dispatch timeout and error isolation between handlers. Every published
//! event is also multicast on a diagnostic broadcast channel.
//!
//! ## Architecture
//! ```text
//!   publish::<A>(ev, token)     publish::<B>(ev, token)
//!            │                           │
//!            ▼                           ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Dispatcher                                                    │
//! │  - BroadcastChannel (every event, no replay) ──► observers    │
//! │  - ListenerRegistry (type → copy-on-write handler list)       │
//! │  - job queue (bounded mpsc: backpressure on producers)        │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                ▼
//!                 worker loop (Semaphore: max concurrent jobs)
//!                    ┌───────────┼───────────┐
//!                    ▼           ▼           ▼
//!                  job 1       job 2       job N
//!                 ┌──┴──┐     ┌──┴──┐
//!                 h1   h2     h1   h3      (handlers of one job run concurrently,
//!                                           share one deadline, fail independently)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Any `Send + Sync + 'static` type with an id.             | [`Event`], [`EventId`], [`Envelope`]        |
//! | **Handlers**      | Async, cancelable consumers, as objects or closures.     | [`Handler`], [`HandlerFn`], [`HandlerRef`]  |
//! | **Registration**  | Copy-on-write registry with idempotent removal handles.  | [`ListenerRegistry`], [`Subscription`]      |
//! | **Dispatch**      | Bounded worker pool, timeouts, receipts.                 | [`Dispatcher`], [`Receipt`], [`DispatchReport`] |
//! | **Observability** | Broadcast stream of all events, observer workers.        | [`BroadcastChannel`], [`Observe`], [`LogWriter`] |
//! | **Errors**        | Typed errors for publish, dispatch, handlers, runtime.   | [`PublishError`], [`DispatchError`], [`HandlerError`], [`RuntimeError`] |
//! | **Configuration** | One immutable record, serde-loadable.                    | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use courier::{Config, Dispatcher, Event, EventId, HandlerError};
//!
//! struct UserCreated {
//!     id: EventId,
//!     name: String,
//! }
//!
//! impl Event for UserCreated {
//!     fn id(&self) -> &str { self.id.as_str() }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::builder(Config::default()).build();
//!
//!     let _sub = dispatcher.register_fn(|ev: Arc<UserCreated>, _ctx: CancellationToken| async move {
//!         println!("welcome, {}", ev.name);
//!         Ok::<_, HandlerError>(())
//!     });
//!
//!     let receipt = dispatcher
//!         .publish(UserCreated { id: EventId::new(), name: "ada".into() }, CancellationToken::new())
//!         .await?;
//!     let report = receipt.wait().await?;
//!     assert_eq!(report.completed(), 1);
//!
//!     dispatcher.wait_for_completion().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod handlers;
mod observers;
mod registry;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{
    DispatchReport, DispatchStats, Dispatcher, DispatcherBuilder, EngineState, HandlerOutcome,
    JobStatus, Receipt,
};
pub use error::{DispatchError, HandlerError, PublishError, RuntimeError};
pub use events::{
    BroadcastChannel, Envelope, Event, EventId, EventStream, EventType, ServerStarted,
    ServerStopping, StreamClosed,
};
pub use handlers::{Handler, HandlerFn, HandlerRef};
pub use observers::{LogWriter, Observe, ObserverSet};
pub use registry::{ListenerRegistry, Listeners, Registration, RegistrationId, Subscription};
