//! # Listener registry.
//!
//! - [`ListenerRegistry`] - event type → copy-on-write list of handlers
//! - [`Subscription`] - idempotent handle removing one registration
//! - [`Registration`], [`RegistrationId`], [`Listeners`] - snapshot entries
//!
//! Handlers are stored behind a per-type adapter (`adapter.rs`) so a job can
//! carry a type-erased envelope and still reach `Handler<E>::handle`.

mod adapter;
#[allow(clippy::module_inception)]
mod registry;
mod subscription;

pub use registry::{ListenerRegistry, Listeners, Registration, RegistrationId};
pub use subscription::Subscription;

pub(crate) use adapter::ErasedHandler;
