//! # Handler abstractions.
//!
//! - [`Handler`] - trait for typed, async, cancelable event consumers
//! - [`HandlerFn`] - function-backed handler
//! - [`HandlerRef`] - shared reference to a handler (`Arc<dyn Handler<E>>`)

mod handler;
mod handler_fn;

pub use handler::{Handler, HandlerRef};
pub use handler_fn::HandlerFn;
