//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(Arc<E>, CancellationToken) -> Fut`,
//! producing a fresh future per event.
//!
//! ## Concurrency semantics
//! - Every call creates a **new** future owning its own state.
//! - No hidden mutation between events; share state explicitly through
//!   `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use courier::{Event, Handler, HandlerFn, HandlerRef, HandlerError};
//!
//! struct Ping;
//! impl Event for Ping {
//!     fn id(&self) -> &str { "ping" }
//! }
//!
//! let h: HandlerRef<Ping> = HandlerFn::arc("pong", |_ev: Arc<Ping>, _ctx: CancellationToken| async {
//!     Ok::<_, HandlerError>(())
//! });
//! assert_eq!(h.name(), "pong");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::events::Event;
use crate::handlers::handler::Handler;

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](crate::HandlerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<E, F, Fut> Handler<E> for HandlerFn<F>
where
    E: Event,
    F: Fn(Arc<E>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: Arc<E>, ctx: CancellationToken) -> Result<(), HandlerError> {
        (self.f)(event, ctx).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping(&'static str);

    impl Event for Ping {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[tokio::test]
    async fn closure_receives_event_and_token() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let h = HandlerFn::new("count", move |ev: Arc<Ping>, ctx: CancellationToken| {
            let s = Arc::clone(&s);
            async move {
                assert_eq!(ev.id(), "p");
                if ctx.is_cancelled() {
                    return Err(HandlerError::Canceled);
                }
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let ctx = CancellationToken::new();
        Handler::<Ping>::handle(&h, Arc::new(Ping("p")), ctx.clone())
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        ctx.cancel();
        let err = Handler::<Ping>::handle(&h, Arc::new(Ping("p")), ctx)
            .await
            .unwrap_err();
        assert_eq!(err, HandlerError::Canceled);
        assert_eq!(Handler::<Ping>::name(&h), "count");
    }
}
