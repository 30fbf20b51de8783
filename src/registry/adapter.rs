//! Per-type dispatch adapter.
//!
//! A handler is registered as `HandlerRef<E>` but the job queue only carries
//! type-erased [`Envelope`]s. At registration time the handler is wrapped in a
//! [`Typed<E>`] adapter, which fixes the concrete `E` once; at dispatch time
//! the adapter recovers the `Arc<E>` with a single `TypeId`-checked downcast.
//! No per-event lookup is needed to find the call for the runtime type.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::events::{Envelope, Event};
use crate::handlers::HandlerRef;

/// Type-erased view of one registered handler.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync + 'static {
    /// Invokes the wrapped handler with the envelope's payload.
    async fn invoke(&self, env: &Envelope, ctx: CancellationToken) -> Result<(), HandlerError>;

    /// Name of the wrapped handler.
    fn name(&self) -> &str;

    /// Address of the wrapped handler allocation (identity for removal).
    fn identity(&self) -> usize;
}

/// Adapter binding a `HandlerRef<E>` to its concrete event type.
pub(crate) struct Typed<E: Event> {
    inner: HandlerRef<E>,
}

impl<E: Event> Typed<E> {
    pub(crate) fn new(inner: HandlerRef<E>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: Event> ErasedHandler for Typed<E> {
    async fn invoke(&self, env: &Envelope, ctx: CancellationToken) -> Result<(), HandlerError> {
        match env.downcast::<E>() {
            Some(ev) => self.inner.handle(ev, ctx).await,
            None => Err(HandlerError::fail(format!(
                "envelope {} is not a {}",
                env.event_type,
                E::name()
            ))),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn identity(&self) -> usize {
        identity_of(&self.inner)
    }
}

/// Address of the allocation behind a handler `Arc` (vtable metadata dropped).
pub(crate) fn identity_of<E: Event>(handler: &HandlerRef<E>) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerFn;

    struct A;
    impl Event for A {
        fn id(&self) -> &str {
            "a"
        }
    }

    struct B;
    impl Event for B {
        fn id(&self) -> &str {
            "b"
        }
    }

    #[tokio::test]
    async fn adapter_invokes_matching_type_only() {
        let h: HandlerRef<A> =
            HandlerFn::arc("a-handler", |_ev: Arc<A>, _ctx: CancellationToken| async {
                Ok::<_, HandlerError>(())
            });
        let adapter = Typed::new(Arc::clone(&h));

        assert_eq!(adapter.name(), "a-handler");
        assert_eq!(adapter.identity(), identity_of(&h));

        let ok = adapter
            .invoke(&Envelope::new(Arc::new(A)), CancellationToken::new())
            .await;
        assert!(ok.is_ok());

        let err = adapter
            .invoke(&Envelope::new(Arc::new(B)), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "handler_failed");
    }
}
