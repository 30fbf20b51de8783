//! # Observer workers.
//!
//! [`ObserverSet`] gives each [`Observe`] implementation its own cursor on the
//! [`BroadcastChannel`] and a dedicated worker task.
//!
//! ## Architecture
//! ```text
//! BroadcastChannel
//!     │
//!     ├──► EventStream 1 ──► worker 1 ──► observer1.on_event()
//!     │                           └─────► panic → warn!, continue
//!     ├──► EventStream 2 ──► worker 2 ──► observer2.on_event()
//!     └──► EventStream N ──► worker N ──► observerN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-observer ordering**: observer A may be at event N while B is at N+5.
//! - **Per-observer FIFO**: each observer sees events in publish order.
//! - **Lag**: a slow observer skips overwritten events (logged by its stream).
//! - **Isolation**: a slow or panicking observer doesn't affect others.
//! - **Shutdown**: workers exit once the channel is completed and their stream is drained.
//!
//! `AssertUnwindSafe` is used, so an observer that panics while holding a
//! lock on shared state may leave that state inconsistent.

use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{info_span, warn, Instrument};

use crate::error::panic_message;
use crate::events::{BroadcastChannel, EventStream};
use crate::observers::Observe;

/// Worker tasks feeding a list of observers.
pub struct ObserverSet {
    workers: Vec<(&'static str, JoinHandle<()>)>,
}

impl ObserverSet {
    /// Subscribes every observer to `channel` and spawns its worker.
    ///
    /// Must be called inside a tokio runtime. Observers only see events
    /// published after this call.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>, channel: &BroadcastChannel) -> Self {
        let workers = observers
            .into_iter()
            .map(|obs| {
                let name = obs.name();
                let stream = channel.subscribe();
                let handle = tokio::spawn(
                    observe_loop(obs, stream).instrument(info_span!("observer", observer = name)),
                );
                (name, handle)
            })
            .collect();
        Self { workers }
    }

    /// Number of observer workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` if no observers are attached.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits for every worker to finish.
    ///
    /// Workers finish when the channel is completed, so call
    /// [`BroadcastChannel::complete`] first.
    pub async fn shutdown(self) {
        for (name, handle) in self.workers {
            if let Err(e) = handle.await {
                warn!(observer = name, error = %e, "observer worker ended abnormally");
            }
        }
    }
}

async fn observe_loop(obs: Arc<dyn Observe>, mut stream: EventStream) {
    while let Some(env) = stream.recv().await {
        let fut = obs.on_event(&env);
        if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            warn!(
                event_type = env.event_type.name(),
                event_id = %env.id,
                info = %panic_message(&*panic),
                "observer panicked"
            );
        }
    }
}
