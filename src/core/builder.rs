use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::core::dispatcher::Dispatcher;
use crate::core::runner::Shared;
use crate::core::worker::Worker;
use crate::events::BroadcastChannel;
use crate::observers::{Observe, ObserverSet};
use crate::registry::ListenerRegistry;

/// Builder for a [`Dispatcher`].
pub struct DispatcherBuilder {
    cfg: Config,
    observers: Vec<Arc<dyn Observe>>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            observers: Vec::new(),
        }
    }

    /// Sets observers of the all-events stream.
    ///
    /// Each observer gets its own cursor and worker; it sees every event
    /// published after [`build`](Self::build).
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Builds the dispatcher and starts its worker loop.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Dispatcher> {
        let cfg = self.cfg;
        let channel = BroadcastChannel::new();
        let observers = ObserverSet::new(self.observers, &channel);
        let runtime = CancellationToken::new();
        let shared = Arc::new(Shared::new());

        let concurrency = cfg.concurrency_limit();
        let capacity = cfg.queue_capacity();
        let (tx, rx) = mpsc::channel(capacity);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let worker = Worker::new(
            rx,
            semaphore,
            cfg.continue_on_error,
            runtime.clone(),
            Arc::clone(&shared),
        );
        let worker = tokio::spawn(worker.run());

        info!(
            concurrency,
            queue_capacity = capacity,
            timeout_ms = cfg.dispatch_timeout().map(|d| d.as_millis() as u64),
            continue_on_error = cfg.continue_on_error,
            observers = observers.len(),
            "dispatcher started"
        );

        Arc::new(Dispatcher::new_internal(
            cfg,
            ListenerRegistry::new(),
            channel,
            tx,
            worker,
            observers,
            runtime,
            shared,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_limits_do_not_panic() {
        let cfg = Config {
            max_concurrent: usize::MAX,
            max_buffer_size: usize::MAX,
            ..Config::default()
        };
        let d = DispatcherBuilder::new(cfg).build();
        assert_eq!(d.stats().in_flight, 0);
        d.wait_for_completion().await.unwrap();
    }
}
