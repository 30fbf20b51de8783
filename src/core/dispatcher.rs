//! # Dispatcher: the producer-facing engine.
//!
//! [`Dispatcher`] owns the listener registry, the all-events broadcast
//! channel, the bounded job queue and the worker loop.
//!
//! ## Publish path
//! ```text
//! publish(event, caller)
//!   ├─► id empty?                    → Err(InvalidEvent)
//!   ├─► state != Accepting?          → Err(Closed)
//!   ├─► channel.publish(envelope)     (always, even with no handlers)
//!   ├─► snapshot = registry[type]
//!   │     └─ empty                   → Ok(ready receipt, 0 handlers)
//!   └─► queue.send(job)               (suspends while the queue is full)
//!         ├─ caller cancelled        → Err(Cancelled)
//!         └─ accepted                → Ok(receipt)
//! ```
//!
//! ## Shutdown path
//! ```text
//! wait_for_completion() / shutdown(grace)
//!   Accepting ─► Draining: drop queue sender, no new jobs
//!   worker drains queue, joins running jobs
//!   channel.complete(), observers stop
//!   Draining ─► Stopped
//! shutdown(grace) expired ─► cancel runtime token ─► every handler → Cancelled
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::core::builder::DispatcherBuilder;
use crate::core::job::{DispatchJob, DispatchReport, Receipt};
use crate::core::runner::Shared;
use crate::core::shutdown;
use crate::core::state::{EngineState, StateCell};
use crate::core::stats::{Counters, DispatchStats};
use crate::error::{DispatchError, HandlerError, PublishError, RuntimeError};
use crate::events::{BroadcastChannel, Envelope, Event, ServerStarted, ServerStopping};
use crate::handlers::{HandlerFn, HandlerRef};
use crate::observers::ObserverSet;
use crate::registry::{ListenerRegistry, Subscription};

/// Typed in-process event dispatcher.
///
/// Create with [`Dispatcher::builder`] inside a tokio runtime and share the
/// returned `Arc<Dispatcher>`.
pub struct Dispatcher {
    cfg: Config,
    registry: Arc<ListenerRegistry>,
    channel: BroadcastChannel,
    queue: RwLock<Option<mpsc::Sender<DispatchJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    observers: Mutex<Option<ObserverSet>>,
    state: StateCell,
    runtime: CancellationToken,
    shared: Arc<Shared>,
}

/// Outcome of the synchronous half of a publish.
enum Staged {
    Done(Receipt),
    Queue {
        tx: mpsc::Sender<DispatchJob>,
        job: DispatchJob,
        receipt: Receipt,
    },
}

impl Dispatcher {
    /// Starts building a dispatcher with `cfg`.
    pub fn builder(cfg: Config) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: Config,
        registry: Arc<ListenerRegistry>,
        channel: BroadcastChannel,
        queue: mpsc::Sender<DispatchJob>,
        worker: JoinHandle<()>,
        observers: ObserverSet,
        runtime: CancellationToken,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            cfg,
            registry,
            channel,
            queue: RwLock::new(Some(queue)),
            worker: Mutex::new(Some(worker)),
            observers: Mutex::new(Some(observers)),
            state: StateCell::new(),
            runtime,
            shared,
        }
    }

    // ---------------------------
    // Registration
    // ---------------------------

    /// Registers `handler` for events of type `E`.
    ///
    /// The handler receives only events published after this call returns.
    pub fn register<E: Event>(&self, handler: HandlerRef<E>) -> Subscription {
        self.registry.register(handler)
    }

    /// Registers a closure as a handler for events of type `E`.
    ///
    /// The handler is named `fn<EventName>` in logs and reports.
    pub fn register_fn<E, F, Fut>(&self, f: F) -> Subscription
    where
        E: Event,
        F: Fn(Arc<E>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let name: Cow<'static, str> = Cow::Owned(format!("fn<{}>", E::name()));
        let handler: HandlerRef<E> = HandlerFn::arc(name, f);
        self.registry.register(handler)
    }

    /// Removes every registration of `handler` for `E`; no-op if absent.
    ///
    /// Returns how many registrations were removed.
    pub fn unregister<E: Event>(&self, handler: &HandlerRef<E>) -> usize {
        self.registry.unregister(handler)
    }

    /// Total number of registered handlers.
    pub fn listener_count(&self) -> usize {
        self.registry.count_all()
    }

    /// Number of handlers registered for `E`.
    pub fn listener_count_of<E: Event>(&self) -> usize {
        self.registry.count::<E>()
    }

    /// The listener registry.
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    // ---------------------------
    // Publishing
    // ---------------------------

    /// Publishes `event`; see [`publish_arc`](Self::publish_arc).
    pub async fn publish<E: Event>(
        &self,
        event: E,
        caller: CancellationToken,
    ) -> Result<Receipt, PublishError> {
        self.publish_arc(Arc::new(event), caller).await
    }

    /// Publishes a shared event.
    ///
    /// Every handler receives this same `Arc`. Suspends while the job queue
    /// is full; cancelling `caller` while suspended returns
    /// [`PublishError::Cancelled`]. Returns once the job is queued, not once
    /// handlers finish: await the [`Receipt`] for that.
    pub async fn publish_arc<E: Event>(
        &self,
        event: Arc<E>,
        caller: CancellationToken,
    ) -> Result<Receipt, PublishError> {
        let (tx, job, receipt) = match self.stage(event, caller.clone())? {
            Staged::Done(receipt) => return Ok(receipt),
            Staged::Queue { tx, job, receipt } => (tx, job, receipt),
        };

        tokio::select! {
            biased;

            res = tx.send(job) => {
                res.map_err(|_| PublishError::Closed { state: self.state.get() })?;
            }
            _ = caller.cancelled() => {
                debug!(
                    event_type = receipt.event_type().name(),
                    event_id = receipt.event_id(),
                    "publish cancelled while waiting for queue capacity"
                );
                return Err(PublishError::Cancelled);
            }
        }

        self.accepted(&receipt);
        Ok(receipt)
    }

    /// Publishes `event` without waiting for queue capacity.
    ///
    /// A full queue yields [`PublishError::BufferFull`]; the event has still
    /// been written to the broadcast channel.
    pub fn try_publish<E: Event>(
        &self,
        event: E,
        caller: CancellationToken,
    ) -> Result<Receipt, PublishError> {
        let (tx, job, receipt) = match self.stage(Arc::new(event), caller)? {
            Staged::Done(receipt) => return Ok(receipt),
            Staged::Queue { tx, job, receipt } => (tx, job, receipt),
        };

        tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::BufferFull {
                capacity: self.cfg.queue_capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed {
                state: self.state.get(),
            },
        })?;

        self.accepted(&receipt);
        Ok(receipt)
    }

    /// Validation, broadcast and listener lookup shared by both publish variants.
    fn stage<E: Event>(
        &self,
        event: Arc<E>,
        caller: CancellationToken,
    ) -> Result<Staged, PublishError> {
        if event.id().is_empty() {
            return Err(PublishError::InvalidEvent {
                event_type: E::name(),
                reason: "event id is empty",
            });
        }

        let state = self.state.get();
        if state != EngineState::Accepting {
            return Err(PublishError::Closed { state });
        }
        let tx = self
            .queue
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PublishError::Closed {
                state: self.state.get(),
            })?;

        let envelope = Envelope::new(event);
        self.channel.publish(envelope.clone());
        Counters::bump(&self.shared.counters.published, 1);

        let listeners = self.registry.snapshot(envelope.event_type);
        if listeners.is_empty() {
            trace!(
                event_type = envelope.event_type.name(),
                event_id = %envelope.id,
                "no listeners; nothing to dispatch"
            );
            let report = DispatchReport::empty(envelope.event_type, Arc::clone(&envelope.id));
            return Ok(Staged::Done(Receipt::ready(report)));
        }

        let (job, receipt) =
            DispatchJob::new(envelope, listeners, caller, self.cfg.dispatch_timeout());
        Ok(Staged::Queue { tx, job, receipt })
    }

    fn accepted(&self, receipt: &Receipt) {
        Counters::bump(&self.shared.counters.dispatched, 1);
        debug!(
            event_type = receipt.event_type().name(),
            event_id = receipt.event_id(),
            "dispatch job queued"
        );
    }

    // ---------------------------
    // Introspection
    // ---------------------------

    /// The all-events broadcast channel.
    pub fn all_events(&self) -> &BroadcastChannel {
        &self.channel
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Snapshot of the dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.shared.counters.snapshot(self.shared.inflight.len())
    }

    /// Number of jobs currently executing.
    pub fn in_flight(&self) -> usize {
        self.shared.inflight.len()
    }

    /// The configuration the dispatcher was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Stops accepting events and waits until every queued and running job
    /// has finished.
    ///
    /// Returns the first failure propagated under `continue_on_error = false`.
    /// Safe to call more than once and from several tasks.
    pub async fn wait_for_completion(&self) -> Result<(), DispatchError> {
        self.drain().await;
        match self.shared.first_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Like [`wait_for_completion`](Self::wait_for_completion) but bounded by `grace`.
    ///
    /// On expiry every in-flight handler is cancelled and
    /// [`RuntimeError::GraceExceeded`] lists the jobs that were still running.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        if time::timeout(grace, self.drain()).await.is_ok() {
            return Ok(());
        }

        let stuck = self.shared.inflight.snapshot();
        warn!(
            grace_ms = grace.as_millis() as u64,
            stuck = ?stuck,
            "shutdown grace exceeded; cancelling in-flight handlers"
        );
        self.runtime.cancel();
        self.drain().await;
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }

    /// Publishes [`ServerStarted`], waits for SIGINT/SIGTERM/SIGQUIT
    /// (Ctrl-C elsewhere), publishes [`ServerStopping`], then shuts down
    /// within `grace`.
    pub async fn run_until_signal(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.run_until(shutdown::wait_for_shutdown_signal(), grace).await
    }

    /// Same as [`run_until_signal`](Self::run_until_signal) with a custom stop trigger.
    pub async fn run_until<F>(&self, stop: F, grace: Duration) -> Result<(), RuntimeError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        self.announce(ServerStarted::new()).await;
        info!("dispatcher running");

        stop.await?;
        info!("stop requested");

        self.announce(ServerStopping::new()).await;
        self.shutdown(grace).await
    }

    /// Publishes a lifecycle event and waits for its handlers.
    async fn announce<E: Event>(&self, event: E) {
        let name = E::name();
        match self.publish(event, self.runtime.child_token()).await {
            Ok(receipt) => {
                if let Err(e) = receipt.wait().await {
                    warn!(event_type = name, error = %e, "lifecycle handler failed");
                }
            }
            Err(e) => warn!(event_type = name, error = %e, "lifecycle event not published"),
        }
    }

    /// Accepting → Draining → Stopped. Cancel-safe: an interrupted drain
    /// leaves the worker handle in place for the next call.
    async fn drain(&self) {
        if self.state.advance(EngineState::Draining) {
            info!(pending = self.stats().pending_jobs(), "dispatcher draining");
        }
        self.queue
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.as_mut() {
            if let Err(e) = handle.await {
                warn!(error = %e, "dispatch worker ended abnormally");
            }
            *worker = None;
        }
        drop(worker);

        self.channel.complete();
        let observers = self.observers.lock().await.take();
        if let Some(observers) = observers {
            observers.shutdown().await;
        }

        if self.state.advance(EngineState::Stopped) {
            let stats = self.stats();
            info!(
                published = stats.published,
                dispatched = stats.dispatched,
                failed = stats.handlers_failed,
                timed_out = stats.handlers_timed_out,
                "dispatcher stopped"
            );
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.runtime.cancel();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state.get())
            .field("listeners", &self.registry.count_all())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
