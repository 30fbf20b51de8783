//! Engine core: publish path, job queue, worker loop and lifecycle.
//!
//! ```text
//!  producers                         Dispatcher
//!  ─────────                         ──────────
//!  publish(E) ──► BroadcastChannel ──► EventStream / ObserverSet
//!      │
//!      ├─► ListenerRegistry::snapshot(E) ── empty ──► ready Receipt
//!      │
//!      └─► mpsc job queue (capacity = queue_capacity())
//!                 │
//!                 ▼
//!           worker loop ── Semaphore(concurrency_limit()) ──► run_job
//!                                                        ├─► handler 1 ┐
//!                                                        ├─► handler 2 ├─ deadline / caller / abort
//!                                                        └─► handler N ┘
//!                                                               │
//!                                                        DispatchReport ──► Receipt::wait()
//! ```
//!
//! Internal modules:
//! - [`dispatcher`]: producer-facing API, drain and shutdown;
//! - [`builder`]: wires queue, semaphore, worker and observers;
//! - [`worker`]: single consumer of the queue, bounds concurrency;
//! - [`runner`]: runs one job, classifies outcomes;
//! - [`job`]: jobs, receipts and reports;
//! - [`state`], [`stats`], [`inflight`]: lifecycle, counters, running-job tracker;
//! - [`shutdown`]: OS signal handling.

mod builder;
mod dispatcher;
mod inflight;
mod job;
mod runner;
mod shutdown;
mod state;
mod stats;
mod worker;

pub use builder::DispatcherBuilder;
pub use dispatcher::Dispatcher;
pub use job::{DispatchReport, HandlerOutcome, JobStatus, Receipt};
pub use state::EngineState;
pub use stats::DispatchStats;
