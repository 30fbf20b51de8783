//! # Dispatch worker loop.
//!
//! Single consumer of the job queue. It takes one concurrency permit **before**
//! it takes a job, so while every permit is busy the queue stays full and
//! producers feel backpressure.
//!
//! ```text
//! loop:
//!   permit ← semaphore.acquire_owned()
//!   job    ← queue.recv()          (None ⇒ queue closed and empty ⇒ exit)
//!   spawn { track(job) → run_job → release permit → reply }
//! on exit: join every running job
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::job::DispatchJob;
use crate::core::runner::{run_job, Shared};

pub(crate) struct Worker {
    rx: mpsc::Receiver<DispatchJob>,
    semaphore: Arc<Semaphore>,
    continue_on_error: bool,
    runtime: CancellationToken,
    shared: Arc<Shared>,
}

impl Worker {
    pub(crate) fn new(
        rx: mpsc::Receiver<DispatchJob>,
        semaphore: Arc<Semaphore>,
        continue_on_error: bool,
        runtime: CancellationToken,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            rx,
            semaphore,
            continue_on_error,
            runtime,
            shared,
        }
    }

    /// Runs until the queue is closed and drained, then waits for running jobs.
    pub(crate) async fn run(mut self) {
        let mut running: JoinSet<()> = JoinSet::new();

        loop {
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_closed) => break,
            };
            let Some(job) = self.rx.recv().await else {
                break;
            };
            while let Some(done) = running.try_join_next() {
                log_join(done);
            }

            let shared = Arc::clone(&self.shared);
            let runtime = self.runtime.clone();
            let continue_on_error = self.continue_on_error;
            running.spawn(async move {
                let tracked = shared.inflight.track(&job.envelope);
                let (result, reply) = run_job(job, continue_on_error, &runtime, &shared).await;
                drop(tracked);
                drop(permit);
                // the producer may have dropped its receipt
                let _ = reply.send(result);
            });
        }

        debug!(running = running.len(), "job queue closed; joining running jobs");
        while let Some(done) = running.join_next().await {
            log_join(done);
        }
    }
}

fn log_join(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        warn!(error = %e, "dispatch job task ended abnormally");
    }
}
