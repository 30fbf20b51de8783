//! # Execute one dispatch job.
//!
//! Fans a job out to every handler in its snapshot and folds the results into
//! a [`DispatchReport`].
//!
//! ## Flow
//! ```text
//! run_job(job)
//!   ├─► deadline = now + timeout            (starts when the job starts)
//!   ├─► ctx = caller.child_token()          (shared by all handlers of the job)
//!   ├─► spawn one task per handler:
//!   │     select! {
//!   │       handler.invoke(env, ctx)  → Completed | Failed(e)  (panic → Failed(Panicked))
//!   │       sleep_until(deadline)     → cancel ctx → TimedOut
//!   │       runtime.cancelled()       → cancel ctx → Cancelled
//!   │       caller.cancelled()        → Cancelled
//!   │     }
//!   ├─► join all handler tasks
//!   └─► report (+ HandlerFailed when continue_on_error = false)
//! ```
//!
//! ## Rules
//! - Handlers of one job run concurrently; one failing never stops another.
//! - The job settles only after **every** handler settled.
//! - Interruption is classified by looking at the caller's token first: a
//!   fired caller token is `Cancelled`, an elapsed deadline is `TimedOut`.
//! - `ctx` is a child of the caller's token: cancelling it never affects the caller.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::inflight::InFlight;
use crate::core::job::{DispatchJob, DispatchReport, HandlerOutcome, JobResult, JobStatus};
use crate::core::stats::Counters;
use crate::error::{panic_message, DispatchError, HandlerError};
use crate::events::Envelope;
use crate::registry::ErasedHandler;

/// State shared by the publish path, the worker loop and every job.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) counters: Counters,
    pub(crate) inflight: InFlight,
    first_failure: Mutex<Option<DispatchError>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Keeps `err` unless an earlier failure was already recorded.
    fn record_failure(&self, err: &DispatchError) {
        let mut slot = self
            .first_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err.clone());
        }
    }

    /// First failure propagated under `continue_on_error = false`.
    pub(crate) fn first_failure(&self) -> Option<DispatchError> {
        self.first_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Why a handler stopped before returning on its own.
#[derive(Clone, Copy)]
enum Interrupt {
    Deadline,
    Shutdown,
    Caller,
}

/// Runs every handler of `job` and returns its outcome.
///
/// The reply channel is left to the caller so it can release the concurrency
/// permit before or after replying.
pub(crate) async fn run_job(
    job: DispatchJob,
    continue_on_error: bool,
    runtime: &CancellationToken,
    shared: &Shared,
) -> (JobResult, tokio::sync::oneshot::Sender<JobResult>) {
    let DispatchJob {
        envelope,
        listeners,
        caller,
        timeout,
        reply,
    } = job;

    let started = Instant::now();
    let deadline = timeout
        .filter(|d| *d > Duration::ZERO)
        .map(|d| started + d);
    let ctx = caller.child_token();

    let mut set: JoinSet<(usize, HandlerOutcome)> = JoinSet::new();
    let mut outcomes: Vec<(String, HandlerOutcome)> = listeners
        .iter()
        .map(|r| (r.handler_name().to_owned(), HandlerOutcome::Cancelled))
        .collect();

    if runtime.is_cancelled() {
        debug!(
            event_type = envelope.event_type.name(),
            event_id = %envelope.id,
            "engine aborting; job skipped"
        );
    } else {
        for (idx, reg) in listeners.iter().enumerate() {
            let handler = Arc::clone(reg.handler());
            let env = envelope.clone();
            let ctx = ctx.clone();
            let caller = caller.clone();
            let runtime = runtime.clone();
            set.spawn(async move {
                let outcome = invoke_one(handler, env, ctx, caller, runtime, deadline).await;
                (idx, outcome)
            });
        }
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => outcomes[idx].1 = outcome,
            // invoke_one catches panics itself; only an abort lands here
            Err(e) => warn!(error = %e, "handler task did not finish"),
        }
    }

    let report = fold_report(&envelope, outcomes, started.elapsed());
    account(&shared.counters, &report);
    log_report(&report, continue_on_error);

    let result = match first_failed(&report) {
        Some((handler, err)) if !continue_on_error => {
            let failure = DispatchError::HandlerFailed {
                event_type: report.event_type.name(),
                event_id: report.event_id.to_string(),
                handler: handler.to_owned(),
                error: err.clone(),
            };
            shared.record_failure(&failure);
            Err(failure)
        }
        _ => Ok(report),
    };
    Counters::bump(&shared.counters.jobs_completed, 1);
    (result, reply)
}

/// Invokes one handler under the job's deadline, the caller's token and the
/// engine's abort token, with a panic boundary.
async fn invoke_one(
    handler: Arc<dyn ErasedHandler>,
    env: Envelope,
    ctx: CancellationToken,
    caller: CancellationToken,
    runtime: CancellationToken,
    deadline: Option<Instant>,
) -> HandlerOutcome {
    let deadline_hit = async {
        match deadline {
            Some(at) => time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    let call = AssertUnwindSafe(handler.invoke(&env, ctx.clone())).catch_unwind();

    let interrupt = tokio::select! {
        biased;

        res = call => {
            return match res {
                Ok(Ok(())) => HandlerOutcome::Completed,
                Ok(Err(HandlerError::Canceled)) if ctx.is_cancelled() => {
                    classify(&caller, &runtime, deadline)
                }
                Ok(Err(HandlerError::Canceled)) => HandlerOutcome::Cancelled,
                Ok(Err(e)) => HandlerOutcome::Failed(e),
                Err(panic) => HandlerOutcome::Failed(HandlerError::Panicked {
                    info: panic_message(&*panic),
                }),
            };
        }
        _ = caller.cancelled() => Interrupt::Caller,
        _ = runtime.cancelled() => Interrupt::Shutdown,
        _ = deadline_hit => Interrupt::Deadline,
    };

    ctx.cancel();
    match interrupt {
        Interrupt::Deadline => HandlerOutcome::TimedOut,
        Interrupt::Caller | Interrupt::Shutdown => HandlerOutcome::Cancelled,
    }
}

/// Classifies a cooperative `Canceled` return.
fn classify(
    caller: &CancellationToken,
    runtime: &CancellationToken,
    deadline: Option<Instant>,
) -> HandlerOutcome {
    if caller.is_cancelled() || runtime.is_cancelled() {
        HandlerOutcome::Cancelled
    } else if deadline.is_some_and(|at| Instant::now() >= at) {
        HandlerOutcome::TimedOut
    } else {
        HandlerOutcome::Cancelled
    }
}

fn fold_report(
    env: &Envelope,
    outcomes: Vec<(String, HandlerOutcome)>,
    elapsed: Duration,
) -> DispatchReport {
    let status = if outcomes
        .iter()
        .any(|(_, o)| matches!(o, HandlerOutcome::Cancelled))
    {
        JobStatus::Cancelled
    } else if outcomes
        .iter()
        .any(|(_, o)| matches!(o, HandlerOutcome::TimedOut))
    {
        JobStatus::TimedOut
    } else {
        JobStatus::Completed
    };

    DispatchReport {
        event_type: env.event_type,
        event_id: Arc::clone(&env.id),
        outcomes,
        status,
        elapsed,
    }
}

fn first_failed(report: &DispatchReport) -> Option<(&str, &HandlerError)> {
    report.outcomes.iter().find_map(|(name, o)| match o {
        HandlerOutcome::Failed(e) => Some((name.as_str(), e)),
        _ => None,
    })
}

fn account(counters: &Counters, report: &DispatchReport) {
    Counters::bump(&counters.handlers_completed, report.completed() as u64);
    Counters::bump(&counters.handlers_failed, report.failed() as u64);
    Counters::bump(&counters.handlers_timed_out, report.timed_out() as u64);
    Counters::bump(&counters.handlers_cancelled, report.cancelled() as u64);
}

fn log_report(report: &DispatchReport, continue_on_error: bool) {
    let event_type = report.event_type.name();
    let event_id = &*report.event_id;

    for (handler, outcome) in &report.outcomes {
        match outcome {
            HandlerOutcome::Completed => {}
            HandlerOutcome::Failed(e) if continue_on_error => warn!(
                event_type,
                event_id,
                handler = %handler,
                error = %e,
                label = e.as_label(),
                "handler failed; continuing"
            ),
            HandlerOutcome::Failed(e) => error!(
                event_type,
                event_id,
                handler = %handler,
                error = %e,
                label = e.as_label(),
                "handler failed"
            ),
            HandlerOutcome::TimedOut => warn!(
                event_type,
                event_id,
                handler = %handler,
                "handler timed out"
            ),
            HandlerOutcome::Cancelled => warn!(
                event_type,
                event_id,
                handler = %handler,
                "handler cancelled"
            ),
        }
    }

    debug!(
        event_type,
        event_id,
        handlers = report.handlers(),
        completed = report.completed(),
        failed = report.failed(),
        status = ?report.status,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "dispatch finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::Receipt;
    use crate::events::{Event, EventType};
    use crate::handlers::{HandlerFn, HandlerRef};
    use crate::registry::{ListenerRegistry, Listeners};

    struct Tick;
    impl Event for Tick {
        fn id(&self) -> &str {
            "tick-1"
        }
    }

    fn sleeper(name: &'static str, ms: u64) -> HandlerRef<Tick> {
        HandlerFn::arc(name, move |_ev: Arc<Tick>, ctx: CancellationToken| async move {
            tokio::select! {
                _ = time::sleep(Duration::from_millis(ms)) => Ok(()),
                _ = ctx.cancelled() => Err(HandlerError::Canceled),
            }
        })
    }

    fn failing(name: &'static str) -> HandlerRef<Tick> {
        HandlerFn::arc(name, |_ev: Arc<Tick>, _ctx: CancellationToken| async {
            Err::<(), _>(HandlerError::fail("nope"))
        })
    }

    fn make_job(
        listeners: Listeners,
        caller: CancellationToken,
        timeout: Option<Duration>,
    ) -> (DispatchJob, Receipt) {
        DispatchJob::new(Envelope::new(Arc::new(Tick)), listeners, caller, timeout)
    }

    fn listeners(handlers: Vec<HandlerRef<Tick>>) -> (Arc<ListenerRegistry>, Listeners) {
        let reg = ListenerRegistry::new();
        for h in handlers {
            let _ = reg.register(h);
        }
        let snap = reg.snapshot(EventType::of::<Tick>());
        (reg, snap)
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_slow_handler_only() {
        let (_reg, snap) = listeners(vec![sleeper("slow", 200), sleeper("fast", 10)]);
        let timeout = Some(Duration::from_millis(50));
        let (job, _receipt) = make_job(snap, CancellationToken::new(), timeout);
        let shared = Shared::new();

        let (res, _reply) = run_job(job, true, &CancellationToken::new(), &shared).await;
        let report = res.unwrap();
        assert_eq!(report.outcome_of("fast"), Some(&HandlerOutcome::Completed));
        assert_eq!(report.outcome_of("slow"), Some(&HandlerOutcome::TimedOut));
        assert_eq!(report.status, JobStatus::TimedOut);
        assert!(report.elapsed >= Duration::from_millis(50));
        assert!(report.elapsed < Duration::from_millis(200));
        assert_eq!(shared.counters.snapshot(0).handlers_timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancel_is_not_a_timeout() {
        let (_reg, snap) = listeners(vec![sleeper("slow", 1_000)]);
        let caller = CancellationToken::new();
        let timeout = Some(Duration::from_millis(500));
        let (job, _receipt) = make_job(snap, caller.clone(), timeout);
        let shared = Shared::new();

        let c = caller.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            c.cancel();
        });

        let (res, _reply) = run_job(job, true, &CancellationToken::new(), &shared).await;
        let report = res.unwrap();
        assert_eq!(report.outcome_of("slow"), Some(&HandlerOutcome::Cancelled));
        assert_eq!(report.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn failure_propagates_after_siblings_settle() {
        let (_reg, snap) = listeners(vec![failing("bad"), sleeper("ok", 5)]);
        let (job, _receipt) = make_job(snap, CancellationToken::new(), None);
        let shared = Shared::new();

        let (res, _reply) = run_job(job, false, &CancellationToken::new(), &shared).await;
        match res.unwrap_err() {
            DispatchError::HandlerFailed { handler, error, .. } => {
                assert_eq!(handler, "bad");
                assert_eq!(error, HandlerError::fail("nope"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let stats = shared.counters.snapshot(0);
        assert_eq!(stats.handlers_completed, 1);
        assert_eq!(stats.handlers_failed, 1);
        assert!(shared.first_failure().is_some());
    }

    #[tokio::test]
    async fn panic_is_recorded_as_failure() {
        let boom: HandlerRef<Tick> =
            HandlerFn::arc("boom", |_ev: Arc<Tick>, _ctx: CancellationToken| async {
                if true {
                    panic!("kaboom");
                }
                Ok::<_, HandlerError>(())
            });
        let (_reg, snap) = listeners(vec![boom, sleeper("ok", 1)]);
        let (job, _receipt) = make_job(snap, CancellationToken::new(), None);
        let shared = Shared::new();

        let (res, _reply) = run_job(job, true, &CancellationToken::new(), &shared).await;
        let report = res.unwrap();
        assert_eq!(
            report.outcome_of("boom"),
            Some(&HandlerOutcome::Failed(HandlerError::Panicked {
                info: "kaboom".into()
            }))
        );
        assert_eq!(report.outcome_of("ok"), Some(&HandlerOutcome::Completed));
        assert!(shared.first_failure().is_none());
    }

    #[tokio::test]
    async fn aborted_engine_skips_handlers() {
        let (_reg, snap) = listeners(vec![failing("never")]);
        let (job, _receipt) = make_job(snap, CancellationToken::new(), None);
        let shared = Shared::new();
        let runtime = CancellationToken::new();
        runtime.cancel();

        let (res, _reply) = run_job(job, false, &runtime, &shared).await;
        let report = res.unwrap();
        assert_eq!(report.cancelled(), 1);
        assert_eq!(report.status, JobStatus::Cancelled);
    }
}
