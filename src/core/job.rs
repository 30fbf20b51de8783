//! # Dispatch jobs, receipts and reports.
//!
//! A [`DispatchJob`] is "deliver this envelope to this snapshot of handlers".
//! It is created by `publish`, queued once, and consumed exactly once by the
//! worker loop. The producer keeps a [`Receipt`] to await the job's
//! [`DispatchReport`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, HandlerError};
use crate::events::{Envelope, EventType};
use crate::registry::Listeners;

pub(crate) type JobResult = Result<DispatchReport, DispatchError>;

/// One unit of work for the worker loop.
pub(crate) struct DispatchJob {
    /// The published event.
    pub(crate) envelope: Envelope,
    /// Handlers registered at enqueue time.
    pub(crate) listeners: Listeners,
    /// Caller's signal.
    pub(crate) caller: CancellationToken,
    /// Per-job deadline, measured from the moment the job starts executing.
    pub(crate) timeout: Option<Duration>,
    /// Where the outcome goes.
    pub(crate) reply: oneshot::Sender<JobResult>,
}

impl DispatchJob {
    pub(crate) fn new(
        envelope: Envelope,
        listeners: Listeners,
        caller: CancellationToken,
        timeout: Option<Duration>,
    ) -> (Self, Receipt) {
        let (reply, rx) = oneshot::channel();
        let receipt = Receipt {
            event_type: envelope.event_type,
            event_id: Arc::clone(&envelope.id),
            inner: ReceiptInner::Pending(rx),
        };
        let job = Self {
            envelope,
            listeners,
            caller,
            timeout,
            reply,
        };
        (job, receipt)
    }
}

/// Result of one handler invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The handler returned `Ok(())`.
    Completed,
    /// The handler returned an error or panicked.
    Failed(HandlerError),
    /// The job deadline elapsed before the handler finished.
    TimedOut,
    /// The caller's signal (or a forced shutdown) stopped the handler.
    Cancelled,
}

/// How a job ended as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Every handler settled on its own (successfully or not).
    Completed,
    /// At least one handler was cut off by the deadline.
    TimedOut,
    /// At least one handler was cut off by the caller or by shutdown.
    Cancelled,
}

/// Per-job summary delivered through the [`Receipt`].
#[derive(Clone, Debug)]
pub struct DispatchReport {
    /// Event type name.
    pub event_type: EventType,
    /// Event identifier.
    pub event_id: Arc<str>,
    /// `(handler name, outcome)` in snapshot order.
    pub outcomes: Vec<(String, HandlerOutcome)>,
    /// Overall status.
    pub status: JobStatus,
    /// Wall time from job start to the last handler settling.
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Report for a publish that found no handlers.
    pub(crate) fn empty(event_type: EventType, event_id: Arc<str>) -> Self {
        Self {
            event_type,
            event_id,
            outcomes: Vec::new(),
            status: JobStatus::Completed,
            elapsed: Duration::ZERO,
        }
    }

    /// Number of handlers the job fanned out to.
    pub fn handlers(&self) -> usize {
        self.outcomes.len()
    }

    /// Handlers that completed successfully.
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, HandlerOutcome::Completed))
    }

    /// Handlers that failed or panicked.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, HandlerOutcome::Failed(_)))
    }

    /// Handlers cut off by the deadline.
    pub fn timed_out(&self) -> usize {
        self.count(|o| matches!(o, HandlerOutcome::TimedOut))
    }

    /// Handlers cut off by cancellation.
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, HandlerOutcome::Cancelled))
    }

    /// Outcome of the first handler named `name`.
    pub fn outcome_of(&self, name: &str) -> Option<&HandlerOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }

    fn count(&self, pred: impl Fn(&HandlerOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Handle on a queued job.
///
/// Dropping the receipt does not affect the job.
#[must_use = "a Receipt does nothing unless awaited; drop it for fire-and-forget"]
pub struct Receipt {
    event_type: EventType,
    event_id: Arc<str>,
    inner: ReceiptInner,
}

enum ReceiptInner {
    Ready(DispatchReport),
    Pending(oneshot::Receiver<JobResult>),
}

impl Receipt {
    pub(crate) fn ready(report: DispatchReport) -> Self {
        Self {
            event_type: report.event_type,
            event_id: Arc::clone(&report.event_id),
            inner: ReceiptInner::Ready(report),
        }
    }

    /// Event type of the published event.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Identifier of the published event.
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// `false` when no handler was registered and nothing was queued.
    pub fn is_dispatched(&self) -> bool {
        matches!(self.inner, ReceiptInner::Pending(_))
    }

    /// Waits until every handler of the job has settled.
    ///
    /// Returns `Err(DispatchError::HandlerFailed)` only when the dispatcher
    /// runs with `continue_on_error = false` and a handler failed.
    pub async fn wait(self) -> Result<DispatchReport, DispatchError> {
        match self.inner {
            ReceiptInner::Ready(report) => Ok(report),
            ReceiptInner::Pending(rx) => rx.await.unwrap_or(Err(DispatchError::Dropped)),
        }
    }
}

impl fmt::Debug for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receipt")
            .field("event_type", &self.event_type.name())
            .field("event_id", &self.event_id)
            .field("dispatched", &self.is_dispatched())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;

    struct Ping;
    impl Event for Ping {
        fn id(&self) -> &str {
            "ping-1"
        }
    }

    #[tokio::test]
    async fn ready_receipt_resolves_immediately() {
        let report = DispatchReport::empty(EventType::of::<Ping>(), Arc::from("ping-1"));
        let receipt = Receipt::ready(report);
        assert!(!receipt.is_dispatched());
        assert_eq!(receipt.event_id(), "ping-1");

        let report = receipt.wait().await.unwrap();
        assert_eq!(report.handlers(), 0);
        assert_eq!(report.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn dropped_job_reports_dropped() {
        let env = Envelope::new(Arc::new(Ping));
        let (job, receipt) =
            DispatchJob::new(env, Arc::from(Vec::new()), CancellationToken::new(), None);
        assert!(receipt.is_dispatched());
        drop(job);
        assert_eq!(receipt.wait().await.unwrap_err(), DispatchError::Dropped);
    }

    #[test]
    fn report_counts_by_outcome() {
        let report = DispatchReport {
            event_type: EventType::of::<Ping>(),
            event_id: Arc::from("ping-1"),
            outcomes: vec![
                ("a".into(), HandlerOutcome::Completed),
                ("b".into(), HandlerOutcome::Failed(HandlerError::fail("x"))),
                ("c".into(), HandlerOutcome::TimedOut),
                ("d".into(), HandlerOutcome::Completed),
            ],
            status: JobStatus::TimedOut,
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(report.handlers(), 4);
        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.timed_out(), 1);
        assert_eq!(report.cancelled(), 0);
        assert_eq!(report.outcome_of("c"), Some(&HandlerOutcome::TimedOut));
    }
}
