mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier::{
    Dispatcher, EngineState, Envelope, HandlerError, HandlerOutcome, HandlerRef, JobStatus,
    Observe, PublishError, RuntimeError, ServerStarted, ServerStopping,
};
use tokio_util::sync::CancellationToken;

use common::{config, Ping, Pong, Recorder, Sleeper};

#[tokio::test]
async fn wait_for_completion_stops_accepting_and_is_idempotent() {
    let d = Dispatcher::builder(config(2)).build();
    let rec = Recorder::new("rec");
    let _s = d.register(Arc::clone(&rec) as HandlerRef<Ping>);
    assert_eq!(d.state(), EngineState::Accepting);

    for n in 0..5 {
        let _ = d.publish(Ping::new(n), CancellationToken::new()).await.unwrap();
    }
    d.wait_for_completion().await.unwrap();
    assert_eq!(d.state(), EngineState::Stopped);
    assert_eq!(rec.count(), 5);
    assert_eq!(d.stats().pending_jobs(), 0);
    assert_eq!(d.in_flight(), 0);

    let err = d
        .publish(Ping::new(9), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PublishError::Closed {
            state: EngineState::Stopped
        }
    );
    assert!(d.try_publish(Pong::new(), CancellationToken::new()).is_err());
    assert!(d.all_events().is_completed());

    d.wait_for_completion().await.unwrap();
}

#[tokio::test]
async fn queued_jobs_are_drained_before_stopping() {
    let d = Dispatcher::builder(config(1)).build();
    let sleeper = Sleeper::new("sleeper", Duration::from_millis(5));
    let _s = d.register(Arc::clone(&sleeper) as HandlerRef<Ping>);

    let mut receipts = Vec::new();
    for n in 0..8 {
        receipts.push(d.publish(Ping::new(n), CancellationToken::new()).await.unwrap());
    }
    d.wait_for_completion().await.unwrap();

    assert_eq!(sleeper.done(), 8);
    for receipt in receipts {
        assert_eq!(receipt.wait().await.unwrap().status, JobStatus::Completed);
    }
}

/// Ignores its cancellation token.
struct Stubborn;

#[async_trait]
impl courier::Handler<Ping> for Stubborn {
    async fn handle(&self, _event: Arc<Ping>, _ctx: CancellationToken) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "stubborn"
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_handlers_after_grace() {
    let d = Dispatcher::builder(config(2)).build();
    let _s = d.register(Arc::new(Stubborn) as HandlerRef<Ping>);

    let ev = Ping::new(1);
    let label = format!("Ping#{}", ev.id);
    let receipt = d.publish(ev, CancellationToken::new()).await.unwrap();
    tokio::task::yield_now().await;

    let err = d.shutdown(Duration::from_millis(100)).await.unwrap_err();
    match &err {
        RuntimeError::GraceExceeded { grace, stuck } => {
            assert_eq!(*grace, Duration::from_millis(100));
            assert_eq!(stuck, &vec![label]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.as_label(), "runtime_grace_exceeded");
    assert_eq!(d.state(), EngineState::Stopped);

    let report = receipt.wait().await.unwrap();
    assert_eq!(report.outcome_of("stubborn"), Some(&HandlerOutcome::Cancelled));
    assert_eq!(report.status, JobStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn shutdown_within_grace_is_ok() {
    let d = Dispatcher::builder(config(2)).build();
    let sleeper = Sleeper::new("sleeper", Duration::from_millis(50));
    let _s = d.register(Arc::clone(&sleeper) as HandlerRef<Ping>);
    let _ = d.publish(Ping::new(1), CancellationToken::new()).await.unwrap();

    d.shutdown(Duration::from_secs(1)).await.unwrap();
    assert_eq!(sleeper.done(), 1);
}

#[tokio::test]
async fn run_until_publishes_lifecycle_events() {
    let d = Dispatcher::builder(config(2)).build();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = Arc::clone(&order);
    let _started = d.register_fn(move |_ev: Arc<ServerStarted>, _ctx: CancellationToken| {
        let o = Arc::clone(&o);
        async move {
            o.lock().unwrap().push("started");
            Ok::<_, HandlerError>(())
        }
    });
    let o = Arc::clone(&order);
    let _stopping = d.register_fn(move |_ev: Arc<ServerStopping>, _ctx: CancellationToken| {
        let o = Arc::clone(&o);
        async move {
            o.lock().unwrap().push("stopping");
            Ok::<_, HandlerError>(())
        }
    });

    let o = Arc::clone(&order);
    let stop = async move {
        o.lock().unwrap().push("stop");
        Ok::<_, std::io::Error>(())
    };
    d.run_until(stop, Duration::from_secs(1)).await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["started", "stop", "stopping"]);
    assert_eq!(d.state(), EngineState::Stopped);
}

#[tokio::test]
async fn failed_stop_trigger_surfaces_as_signal_error() {
    let d = Dispatcher::builder(config(1)).build();
    let stop = async { Err::<(), _>(std::io::Error::other("no signals here")) };
    let err = d.run_until(stop, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Signal(_)));
}

#[derive(Default)]
struct Tally {
    seen: AtomicUsize,
    names: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Observe for Tally {
    async fn on_event(&self, env: &Envelope) {
        self.seen.fetch_add(1, Ordering::SeqCst);
        self.names.lock().unwrap().push(env.event_type.name());
    }

    fn name(&self) -> &'static str {
        "tally"
    }
}

#[tokio::test]
async fn observers_see_every_event_and_stop_with_the_dispatcher() {
    let tally = Arc::new(Tally::default());
    let d = Dispatcher::builder(config(2))
        .with_observers(vec![
            Arc::clone(&tally) as Arc<dyn Observe>,
            Arc::new(courier::LogWriter) as Arc<dyn Observe>,
        ])
        .build();
    let _s = d.register(Recorder::new("rec") as HandlerRef<Ping>);

    let _ = d.publish(Ping::new(1), CancellationToken::new()).await.unwrap();
    let _ = d.publish(Pong::new(), CancellationToken::new()).await.unwrap();
    d.wait_for_completion().await.unwrap();

    assert_eq!(tally.seen.load(Ordering::SeqCst), 2);
    assert_eq!(*tally.names.lock().unwrap(), vec!["Ping", "Pong"]);
}
