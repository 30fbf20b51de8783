//! # Backpressure Example
//!
//! One concurrent job, no buffering: the producer is throttled to the pace
//! of a slow handler. `try_publish` shows the non-blocking variant failing
//! fast instead, and a caller token shows a timeout vs a cancellation.
//!
//! ## Run
//! ```bash
//! cargo run --example backpressure
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use courier::{Config, Dispatcher, Event, EventId, HandlerError, PublishError};
use tokio_util::sync::CancellationToken;

struct Frame {
    id: EventId,
    n: u32,
}

impl Event for Frame {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

fn frame(n: u32) -> Frame {
    Frame {
        id: EventId::new(),
        n,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let cfg = Config {
        max_concurrent: 1,
        buffer_events: false,
        timeout: Duration::from_millis(300),
        ..Config::default()
    };
    let dispatcher = Dispatcher::builder(cfg).build();

    let _sub = dispatcher.register_fn(|ev: Arc<Frame>, ctx: CancellationToken| async move {
        let work = Duration::from_millis(if ev.n == 99 { 1_000 } else { 100 });
        tokio::select! {
            _ = tokio::time::sleep(work) => Ok(()),
            _ = ctx.cancelled() => Err(HandlerError::Canceled),
        }
    });

    let started = Instant::now();
    for n in 0..5 {
        let _receipt = dispatcher.publish(frame(n), CancellationToken::new()).await?;
        println!("[publish] frame {n} accepted after {:?}", started.elapsed());
    }

    match dispatcher.try_publish(frame(5), CancellationToken::new()) {
        Err(PublishError::BufferFull { capacity }) => {
            println!("[try_publish] rejected, queue capacity {capacity}");
        }
        Ok(_) => println!("[try_publish] accepted"),
        Err(e) => return Err(e.into()),
    }

    let slow = dispatcher.publish(frame(99), CancellationToken::new()).await?;
    let report = slow.wait().await?;
    println!("[deadline] status {:?}", report.status);

    let caller = CancellationToken::new();
    let slow = dispatcher.publish(frame(99), caller.clone()).await?;
    caller.cancel();
    let report = slow.wait().await?;
    println!("[caller]   status {:?}", report.status);

    dispatcher.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}
