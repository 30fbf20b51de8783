//! # Basic Example
//!
//! Registers an object handler and a closure for the same event type,
//! publishes a few events and waits for the reports.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example basic
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier::{Config, Dispatcher, Event, EventId, Handler, HandlerError, HandlerRef};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct OrderPlaced {
    id: EventId,
    amount_cents: u64,
}

impl Event for OrderPlaced {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Default)]
struct Revenue {
    total: AtomicU64,
}

#[async_trait]
impl Handler<OrderPlaced> for Revenue {
    async fn handle(
        &self,
        ev: Arc<OrderPlaced>,
        _ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        self.total.fetch_add(ev.amount_cents, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "revenue"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Config {
        max_concurrent: 4,
        timeout: Duration::from_secs(2),
        ..Config::default()
    };
    let dispatcher = Dispatcher::builder(cfg).build();

    let revenue = Arc::new(Revenue::default());
    let handler: HandlerRef<OrderPlaced> = revenue.clone();
    let _revenue_sub = dispatcher.register(handler);
    let audit = dispatcher.register_fn(|ev: Arc<OrderPlaced>, _ctx: CancellationToken| async move {
        println!("[audit] order {} for {} cents", ev.id(), ev.amount_cents);
        Ok::<_, HandlerError>(())
    });

    println!("listeners: {}", dispatcher.listener_count_of::<OrderPlaced>());

    for amount_cents in [1_250, 990, 4_000] {
        let ev = OrderPlaced {
            id: EventId::new(),
            amount_cents,
        };
        let report = dispatcher
            .publish(ev, CancellationToken::new())
            .await?
            .wait()
            .await?;
        println!(
            "[report] {} handlers, {} completed in {:?}",
            report.handlers(),
            report.completed(),
            report.elapsed
        );
    }

    audit.release();
    println!("listeners after release: {}", dispatcher.listener_count());

    dispatcher.wait_for_completion().await?;
    println!("revenue: {} cents", revenue.total.load(Ordering::Relaxed));
    println!("stats: {:?}", dispatcher.stats());
    Ok(())
}
