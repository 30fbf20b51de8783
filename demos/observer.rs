//! # Observer Example
//!
//! Attaches the built-in `LogWriter` and a custom observer that counts events
//! by type, then runs until Ctrl-C (or for two seconds).
//!
//! ## Run
//! ```bash
//! RUST_LOG=courier=debug cargo run --example observer
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier::{
    Config, Dispatcher, Envelope, Event, EventId, HandlerError, LogWriter, Observe, ServerStarted,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct Heartbeat {
    id: EventId,
}

impl Event for Heartbeat {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Default)]
struct TypeCounter {
    seen: Mutex<HashMap<&'static str, u64>>,
}

#[async_trait]
impl Observe for TypeCounter {
    async fn on_event(&self, env: &Envelope) {
        if let Ok(mut seen) = self.seen.lock() {
            *seen.entry(env.event_type.name()).or_default() += 1;
        }
    }

    fn name(&self) -> &'static str {
        "type_counter"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let counter = Arc::new(TypeCounter::default());
    let dispatcher = Dispatcher::builder(Config::default())
        .with_observers(vec![
            Arc::new(LogWriter) as Arc<dyn Observe>,
            counter.clone() as Arc<dyn Observe>,
        ])
        .build();

    let _ready = dispatcher.register_fn(|_ev: Arc<ServerStarted>, _ctx: CancellationToken| async {
        println!("[lifecycle] server started");
        Ok::<_, HandlerError>(())
    });

    let ticker = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(250));
            for _ in 0..8 {
                tick.tick().await;
                let ev = Heartbeat { id: EventId::new() };
                if dispatcher.publish(ev, CancellationToken::new()).await.is_err() {
                    break;
                }
            }
        })
    };

    let stop = async {
        tokio::select! {
            res = tokio::signal::ctrl_c() => res,
            _ = tokio::time::sleep(Duration::from_secs(2)) => Ok(()),
        }
    };
    dispatcher.run_until(stop, Duration::from_secs(1)).await?;
    ticker.await?;

    if let Ok(seen) = counter.seen.lock() {
        println!("seen by type: {seen:?}");
    }
    Ok(())
}
