#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier::{Config, Event, EventId, Handler, HandlerError};
use tokio_util::sync::CancellationToken;

/// Test event carrying a generated id.
#[derive(Debug)]
pub struct Ping {
    pub id: EventId,
    pub n: u32,
}

impl Ping {
    pub fn new(n: u32) -> Self {
        Self {
            id: EventId::new(),
            n,
        }
    }
}

impl Event for Ping {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// A second event type nobody listens to unless a test says so.
#[derive(Debug)]
pub struct Pong {
    pub id: EventId,
}

impl Pong {
    pub fn new() -> Self {
        Self { id: EventId::new() }
    }
}

impl Event for Pong {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// Handler that records every event it sees.
pub struct Recorder {
    name: &'static str,
    pub seen: Mutex<Vec<Arc<Ping>>>,
}

impl Recorder {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Handler<Ping> for Recorder {
    async fn handle(&self, event: Arc<Ping>, _ctx: CancellationToken) -> Result<(), HandlerError> {
        self.seen.lock().unwrap().push(event);
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Handler that sleeps, honouring cancellation, and counts completions.
pub struct Sleeper {
    name: &'static str,
    pub delay: Duration,
    pub done: AtomicUsize,
}

impl Sleeper {
    pub fn new(name: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay,
            done: AtomicUsize::new(0),
        })
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler<Ping> for Sleeper {
    async fn handle(&self, _event: Arc<Ping>, ctx: CancellationToken) -> Result<(), HandlerError> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {
                self.done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ = ctx.cancelled() => Err(HandlerError::Canceled),
        }
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Handler that always fails.
pub struct Failing;

#[async_trait]
impl Handler<Ping> for Failing {
    async fn handle(&self, _event: Arc<Ping>, _ctx: CancellationToken) -> Result<(), HandlerError> {
        Err(HandlerError::fail("always fails"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub fn config(max_concurrent: usize) -> Config {
    Config {
        max_concurrent,
        ..Config::default()
    }
}
