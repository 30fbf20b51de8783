//! # Independent cursor over the broadcast channel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::envelope::Envelope;

/// Receiving side of a [`BroadcastChannel`](crate::BroadcastChannel) subscription.
///
/// Dropping the stream detaches it.
#[derive(Debug)]
pub struct EventStream {
    rx: Option<mpsc::UnboundedReceiver<Envelope>>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Envelope>) -> Self {
        Self { rx: Some(rx) }
    }

    pub(crate) fn closed() -> Self {
        Self { rx: None }
    }

    /// Receives the next envelope.
    ///
    /// Returns `None` once the channel is completed and drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        let rx = self.rx.as_mut()?;
        let env = rx.recv().await;
        if env.is_none() {
            self.rx = None;
        }
        env
    }

    /// Receives the next envelope without waiting.
    ///
    /// - `Ok(Some(env))`: an envelope was ready
    /// - `Ok(None)`: nothing buffered right now
    /// - `Err(StreamClosed)`: the channel was completed and drained
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, StreamClosed> {
        let rx = self.rx.as_mut().ok_or(StreamClosed)?;
        match rx.try_recv() {
            Ok(env) => Ok(Some(env)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Err(StreamClosed)
            }
        }
    }

    /// Number of envelopes buffered and not yet received.
    pub fn backlog(&self) -> usize {
        self.rx.as_ref().map_or(0, mpsc::UnboundedReceiver::len)
    }
}

/// The broadcast channel was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event stream closed")]
pub struct StreamClosed;
