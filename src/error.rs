//! Error types used by the courier runtime and by handlers.
//!
//! This module defines four error enums:
//!
//! - [`HandlerError`] - errors returned (or panics caught) inside a handler.
//! - [`PublishError`] - errors raised by the producer-facing `publish` calls.
//! - [`DispatchError`] - job-level failures propagated to the publisher when
//!   `continue_on_error` is disabled.
//! - [`RuntimeError`] - errors raised by the engine itself during shutdown.
//!
//! All types provide `as_label` (stable snake_case label for logs/metrics).

use std::time::Duration;
use thiserror::Error;

use crate::core::EngineState;

/// # Errors produced by handler execution.
///
/// Returned by [`Handler::handle`](crate::Handler::handle). A panic inside a
/// handler is caught at the handler boundary and converted to
/// [`HandlerError::Panicked`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler failed while processing the event.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler observed cancellation and gave up.
    #[error("handler cancelled")]
    Canceled,

    /// Handler panicked; the panic was caught by the engine.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use courier::HandlerError;
    ///
    /// let err = HandlerError::fail("boom");
    /// assert_eq!(err.as_label(), "handler_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Canceled => "handler_canceled",
            HandlerError::Panicked { .. } => "handler_panicked",
        }
    }
}

/// # Errors returned to producers by `publish`.
///
/// None of these affect engine state: the event was simply not accepted.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The event failed validation (e.g. empty identifier).
    #[error("invalid event {event_type}: {reason}")]
    InvalidEvent {
        /// Event type name.
        event_type: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The job queue is full and the non-blocking variant was used.
    #[error("dispatch buffer full (capacity {capacity})")]
    BufferFull {
        /// Effective queue capacity.
        capacity: usize,
    },

    /// The engine is draining or stopped and accepts no more jobs.
    #[error("dispatcher is not accepting events (state: {state:?})")]
    Closed {
        /// State observed when the publish was rejected.
        state: EngineState,
    },

    /// The caller's token fired while the producer was suspended on a full queue.
    #[error("publish cancelled while waiting for queue capacity")]
    Cancelled,
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::InvalidEvent { .. } => "publish_invalid_event",
            PublishError::BufferFull { .. } => "publish_buffer_full",
            PublishError::Closed { .. } => "publish_closed",
            PublishError::Cancelled => "publish_cancelled",
        }
    }

    /// Whether retrying the same publish later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::BufferFull { .. })
    }
}

/// # Job-level failures.
///
/// Only surfaced when `continue_on_error` is `false`, after all sibling
/// handlers of the job have settled.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A handler failed while processing the event.
    #[error("handler {handler} failed on {event_type} ({event_id}): {error}")]
    HandlerFailed {
        /// Event type name.
        event_type: &'static str,
        /// Event identifier.
        event_id: String,
        /// Name of the failing handler.
        handler: String,
        /// The handler's error.
        error: HandlerError,
    },

    /// The job was dropped before it reported an outcome (engine aborted).
    #[error("dispatch job dropped before completion")]
    Dropped,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::HandlerFailed { .. } => "dispatch_handler_failed",
            DispatchError::Dropped => "dispatch_dropped",
        }
    }
}

/// # Errors produced by the courier runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; in-flight jobs were cancelled.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; cancelling in-flight handlers")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// In-flight jobs (`EventType#event_id`) that did not finish in time.
        stuck: Vec<String>,
    },

    /// Registering the OS signal listeners failed.
    #[error("signal listener failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use courier::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_render() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*s), "static");
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*s), "owned");
        let s: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*s), "unknown panic");
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(HandlerError::Canceled.as_label(), "handler_canceled");
        assert_eq!(
            PublishError::BufferFull { capacity: 1 }.as_label(),
            "publish_buffer_full"
        );
        assert_eq!(DispatchError::Dropped.as_label(), "dispatch_dropped");
    }

    #[test]
    fn only_buffer_full_is_transient() {
        assert!(PublishError::BufferFull { capacity: 4 }.is_transient());
        assert!(!PublishError::Cancelled.is_transient());
        assert!(!PublishError::Closed {
            state: EngineState::Stopped
        }
        .is_transient());
    }

    #[test]
    fn handler_failed_message_carries_context() {
        let err = DispatchError::HandlerFailed {
            event_type: "OrderPlaced",
            event_id: "abc".into(),
            handler: "billing".into(),
            error: HandlerError::fail("db down"),
        };
        let msg = err.to_string();
        assert!(msg.contains("billing"));
        assert!(msg.contains("OrderPlaced"));
        assert!(msg.contains("db down"));
    }
}
