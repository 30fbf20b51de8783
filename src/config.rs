//! # Dispatcher configuration.
//!
//! Provides [`Config`], the immutable record handed to
//! [`Dispatcher::builder`](crate::Dispatcher::builder) once at startup.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` (or negative in the loaded document) → available hardware parallelism
//! - `timeout = 0s` → no per-job deadline
//! - `buffer_events = false` → queue capacity 1 (producers feel backpressure)
//!
//! ## Loading
//! `Config` deserializes from the host's config loader using camelCase keys:
//! ```
//! use std::time::Duration;
//! use courier::Config;
//!
//! let cfg: Config = serde_json::from_str(
//!     r#"{ "maxConcurrentTasks": 4, "timeoutMilliseconds": 250, "bufferEvents": false }"#,
//! ).unwrap();
//!
//! assert_eq!(cfg.max_concurrent, 4);
//! assert_eq!(cfg.dispatch_timeout(), Some(Duration::from_millis(250)));
//! assert_eq!(cfg.queue_capacity(), 1);
//! assert!(cfg.continue_on_error);
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tokio::sync::Semaphore;

/// Configuration for the dispatch engine.
///
/// ## Field semantics
/// - `max_concurrent`: jobs fanning out at the same time (`0` = available parallelism)
/// - `continue_on_error`: swallow handler failures after logging (`false` = propagate per job)
/// - `timeout`: per-job deadline shared by all handlers of the job (`0s` = none)
/// - `buffer_events` / `max_buffer_size`: job queue capacity policy
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Global ceiling on concurrently executing dispatch jobs.
    #[serde(rename = "maxConcurrentTasks", deserialize_with = "count")]
    pub max_concurrent: usize,

    /// Whether a failing handler is only logged (`true`) or also propagated
    /// to the job's receipt (`false`).
    pub continue_on_error: bool,

    /// Per-job deadline.
    #[serde(rename = "timeoutMilliseconds", deserialize_with = "millis")]
    pub timeout: Duration,

    /// Whether the queue buffers up to `max_buffer_size` jobs.
    pub buffer_events: bool,

    /// Queue capacity when `buffer_events` is set.
    #[serde(deserialize_with = "count")]
    pub max_buffer_size: usize,
}

impl Config {
    /// Returns the effective concurrency ceiling.
    ///
    /// `0` resolves to [`std::thread::available_parallelism`] (1 if unknown).
    /// Capped at [`Semaphore::MAX_PERMITS`].
    #[inline]
    pub fn concurrency_limit(&self) -> usize {
        match self.max_concurrent {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n.min(Semaphore::MAX_PERMITS),
        }
    }

    /// Returns the per-job deadline as an `Option`.
    ///
    /// - `None` → handlers run until they finish or the caller cancels
    /// - `Some(d)` → outstanding handlers are cancelled `d` after the job starts
    #[inline]
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the job queue capacity.
    ///
    /// `1` when buffering is disabled, otherwise `max_buffer_size` kept within
    /// `1..=`[`Semaphore::MAX_PERMITS`].
    #[inline]
    pub fn queue_capacity(&self) -> usize {
        if self.buffer_events {
            self.max_buffer_size.clamp(1, Semaphore::MAX_PERMITS)
        } else {
            1
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_concurrent = 0` (available parallelism)
    /// - `continue_on_error = true`
    /// - `timeout = 30s`
    /// - `buffer_events = true`, `max_buffer_size = 1000`
    fn default() -> Self {
        Self {
            max_concurrent: 0,
            continue_on_error: true,
            timeout: Duration::from_millis(30_000),
            buffer_events: true,
            max_buffer_size: 1000,
        }
    }
}

/// Reads a millisecond count; negative values are treated as "no timeout".
fn millis<'de, D>(de: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = i64::deserialize(de)?;
    Ok(Duration::from_millis(ms.max(0) as u64))
}

/// Reads a count; negative values fall back to the `0` sentinel.
fn count<'de, D>(de: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let n = i64::deserialize(de)?;
    Ok(usize::try_from(n).unwrap_or(0))
}
