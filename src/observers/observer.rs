//! # Observer: diagnostic consumer of the all-events stream
//!
//! [`Observe`] is the extension point for code that wants to see **every**
//! published event regardless of handler registration: audit trails, metrics
//! export, debugging dumps.
//!
//! ## Contract
//! - Called from an observer-dedicated worker task; a slow observer never
//!   blocks publishers, handlers, or other observers.
//! - A slow observer only grows its own backlog; it still sees every event,
//!   in publish order.
//! - A panic is caught and logged; the observer keeps receiving events.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use courier::{Envelope, Observe};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Observe for Audit {
//!     async fn on_event(&self, env: &Envelope) {
//!         let _ = (env.seq, env.event_type.name());
//!     }
//!     fn name(&self) -> &'static str { "audit" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Envelope;

/// Contract for broadcast-channel observers.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Handles one envelope. The payload can be recovered with
    /// [`Envelope::downcast_ref`].
    async fn on_event(&self, env: &Envelope);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        crate::events::short_type_name::<Self>()
    }
}
