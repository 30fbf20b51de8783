//! # Observers of the all-events stream.
//!
//! - [`Observe`] the trait user code implements
//! - [`ObserverSet`] one worker per observer, fed by the broadcast channel
//! - [`LogWriter`] built-in observer that logs every event at debug level

mod log;
mod observer;
mod set;

pub use log::LogWriter;
pub use observer::Observe;
pub use set::ObserverSet;
