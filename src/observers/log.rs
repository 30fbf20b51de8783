use async_trait::async_trait;
use tracing::debug;

use crate::events::Envelope;
use crate::observers::Observe;

/// Observer that writes every published event to the log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl Observe for LogWriter {
    async fn on_event(&self, env: &Envelope) {
        debug!(
            seq = env.seq,
            event_type = env.event_type.name(),
            event_id = %env.id,
            "event published"
        );
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
