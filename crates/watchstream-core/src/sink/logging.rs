//! Log-writer sink.

use tracing::info;

use super::EventSink;
use crate::event::ChangeEvent;
use crate::source::SourceName;

/// Logs every event as a `ChangeStreamEvent` line carrying the event JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingSink {
    fn deliver(&self, source: &SourceName, event: &ChangeEvent) {
        info!(
            ns = %source,
            op = %event.operation,
            cluster_time = %event.cluster_time,
            event = %event.to_json(),
            "ChangeStreamEvent"
        );
    }
}
