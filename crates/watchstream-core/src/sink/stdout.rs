//! JSON lines sink.

use std::io::Write;

use super::EventSink;
use crate::event::ChangeEvent;
use crate::source::SourceName;

/// Writes one JSON line per event to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl StdoutSink {
    /// Create a new stdout sink.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for StdoutSink {
    fn deliver(&self, source: &SourceName, event: &ChangeEvent) {
        let line = event.to_json();
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            tracing::warn!(ns = %source, error = %e, "failed to write event to stdout");
        }
    }
}
