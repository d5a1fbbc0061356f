//! Collecting sink.

use parking_lot::Mutex;

use super::EventSink;
use crate::event::ChangeEvent;
use crate::source::SourceName;

/// Keeps every delivered event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(SourceName, ChangeEvent)>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events delivered so far.
    pub fn events(&self) -> Vec<(SourceName, ChangeEvent)> {
        self.events.lock().clone()
    }

    /// Events delivered from one source.
    pub fn events_for(&self, source: &SourceName) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(s, _)| s == source)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Number of events delivered.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if nothing was delivered.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn deliver(&self, source: &SourceName, event: &ChangeEvent) {
        self.events.lock().push((source.clone(), event.clone()));
    }
}
