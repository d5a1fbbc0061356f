//! Event sink contract and implementations.
//!
//! A sink receives one normalized event per call. Delivery is synchronous
//! and best-effort: a sink never blocks the subscription and never fails
//! it.

mod channel;
mod logging;
mod memory;
mod stdout;

use std::sync::Arc;

use crate::event::ChangeEvent;
use crate::source::SourceName;

pub use self::channel::{ChannelSink, EventReceiver};
pub use self::logging::TracingSink;
pub use self::memory::MemorySink;
pub use self::stdout::StdoutSink;

/// Consumer of normalized change events.
pub trait EventSink: Send + Sync {
    /// Deliver one event from `source`.
    fn deliver(&self, source: &SourceName, event: &ChangeEvent);
}

/// Shared sink handle.
pub type SharedSink = Arc<dyn EventSink>;
