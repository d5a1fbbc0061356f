//! Channel-forwarding sink.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::EventSink;
use crate::event::ChangeEvent;
use crate::source::SourceName;

/// Receiver half paired with a [`ChannelSink`].
pub type EventReceiver = mpsc::Receiver<(SourceName, ChangeEvent)>;

/// Forwards events into a bounded channel.
///
/// Uses `try_send`: when the channel is full or closed the event is
/// dropped and counted, so a slow consumer never stalls a subscription.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<(SourceName, ChangeEvent)>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and its receiver with the given buffer size.
    pub fn new(buffer_size: usize) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Number of events dropped because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, source: &SourceName, event: &ChangeEvent) {
        if let Err(e) = self.tx.try_send((source.clone(), event.clone())) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                ns = %source,
                reason = match e {
                    mpsc::error::TrySendError::Full(_) => "full",
                    mpsc::error::TrySendError::Closed(_) => "closed",
                },
                "dropping change event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClusterTime, OperationType};

    fn event(increment: u32) -> ChangeEvent {
        ChangeEvent {
            operation: OperationType::Drop,
            document_key: None,
            namespace: None,
            rename_target: None,
            cluster_time: ClusterTime::new(1, increment),
            full_document: None,
            update_description: None,
            resume_token: None,
        }
    }

    #[tokio::test]
    async fn test_forwards_events() {
        let (sink, mut rx) = ChannelSink::new(4);
        let source = SourceName::new("d", "c");

        sink.deliver(&source, &event(1));
        sink.deliver(&source, &event(2));

        let (from, first) = rx.recv().await.unwrap();
        assert_eq!(from, source);
        assert_eq!(first.cluster_time.increment, 1);
        assert_eq!(rx.recv().await.unwrap().1.cluster_time.increment, 2);
        assert_eq!(sink.dropped(), 0);
    }

    #[tokio::test]
    async fn test_full_channel_drops() {
        let (sink, _rx) = ChannelSink::new(1);
        let source = SourceName::new("d", "c");

        sink.deliver(&source, &event(1));
        sink.deliver(&source, &event(2));

        assert_eq!(sink.dropped(), 1);
    }

    #[tokio::test]
    async fn test_closed_channel_drops() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);

        sink.deliver(&SourceName::new("d", "c"), &event(1));
        assert_eq!(sink.dropped(), 1);
    }
}
