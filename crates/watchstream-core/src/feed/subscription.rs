//! Feed subscription loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::state::{SubscriptionState, TerminationReason};
use crate::error::Error;
use crate::event::OperationType;
use crate::metrics::{SourceMetrics, SourceMetricsSnapshot};
use crate::normalize::normalize;
use crate::sink::SharedSink;
use crate::source::SourceName;
use crate::store::{ChangeFeed, FeedOptions, SharedStore, StoreError};

/// Default wait after an empty poll.
pub const DEFAULT_EMPTY_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// What to do with a record that fails normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedRecordPolicy {
    /// Close the feed and terminate this source.
    #[default]
    Terminate,
    /// Log the record, count it, and keep streaming.
    Skip,
}

/// Subscription settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Wait after an empty poll before reading again.
    pub empty_poll_interval: Duration,
    /// Handling of malformed records.
    pub on_malformed: MalformedRecordPolicy,
}

impl SubscriptionConfig {
    /// Set the empty-poll wait.
    pub fn with_empty_poll_interval(mut self, interval: Duration) -> Self {
        self.empty_poll_interval = interval;
        self
    }

    /// Set the malformed record policy.
    pub fn with_malformed_policy(mut self, policy: MalformedRecordPolicy) -> Self {
        self.on_malformed = policy;
        self
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            empty_poll_interval: DEFAULT_EMPTY_POLL_INTERVAL,
            on_malformed: MalformedRecordPolicy::default(),
        }
    }
}

/// Final result of a subscription.
#[derive(Debug)]
pub struct SubscriptionOutcome {
    /// The source that stopped.
    pub source: SourceName,
    /// The error that stopped it.
    pub error: Error,
    /// Counters at termination.
    pub metrics: SourceMetricsSnapshot,
}

impl SubscriptionOutcome {
    /// Classified termination reason.
    pub fn reason(&self) -> TerminationReason {
        TerminationReason::from_error(&self.error)
    }
}

/// A long-lived pull loop against one source's change feed.
pub struct FeedSubscription {
    source: SourceName,
    store: SharedStore,
    sink: SharedSink,
    config: SubscriptionConfig,
    metrics: Arc<SourceMetrics>,
    state: watch::Sender<SubscriptionState>,
}

impl FeedSubscription {
    /// Create a subscription in the `Opening` state.
    pub fn new(
        source: SourceName,
        store: SharedStore,
        sink: SharedSink,
        config: SubscriptionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Opening);
        Self {
            source,
            store,
            sink,
            config,
            metrics: Arc::new(SourceMetrics::new()),
            state,
        }
    }

    /// The watched source.
    pub fn source(&self) -> &SourceName {
        &self.source
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Shared handle to this subscription's counters.
    pub fn metrics(&self) -> Arc<SourceMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until the source terminates.
    ///
    /// Never returns while the feed keeps delivering records or empty polls.
    pub async fn run(self) -> SubscriptionOutcome {
        let error = self.stream().await;
        let reason = TerminationReason::from_error(&error);
        let metrics = self.metrics.snapshot();

        error!(
            error = %error,
            events_delivered = metrics.events_delivered,
            empty_polls = metrics.empty_polls,
            uptime_secs = self.metrics.uptime().as_secs(),
            "subscription terminated"
        );
        self.state.send_replace(SubscriptionState::Terminated(reason));

        SubscriptionOutcome {
            source: self.source,
            error,
            metrics,
        }
    }

    async fn stream(&self) -> Error {
        self.state.send_replace(SubscriptionState::Opening);

        let mut feed = match self
            .store
            .open_feed(&self.source, FeedOptions::update_lookup())
            .await
        {
            Ok(feed) => feed,
            Err(error) => {
                return Error::SubscriptionOpenFailed {
                    ns: self.source.clone(),
                    error,
                }
            }
        };

        info!("subscription opened");
        self.state.send_replace(SubscriptionState::Streaming);

        loop {
            match feed.next_record().await {
                Ok(Some(raw)) => match normalize(&raw) {
                    Ok(event) => {
                        self.sink.deliver(&self.source, &event);
                        self.metrics.record_event(event.cluster_time);

                        if event.operation == OperationType::Invalidate {
                            self.metrics.record_feed_error();
                            return self
                                .terminate(
                                    &mut feed,
                                    StoreError::Stream("change stream invalidated".to_string()),
                                )
                                .await;
                        }
                    }
                    Err(error) => {
                        self.metrics.record_malformed();
                        match self.config.on_malformed {
                            MalformedRecordPolicy::Skip => {
                                warn!(error = %error, "skipping malformed record");
                            }
                            MalformedRecordPolicy::Terminate => {
                                feed.close().await;
                                return Error::MalformedRecord {
                                    ns: self.source.clone(),
                                    error,
                                };
                            }
                        }
                    }
                },
                Ok(None) => {
                    self.metrics.record_empty_poll();
                    self.state.send_replace(SubscriptionState::Retrying);
                    debug!(
                        backoff = ?self.config.empty_poll_interval,
                        "no change available"
                    );
                    tokio::time::sleep(self.config.empty_poll_interval).await;
                    self.state.send_replace(SubscriptionState::Streaming);
                }
                Err(error) => {
                    self.metrics.record_feed_error();
                    return self.terminate(&mut feed, error).await;
                }
            }
        }
    }

    async fn terminate(&self, feed: &mut Box<dyn ChangeFeed>, error: StoreError) -> Error {
        feed.close().await;
        Error::FeedError {
            ns: self.source.clone(),
            error,
        }
    }
}
