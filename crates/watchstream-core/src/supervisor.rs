//! Watch supervisor.
//!
//! Starts one [`FeedSubscription`] task per source and keeps a registry of
//! them, indexed by [`SourceName`], so terminations can be observed and
//! health reported. Tasks share nothing but the store handle and the sink;
//! one source's failure never reaches another.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{Id, JoinSet};
use tracing::{error, info, warn, Instrument};

use crate::error::Error;
use crate::feed::{
    FeedSubscription, SubscriptionConfig, SubscriptionOutcome, SubscriptionState,
    TerminationReason,
};
use crate::metrics::{self, SourceMetrics, SourceMetricsSnapshot};
use crate::sink::SharedSink;
use crate::source::{SourceName, WatchSet};
use crate::store::SharedStore;

/// When source terminations escalate to a process-level failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Escalate once more than this many sources have terminated.
    /// `None` never escalates.
    pub max_terminated_sources: Option<usize>,
}

impl EscalationPolicy {
    /// Never escalate.
    pub fn never() -> Self {
        Self::default()
    }

    /// Escalate once more than `limit` sources have terminated.
    pub fn max_terminated(limit: usize) -> Self {
        Self {
            max_terminated_sources: Some(limit),
        }
    }

    fn exceeded(&self, terminated: usize) -> Option<usize> {
        self.max_terminated_sources.filter(|&limit| terminated > limit)
    }
}

/// Health snapshot of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHealth {
    /// The watched source.
    pub source: SourceName,
    /// Latest published subscription state.
    pub state: SubscriptionState,
    /// Counters at the time of the snapshot.
    pub metrics: SourceMetricsSnapshot,
}

/// A source whose task has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatedSource {
    /// The source that stopped.
    pub source: SourceName,
    /// Why it stopped.
    pub reason: TerminationReason,
}

struct SourceTask {
    state: watch::Receiver<SubscriptionState>,
    metrics: Arc<SourceMetrics>,
    // Set when the task ended without publishing a final state.
    aborted: Option<TerminationReason>,
}

impl SourceTask {
    fn current_state(&self) -> SubscriptionState {
        match &self.aborted {
            Some(reason) => SubscriptionState::Terminated(reason.clone()),
            None => self.state.borrow().clone(),
        }
    }
}

/// Runs one subscription task per watched source.
pub struct WatchSupervisor {
    store: SharedStore,
    sink: SharedSink,
    config: SubscriptionConfig,
    escalation: EscalationPolicy,
    registry: BTreeMap<SourceName, SourceTask>,
    tasks: JoinSet<SubscriptionOutcome>,
    task_sources: HashMap<Id, SourceName>,
    terminated: usize,
}

impl WatchSupervisor {
    /// Create a supervisor with no running sources.
    pub fn new(store: SharedStore, sink: SharedSink, config: SubscriptionConfig) -> Self {
        Self {
            store,
            sink,
            config,
            escalation: EscalationPolicy::default(),
            registry: BTreeMap::new(),
            tasks: JoinSet::new(),
            task_sources: HashMap::new(),
            terminated: 0,
        }
    }

    /// Set the escalation policy.
    pub fn with_escalation(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = escalation;
        self
    }

    /// Start one subscription per source, without waiting on any of them.
    ///
    /// Must be called from within a tokio runtime. Sources already in the
    /// registry are skipped.
    pub fn spawn(&mut self, watch_set: &WatchSet) {
        for source in watch_set {
            if self.registry.contains_key(source) {
                warn!(ns = %source, "source already watched, skipping");
                continue;
            }

            info!(ns = %source, "StartWatch");

            let subscription = FeedSubscription::new(
                source.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.sink),
                self.config,
            );
            self.registry.insert(
                subscription.source().clone(),
                SourceTask {
                    state: subscription.state(),
                    metrics: subscription.metrics(),
                    aborted: None,
                },
            );

            let span = tracing::info_span!("watch", ns = %source);
            let handle = self.tasks.spawn(subscription.run().instrument(span));
            self.task_sources.insert(handle.id(), source.clone());
        }
    }

    /// Number of subscription tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Number of sources that have terminated.
    pub fn terminated(&self) -> usize {
        self.terminated
    }

    /// Health of every registered source, sorted by source.
    pub fn health(&self) -> Vec<SourceHealth> {
        self.registry
            .iter()
            .map(|(source, task)| SourceHealth {
                source: source.clone(),
                state: task.current_state(),
                metrics: task.metrics.snapshot(),
            })
            .collect()
    }

    /// Per-source counters in Prometheus text format.
    pub fn prometheus(&self) -> String {
        metrics::to_prometheus(
            self.registry
                .iter()
                .map(|(source, task)| (source, task.metrics.snapshot())),
        )
    }

    /// Wait for the next source to terminate.
    ///
    /// Returns `None` once no task is left.
    pub async fn next_termination(&mut self) -> Option<TerminatedSource> {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            let terminated = match joined {
                Ok((id, outcome)) => {
                    self.task_sources.remove(&id);
                    TerminatedSource {
                        reason: outcome.reason(),
                        source: outcome.source,
                    }
                }
                Err(join_error) => {
                    let Some(source) = self.task_sources.remove(&join_error.id()) else {
                        error!(error = %join_error, "subscription task ended without a source");
                        continue;
                    };
                    let reason = TerminationReason::Aborted(join_error.to_string());
                    if let Some(task) = self.registry.get_mut(&source) {
                        task.aborted = Some(reason.clone());
                    }
                    TerminatedSource { source, reason }
                }
            };

            self.terminated += 1;
            warn!(
                ns = %terminated.source,
                reason = %terminated.reason,
                running = self.tasks.len(),
                terminated = self.terminated,
                "source no longer watched"
            );
            return Some(terminated);
        }
        None
    }

    /// Observe terminations until the escalation policy fires or every
    /// source has terminated. Does not return while any source is healthy
    /// and the policy holds.
    pub async fn supervise(&mut self) -> Error {
        while self.next_termination().await.is_some() {
            if let Some(limit) = self.escalation.exceeded(self.terminated) {
                error!(
                    terminated = self.terminated,
                    limit, "too many sources terminated, escalating"
                );
                return Error::Escalated {
                    terminated: self.terminated,
                    limit,
                };
            }
        }

        Error::AllSourcesTerminated {
            terminated: self.terminated,
        }
    }

    /// Start every source in `watch_set` and supervise them.
    pub async fn run(&mut self, watch_set: &WatchSet) -> Error {
        self.spawn(watch_set);
        self.supervise().await
    }

    /// Abort every running subscription and wait for them to stop.
    pub async fn shutdown(&mut self) {
        let running = self.tasks.len();
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        self.task_sources.clear();
        info!(aborted = running, "supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeEvent;
    use crate::memory::{FeedStep, MemoryStore};
    use crate::sink::{EventSink, MemorySink};
    use serde_json::json;
    use std::time::Duration;

    struct PanickingSink;

    impl EventSink for PanickingSink {
        fn deliver(&self, source: &SourceName, _event: &ChangeEvent) {
            panic!("sink failed for {}", source.database);
        }
    }

    fn insert(source: &SourceName) -> FeedStep {
        FeedStep::Record(json!({
            "operationType": "insert",
            "clusterTime": {"$timestamp": {"t": 1700000000, "i": 1}},
            "ns": {"db": source.database, "coll": source.collection},
            "documentKey": {"_id": 1}
        }))
    }

    fn fast_config() -> SubscriptionConfig {
        SubscriptionConfig::default().with_empty_poll_interval(Duration::from_millis(1))
    }

    fn failing_store(sources: &[SourceName]) -> MemoryStore {
        sources.iter().fold(MemoryStore::new(), |store, source| {
            store.with_feed(source.clone(), vec![FeedStep::Fail("boom".into())])
        })
    }

    fn sources(n: usize) -> Vec<SourceName> {
        (1..=n)
            .map(|i| SourceName::new(format!("db_{:03}", i), "orders"))
            .collect()
    }

    #[test]
    fn test_escalation_policy() {
        assert_eq!(EscalationPolicy::never().exceeded(100), None);
        assert_eq!(EscalationPolicy::max_terminated(2).exceeded(2), None);
        assert_eq!(EscalationPolicy::max_terminated(2).exceeded(3), Some(2));
    }

    #[tokio::test]
    async fn test_all_sources_terminated() {
        let sources = sources(2);
        let store = Arc::new(failing_store(&sources));
        let mut supervisor =
            WatchSupervisor::new(store, Arc::new(MemorySink::new()), fast_config());

        let error = supervisor.run(&WatchSet::new(sources)).await;

        assert!(matches!(error, Error::AllSourcesTerminated { terminated: 2 }));
        assert_eq!(supervisor.running(), 0);
        assert!(supervisor.health().iter().all(|h| h.state.is_terminated()));
    }

    #[tokio::test]
    async fn test_escalates_past_limit() {
        let sources = sources(3);
        let store = Arc::new(failing_store(&sources));
        let mut supervisor =
            WatchSupervisor::new(store, Arc::new(MemorySink::new()), fast_config())
                .with_escalation(EscalationPolicy::max_terminated(1));

        let error = supervisor.run(&WatchSet::new(sources)).await;

        assert!(matches!(
            error,
            Error::Escalated {
                terminated: 2,
                limit: 1
            }
        ));
        assert!(error.is_process_fatal());
    }

    #[tokio::test]
    async fn test_duplicate_sources_spawn_once() {
        let source = SourceName::new("db_001", "orders");
        let store = Arc::new(MemoryStore::new());
        let mut supervisor =
            WatchSupervisor::new(store.clone(), Arc::new(MemorySink::new()), fast_config());

        supervisor.spawn(&WatchSet::new(vec![source.clone(), source.clone()]));

        assert_eq!(supervisor.running(), 1);
        assert_eq!(supervisor.health().len(), 1);
        supervisor.shutdown().await;
        assert_eq!(supervisor.running(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_reported_in_health() {
        let sources = sources(2);
        let store = Arc::new(
            MemoryStore::new().with_open_failure(sources[0].clone(), "ns not found"),
        );
        let mut supervisor =
            WatchSupervisor::new(store, Arc::new(MemorySink::new()), fast_config());
        supervisor.spawn(&WatchSet::new(sources.clone()));

        let terminated = supervisor.next_termination().await.unwrap();
        assert_eq!(terminated.source, sources[0]);
        assert!(matches!(terminated.reason, TerminationReason::OpenFailed(_)));

        let health = supervisor.health();
        assert!(health[0].state.is_terminated());
        assert!(!health[1].state.is_terminated());
        assert_eq!(supervisor.running(), 1);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_panics_are_attributed_to_their_own_source() {
        let a = SourceName::new("db_a", "orders");
        let b = SourceName::new("db_b", "orders");
        let store = MemoryStore::new()
            .with_feed(a.clone(), vec![FeedStep::Empty, insert(&a)])
            .with_feed(b.clone(), vec![insert(&b)]);
        let mut supervisor =
            WatchSupervisor::new(Arc::new(store), Arc::new(PanickingSink), fast_config());
        supervisor.spawn(&WatchSet::new(vec![a.clone(), b.clone()]));

        // Let both tasks end before either is joined.
        tokio::time::sleep(Duration::from_millis(100)).await;

        for _ in 0..2 {
            let terminated = supervisor.next_termination().await.unwrap();
            let TerminationReason::Aborted(message) = &terminated.reason else {
                panic!("unexpected reason {:?}", terminated.reason);
            };
            assert!(
                message.contains(&format!("sink failed for {}", terminated.source.database)),
                "{} reported {}",
                terminated.source,
                message
            );
        }

        let health = supervisor.health();
        assert!(health.iter().all(|h| h.state.is_terminated()));
        assert!(supervisor.next_termination().await.is_none());
    }

    #[tokio::test]
    async fn test_prometheus_reflects_live_counters() {
        let source = SourceName::new("db_001", "orders");
        let store = MemoryStore::new().with_feed(source.clone(), vec![insert(&source)]);
        let mut supervisor =
            WatchSupervisor::new(Arc::new(store), Arc::new(MemorySink::new()), fast_config());
        supervisor.spawn(&WatchSet::new(vec![source]));

        tokio::time::timeout(Duration::from_secs(5), async {
            while supervisor.health()[0].metrics.events_delivered == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        let text = supervisor.prometheus();
        assert!(text.contains(
            "watchstream_events_delivered_total{db=\"db_001\",coll=\"orders\"} 1"
        ));
        assert!(text.contains("watchstream_feed_errors_total{db=\"db_001\",coll=\"orders\"} 0"));

        supervisor.shutdown().await;
    }
}
