//! Per-source counters.
//!
//! Each subscription owns one [`SourceMetrics`]; the supervisor keeps a
//! read handle to it. Counters are plain atomics, no locks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::event::ClusterTime;
use crate::source::SourceName;

/// Counters for one watched source.
#[derive(Debug)]
pub struct SourceMetrics {
    started_at: Instant,
    events_delivered: AtomicU64,
    empty_polls: AtomicU64,
    malformed_records: AtomicU64,
    feed_errors: AtomicU64,
    // seconds << 32 | increment; 0 until the first event.
    last_cluster_time: AtomicU64,
}

/// Point-in-time copy of a source's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceMetricsSnapshot {
    /// Events handed to the sink.
    pub events_delivered: u64,
    /// Feed reads that returned no record.
    pub empty_polls: u64,
    /// Records that failed normalization.
    pub malformed_records: u64,
    /// Feed failures, including invalidation.
    pub feed_errors: u64,
    /// Highest cluster time delivered so far.
    pub last_cluster_time: Option<ClusterTime>,
}

impl SourceMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            events_delivered: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            malformed_records: AtomicU64::new(0),
            feed_errors: AtomicU64::new(0),
            last_cluster_time: AtomicU64::new(0),
        }
    }

    /// Record a delivered event.
    pub fn record_event(&self, cluster_time: ClusterTime) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
        let packed = (u64::from(cluster_time.seconds) << 32) | u64::from(cluster_time.increment);
        self.last_cluster_time.fetch_max(packed, Ordering::Relaxed);
    }

    /// Record an empty poll.
    pub fn record_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record that failed normalization.
    pub fn record_malformed(&self) {
        self.malformed_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a feed failure.
    pub fn record_feed_error(&self) {
        self.feed_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the counters were created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        let packed = self.last_cluster_time.load(Ordering::Relaxed);
        SourceMetricsSnapshot {
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            feed_errors: self.feed_errors.load(Ordering::Relaxed),
            last_cluster_time: (packed != 0)
                .then(|| ClusterTime::new((packed >> 32) as u32, packed as u32)),
        }
    }
}

impl Default for SourceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Export per-source counters in Prometheus text format.
pub fn to_prometheus<'a, I>(sources: I) -> String
where
    I: IntoIterator<Item = (&'a SourceName, SourceMetricsSnapshot)>,
{
    let sources: Vec<_> = sources.into_iter().collect();
    let mut output = String::new();

    let families: [(&str, &str, fn(&SourceMetricsSnapshot) -> u64); 4] = [
        (
            "watchstream_events_delivered_total",
            "Change events delivered to the sink",
            |s| s.events_delivered,
        ),
        (
            "watchstream_empty_polls_total",
            "Feed reads that returned no record",
            |s| s.empty_polls,
        ),
        (
            "watchstream_malformed_records_total",
            "Change records that failed normalization",
            |s| s.malformed_records,
        ),
        (
            "watchstream_feed_errors_total",
            "Change feed failures",
            |s| s.feed_errors,
        ),
    ];

    for (name, help, value) in families {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} counter\n", name));
        for (source, snapshot) in &sources {
            output.push_str(&format!(
                "{}{{db=\"{}\",coll=\"{}\"}} {}\n",
                name,
                source.database,
                source.collection,
                value(snapshot)
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = SourceMetrics::new();
        metrics.record_event(ClusterTime::new(100, 2));
        metrics.record_event(ClusterTime::new(100, 1));
        metrics.record_empty_poll();
        metrics.record_malformed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_delivered, 2);
        assert_eq!(snapshot.empty_polls, 1);
        assert_eq!(snapshot.malformed_records, 1);
        assert_eq!(snapshot.feed_errors, 0);
        assert_eq!(snapshot.last_cluster_time, Some(ClusterTime::new(100, 2)));
    }

    #[test]
    fn test_uptime_advances() {
        let metrics = SourceMetrics::new();
        let first = metrics.uptime();
        std::thread::sleep(Duration::from_millis(5));
        assert!(metrics.uptime() > first);
    }

    #[test]
    fn test_no_cluster_time_before_first_event() {
        assert_eq!(SourceMetrics::new().snapshot().last_cluster_time, None);
    }

    #[test]
    fn test_prometheus_export() {
        let source = SourceName::new("db_001", "orders");
        let metrics = SourceMetrics::new();
        metrics.record_event(ClusterTime::new(1, 1));

        let text = to_prometheus([(&source, metrics.snapshot())]);
        assert!(text.contains("# TYPE watchstream_events_delivered_total counter"));
        assert!(text.contains(
            "watchstream_events_delivered_total{db=\"db_001\",coll=\"orders\"} 1"
        ));
        assert!(text.contains("watchstream_feed_errors_total{db=\"db_001\",coll=\"orders\"} 0"));
    }
}
