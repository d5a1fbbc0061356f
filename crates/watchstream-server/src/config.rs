//! Watcher configuration.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use watchstream_core::{
    CatalogOptions, EscalationPolicy, MalformedRecordPolicy, SubscriptionConfig,
    DEFAULT_COLLECTIONS, DEFAULT_DATABASE_PATTERN,
};
use watchstream_mongo::config::{DEFAULT_MAX_IDLE_TIME, DEFAULT_MAX_POOL_SIZE};
use watchstream_mongo::MongoConfig;

/// Default wait after an empty poll, in seconds.
pub const DEFAULT_EMPTY_POLL_INTERVAL_SECS: u64 = 10;

/// Where normalized events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SinkKind {
    /// Structured log records.
    #[default]
    Log,
    /// One JSON line per event on stdout.
    Stdout,
}

/// Handling of records that fail normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OnMalformed {
    /// Terminate the source.
    #[default]
    Terminate,
    /// Count the record and keep streaming.
    Skip,
}

impl From<OnMalformed> for MalformedRecordPolicy {
    fn from(value: OnMalformed) -> Self {
        match value {
            OnMalformed::Terminate => MalformedRecordPolicy::Terminate,
            OnMalformed::Skip => MalformedRecordPolicy::Skip,
        }
    }
}

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Store connection settings.
    pub mongo: MongoConfig,

    /// Pattern a database name must match to be watched.
    pub database_pattern: String,

    /// Collections watched in every matching database.
    pub collections: Vec<String>,

    /// Catalog resolution options.
    pub catalog: CatalogOptions,

    /// Per-source subscription settings.
    pub subscription: SubscriptionConfig,

    /// When source terminations halt the process.
    pub escalation: EscalationPolicy,

    /// Event destination.
    pub sink: SinkKind,
}

impl WatchConfig {
    /// Create a configuration for the given connection string.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            mongo: MongoConfig::new(url),
            database_pattern: DEFAULT_DATABASE_PATTERN.to_string(),
            collections: DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            catalog: CatalogOptions::default(),
            subscription: SubscriptionConfig::default(),
            escalation: EscalationPolicy::never(),
            sink: SinkKind::default(),
        }
    }

    /// Set the database naming pattern.
    pub fn with_database_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.database_pattern = pattern.into();
        self
    }

    /// Set the watched collections.
    pub fn with_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections = collections.into_iter().map(Into::into).collect();
        self
    }

    /// Only watch collections that exist at startup.
    pub fn with_verified_collections(mut self) -> Self {
        self.catalog.verify_collections = true;
        self
    }

    /// Set the subscription settings.
    pub fn with_subscription(mut self, subscription: SubscriptionConfig) -> Self {
        self.subscription = subscription;
        self
    }

    /// Set the escalation policy.
    pub fn with_escalation(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = escalation;
        self
    }

    /// Set the event sink.
    pub fn with_sink(mut self, sink: SinkKind) -> Self {
        self.sink = sink;
        self
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new(MongoConfig::default().url)
    }
}

/// Command-line arguments for the watcher.
#[derive(Parser, Debug)]
#[command(name = "watchstream")]
#[command(
    version,
    about = "Watch change streams across matching MongoDB databases",
    long_about = None
)]
pub struct Args {
    /// MongoDB connection string.
    #[arg(long)]
    pub url: String,

    /// Regular expression a database name must match.
    #[arg(long, default_value = DEFAULT_DATABASE_PATTERN)]
    pub database_pattern: String,

    /// Collections to watch in each matching database.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = DEFAULT_COLLECTIONS.iter().map(|c| c.to_string())
    )]
    pub collections: Vec<String>,

    /// Only watch collections that exist at startup.
    #[arg(long)]
    pub verify_collections: bool,

    /// Seconds to wait after an empty poll.
    #[arg(long, default_value_t = DEFAULT_EMPTY_POLL_INTERVAL_SECS)]
    pub empty_poll_interval_secs: u64,

    /// What to do with a change record that cannot be normalized.
    #[arg(long, value_enum, default_value_t = OnMalformed::Terminate)]
    pub on_malformed: OnMalformed,

    /// Exit once more than this many sources have terminated.
    #[arg(long)]
    pub max_terminated_sources: Option<usize>,

    /// Where to write change events.
    #[arg(long, value_enum, default_value_t = SinkKind::Log)]
    pub sink: SinkKind,

    /// Maximum pooled connections.
    #[arg(long, default_value_t = DEFAULT_MAX_POOL_SIZE)]
    pub max_pool_size: u32,

    /// Seconds before an idle pooled connection is closed.
    #[arg(long, default_value_t = DEFAULT_MAX_IDLE_TIME.as_secs())]
    pub max_idle_secs: u64,

    /// Connect timeout in seconds (0 = driver default).
    #[arg(long, default_value_t = 0)]
    pub connect_timeout_secs: u64,
}

impl Args {
    /// Convert command-line arguments to watcher configuration.
    pub fn into_config(self) -> WatchConfig {
        let mut mongo = MongoConfig::new(self.url)
            .with_max_pool_size(self.max_pool_size)
            .with_max_idle_time(Duration::from_secs(self.max_idle_secs))
            .with_app_name("watchstream");
        if self.connect_timeout_secs > 0 {
            mongo = mongo.with_connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        }

        let escalation = match self.max_terminated_sources {
            Some(limit) => EscalationPolicy::max_terminated(limit),
            None => EscalationPolicy::never(),
        };

        WatchConfig {
            mongo,
            database_pattern: self.database_pattern,
            collections: self.collections,
            catalog: CatalogOptions {
                verify_collections: self.verify_collections,
            },
            subscription: SubscriptionConfig::default()
                .with_empty_poll_interval(Duration::from_secs(self.empty_poll_interval_secs))
                .with_malformed_policy(self.on_malformed.into()),
            escalation,
            sink: self.sink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = WatchConfig::default();
        assert_eq!(config.database_pattern, DEFAULT_DATABASE_PATTERN);
        assert_eq!(config.collections, vec!["orders", "trades"]);
        assert!(!config.catalog.verify_collections);
        assert_eq!(
            config.subscription.empty_poll_interval,
            Duration::from_secs(DEFAULT_EMPTY_POLL_INTERVAL_SECS)
        );
        assert_eq!(config.escalation, EscalationPolicy::never());
        assert_eq!(config.sink, SinkKind::Log);
    }

    #[test]
    fn test_config_builder() {
        let config = WatchConfig::new("mongodb://db:27017")
            .with_database_pattern("^shop_.*$")
            .with_collections(["carts"])
            .with_verified_collections()
            .with_escalation(EscalationPolicy::max_terminated(3))
            .with_sink(SinkKind::Stdout);

        assert_eq!(config.mongo.url, "mongodb://db:27017");
        assert_eq!(config.database_pattern, "^shop_.*$");
        assert_eq!(config.collections, vec!["carts"]);
        assert!(config.catalog.verify_collections);
        assert_eq!(config.escalation.max_terminated_sources, Some(3));
        assert_eq!(config.sink, SinkKind::Stdout);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["watchstream", "--url", "mongodb://db:27017"]).unwrap();
        let config = args.into_config();

        assert_eq!(config.collections, vec!["orders", "trades"]);
        assert_eq!(config.mongo.max_pool_size, 200);
        assert_eq!(config.mongo.max_idle_time, Duration::from_secs(3600));
        assert!(config.mongo.connect_timeout.is_none());
        assert_eq!(config.subscription.on_malformed, MalformedRecordPolicy::Terminate);
        assert_eq!(config.escalation, EscalationPolicy::never());
    }

    #[test]
    fn test_args_into_config() {
        let args = Args::try_parse_from([
            "watchstream",
            "--url",
            "mongodb://db:27017",
            "--collections",
            "orders,fills",
            "--empty-poll-interval-secs",
            "1",
            "--on-malformed",
            "skip",
            "--max-terminated-sources",
            "2",
            "--sink",
            "stdout",
            "--connect-timeout-secs",
            "4",
        ])
        .unwrap();
        let config = args.into_config();

        assert_eq!(config.collections, vec!["orders", "fills"]);
        assert_eq!(config.subscription.empty_poll_interval, Duration::from_secs(1));
        assert_eq!(config.subscription.on_malformed, MalformedRecordPolicy::Skip);
        assert_eq!(config.escalation, EscalationPolicy::max_terminated(2));
        assert_eq!(config.sink, SinkKind::Stdout);
        assert_eq!(config.mongo.connect_timeout, Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_url_is_required() {
        assert!(Args::try_parse_from(["watchstream"]).is_err());
    }
}
