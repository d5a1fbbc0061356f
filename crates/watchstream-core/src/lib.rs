//! Watchstream Core - change-feed discovery, normalization and supervision.
//!
//! This crate discovers the collections matching a naming policy, opens one
//! change feed per collection, and turns every store-native change record
//! into a normalized [`ChangeEvent`] handed to an [`EventSink`].
//!
//! # Modules
//!
//! - [`source`] - source identity and the watch set
//! - [`event`] - the normalized change event shape
//! - [`normalize`] - raw record to [`ChangeEvent`] decoding
//! - [`catalog`] - naming policy and watch set resolution
//! - [`store`] - store connection collaborator traits
//! - [`feed`] - per-source subscription state machine
//! - [`supervisor`] - task registry and escalation policy
//! - [`sink`] - event sink contract and implementations
//! - [`metrics`] - per-source counters
//! - [`memory`] - in-memory store for tests and dry runs

pub mod catalog;
pub mod error;
pub mod event;
pub mod feed;
pub mod memory;
pub mod metrics;
pub mod normalize;
pub mod sink;
pub mod source;
pub mod store;
pub mod supervisor;

pub use catalog::{
    resolve, CatalogOptions, NamingPolicy, DEFAULT_COLLECTIONS, DEFAULT_DATABASE_PATTERN,
};
pub use error::Error;
pub use event::{ChangeEvent, ClusterTime, Document, Namespace, OperationType, UpdateDescription};
pub use feed::{
    FeedSubscription, MalformedRecordPolicy, SubscriptionConfig, SubscriptionOutcome,
    SubscriptionState, TerminationReason, DEFAULT_EMPTY_POLL_INTERVAL,
};
pub use memory::{FeedStep, MemoryStore};
pub use metrics::{SourceMetrics, SourceMetricsSnapshot};
pub use normalize::{normalize, NormalizeError, RawChangeRecord};
pub use sink::{ChannelSink, EventSink, MemorySink, SharedSink, StdoutSink, TracingSink};
pub use source::{SourceName, WatchSet};
pub use store::{ChangeFeed, ChangeStore, FeedOptions, SharedStore, StoreError};
pub use supervisor::{EscalationPolicy, SourceHealth, TerminatedSource, WatchSupervisor};
