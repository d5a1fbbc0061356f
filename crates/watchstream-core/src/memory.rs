//! In-memory store for tests and dry runs.
//!
//! Each source has a script of [`FeedStep`]s consumed in order by its feed.
//! Once the script is exhausted the feed reports empty polls. Steps can be
//! appended while a feed is open.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::normalize::RawChangeRecord;
use crate::source::SourceName;
use crate::store::{ChangeFeed, ChangeStore, FeedOptions, StoreError};

/// One scripted feed read.
#[derive(Debug, Clone)]
pub enum FeedStep {
    /// Deliver a raw record.
    Record(Value),
    /// Report an empty poll.
    Empty,
    /// Fail with a stream error.
    Fail(String),
}

#[derive(Debug, Default)]
struct Inner {
    databases: BTreeMap<String, Vec<String>>,
    scripts: HashMap<SourceName, VecDeque<FeedStep>>,
    open_failures: HashMap<SourceName, String>,
    catalog_failure: Option<String>,
    ping_failure: Option<String>,
    opened: Vec<(SourceName, FeedOptions)>,
    closed: Vec<SourceName>,
    empty_polls: HashMap<SourceName, u64>,
}

/// A scripted in-memory [`ChangeStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a database with its collections.
    pub fn with_database(self, name: &str, collections: &[&str]) -> Self {
        self.inner.lock().databases.insert(
            name.to_string(),
            collections.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Script the feed of a source.
    pub fn with_feed(self, source: SourceName, steps: Vec<FeedStep>) -> Self {
        self.inner.lock().scripts.insert(source, steps.into());
        self
    }

    /// Make opening a source's feed fail.
    pub fn with_open_failure(self, source: SourceName, message: &str) -> Self {
        self.inner
            .lock()
            .open_failures
            .insert(source, message.to_string());
        self
    }

    /// Make every catalog listing fail.
    pub fn with_catalog_failure(self, message: &str) -> Self {
        self.inner.lock().catalog_failure = Some(message.to_string());
        self
    }

    /// Make ping fail.
    pub fn with_ping_failure(self, message: &str) -> Self {
        self.inner.lock().ping_failure = Some(message.to_string());
        self
    }

    /// Append a step to a source's script.
    pub fn push_step(&self, source: &SourceName, step: FeedStep) {
        self.inner
            .lock()
            .scripts
            .entry(source.clone())
            .or_default()
            .push_back(step);
    }

    /// Sources whose feed was opened, with the options used, in open order.
    pub fn opened_feeds(&self) -> Vec<(SourceName, FeedOptions)> {
        self.inner.lock().opened.clone()
    }

    /// Sources whose feed was closed, in close order.
    pub fn closed_feeds(&self) -> Vec<SourceName> {
        self.inner.lock().closed.clone()
    }

    /// Number of empty polls served to a source.
    pub fn empty_polls(&self, source: &SourceName) -> u64 {
        self.inner
            .lock()
            .empty_polls
            .get(source)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChangeStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        match &self.inner.lock().ping_failure {
            Some(message) => Err(StoreError::Connection(message.clone())),
            None => Ok(()),
        }
    }

    async fn list_database_names(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        if let Some(message) = &inner.catalog_failure {
            return Err(StoreError::Command(message.clone()));
        }
        Ok(inner.databases.keys().cloned().collect())
    }

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        if let Some(message) = &inner.catalog_failure {
            return Err(StoreError::Command(message.clone()));
        }
        Ok(inner.databases.get(database).cloned().unwrap_or_default())
    }

    async fn open_feed(
        &self,
        source: &SourceName,
        options: FeedOptions,
    ) -> Result<Box<dyn ChangeFeed>, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(message) = inner.open_failures.get(source) {
            return Err(StoreError::Command(message.clone()));
        }
        inner.opened.push((source.clone(), options));

        Ok(Box::new(MemoryFeed {
            source: source.clone(),
            inner: Arc::clone(&self.inner),
            closed: false,
        }))
    }
}

struct MemoryFeed {
    source: SourceName,
    inner: Arc<Mutex<Inner>>,
    closed: bool,
}

#[async_trait]
impl ChangeFeed for MemoryFeed {
    async fn next_record(&mut self) -> Result<Option<RawChangeRecord>, StoreError> {
        if self.closed {
            return Err(StoreError::Stream("feed is closed".to_string()));
        }

        let mut inner = self.inner.lock();
        let step = inner
            .scripts
            .get_mut(&self.source)
            .and_then(VecDeque::pop_front);

        match step {
            Some(FeedStep::Record(body)) => Ok(Some(RawChangeRecord::new(body))),
            Some(FeedStep::Fail(message)) => Err(StoreError::Stream(message)),
            Some(FeedStep::Empty) | None => {
                *inner.empty_polls.entry(self.source.clone()).or_default() += 1;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.lock().closed.push(self.source.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_feed() {
        let source = SourceName::new("db_001", "orders");
        let store = MemoryStore::new().with_feed(
            source.clone(),
            vec![
                FeedStep::Record(json!({"operationType": "insert"})),
                FeedStep::Empty,
                FeedStep::Fail("cursor not found".into()),
            ],
        );

        let mut feed = store
            .open_feed(&source, FeedOptions::update_lookup())
            .await
            .unwrap();
        assert!(feed.next_record().await.unwrap().is_some());
        assert!(feed.next_record().await.unwrap().is_none());
        assert!(feed.next_record().await.is_err());
        // Exhausted scripts report empty polls.
        assert!(feed.next_record().await.unwrap().is_none());
        assert_eq!(store.empty_polls(&source), 2);

        feed.close().await;
        assert_eq!(store.closed_feeds(), vec![source.clone()]);
        assert_eq!(
            store.opened_feeds(),
            vec![(source, FeedOptions::update_lookup())]
        );
    }

    #[tokio::test]
    async fn test_ping_failure() {
        assert!(MemoryStore::new().ping().await.is_ok());

        let store = MemoryStore::new().with_ping_failure("no reachable servers");
        assert!(matches!(
            store.ping().await,
            Err(StoreError::Connection(message)) if message == "no reachable servers"
        ));
    }

    #[tokio::test]
    async fn test_open_failure() {
        let source = SourceName::new("db_001", "orders");
        let store = MemoryStore::new().with_open_failure(source.clone(), "ns not found");
        assert!(store
            .open_feed(&source, FeedOptions::default())
            .await
            .is_err());
        assert!(store.opened_feeds().is_empty());
    }
}
