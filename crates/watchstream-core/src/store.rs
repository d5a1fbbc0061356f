//! Store connection collaborator traits.
//!
//! The watcher never talks to a driver directly. A store adapter implements
//! [`ChangeStore`] for catalog listing and feed opening, and hands out one
//! [`ChangeFeed`] per subscription.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::normalize::RawChangeRecord;
use crate::source::SourceName;

/// Store-level failures reported by an adapter.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Connection could not be established.
    #[error("connection error: {0}")]
    Connection(String),

    /// A command against the store failed.
    #[error("command failed: {0}")]
    Command(String),

    /// The change stream reported a failure.
    #[error("change stream error: {0}")]
    Stream(String),

    /// An operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Options for opening a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedOptions {
    /// Look up and include the full document on update events.
    pub full_document_on_update: bool,
}

impl FeedOptions {
    /// Options with full-document lookup on update, and no further filter.
    pub fn update_lookup() -> Self {
        Self {
            full_document_on_update: true,
        }
    }
}

/// Connection to a store that exposes change feeds.
///
/// Must be safe for concurrent use by every subscription task.
#[async_trait]
pub trait ChangeStore: Send + Sync {
    /// Verify the connection is usable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// List all database names.
    async fn list_database_names(&self) -> Result<Vec<String>, StoreError>;

    /// List collection names of one database.
    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, StoreError>;

    /// Open a change feed on one source.
    async fn open_feed(
        &self,
        source: &SourceName,
        options: FeedOptions,
    ) -> Result<Box<dyn ChangeFeed>, StoreError>;
}

/// One open change feed, owned by exactly one subscription.
#[async_trait]
pub trait ChangeFeed: Send {
    /// Wait for the next record.
    ///
    /// Returns `Ok(None)` when no record is currently available (an empty
    /// poll), which is not an error.
    async fn next_record(&mut self) -> Result<Option<RawChangeRecord>, StoreError>;

    /// Release the feed handle.
    async fn close(&mut self);
}

/// Shared store handle.
pub type SharedStore = Arc<dyn ChangeStore>;
