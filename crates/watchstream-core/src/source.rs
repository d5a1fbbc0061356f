//! Source identity and the watch set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One (database, collection) pair under continuous observation.
///
/// Ordered by database first, then collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceName {
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
}

impl SourceName {
    /// Create a new source name.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// The fixed, ordered set of sources watched for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    sources: Vec<SourceName>,
}

impl WatchSet {
    /// Create a watch set, keeping the given order.
    pub fn new(sources: Vec<SourceName>) -> Self {
        Self { sources }
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the watch set has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate over the sources in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SourceName> {
        self.sources.iter()
    }

    /// The sources as a slice.
    pub fn as_slice(&self) -> &[SourceName] {
        &self.sources
    }

    /// Distinct database names, in watch order.
    pub fn databases(&self) -> Vec<&str> {
        let mut databases: Vec<&str> = Vec::new();
        for source in &self.sources {
            if databases.last() != Some(&source.database.as_str()) {
                databases.push(&source.database);
            }
        }
        databases
    }
}

impl<'a> IntoIterator for &'a WatchSet {
    type Item = &'a SourceName;
    type IntoIter = std::slice::Iter<'a, SourceName>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}
