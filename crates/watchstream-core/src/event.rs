//! Normalized change event types.
//!
//! Field names on the wire follow the store-native change record
//! (`operationType`, `documentKey`, `ns`, ...) so a logged event reads the
//! same as the record it came from.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document: mapping of field name to value.
pub type Document = Map<String, Value>;

/// Kind of change described by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    /// A document was inserted.
    Insert,
    /// A document was partially updated.
    Update,
    /// A document was replaced.
    Replace,
    /// A document was deleted.
    Delete,
    /// The collection was dropped.
    Drop,
    /// The collection was renamed.
    Rename,
    /// The feed was invalidated and will close.
    Invalidate,
}

impl OperationType {
    /// Whether the operation targets a single document.
    pub fn is_document_level(&self) -> bool {
        matches!(
            self,
            OperationType::Insert
                | OperationType::Update
                | OperationType::Replace
                | OperationType::Delete
        )
    }

    /// The store-native name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "insert",
            OperationType::Update => "update",
            OperationType::Replace => "replace",
            OperationType::Delete => "delete",
            OperationType::Drop => "drop",
            OperationType::Rename => "rename",
            OperationType::Invalidate => "invalidate",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Affected namespace of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name.
    #[serde(rename = "db")]
    pub database: String,
    /// Collection name.
    #[serde(rename = "coll")]
    pub collection: String,
}

impl Namespace {
    /// Create a new namespace.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Store-assigned logical timestamp.
///
/// Non-decreasing per source. Encoded as `{"$timestamp": {"t": .., "i": ..}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "ExtendedTimestamp", into = "ExtendedTimestamp")]
pub struct ClusterTime {
    /// Seconds since epoch.
    pub seconds: u32,
    /// Ordinal within the second.
    pub increment: u32,
}

impl ClusterTime {
    /// Create a new cluster time.
    pub fn new(seconds: u32, increment: u32) -> Self {
        Self { seconds, increment }
    }
}

impl fmt::Display for ClusterTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.increment)
    }
}

#[derive(Serialize, Deserialize)]
struct ExtendedTimestamp {
    #[serde(rename = "$timestamp")]
    timestamp: TimestampParts,
}

#[derive(Serialize, Deserialize)]
struct TimestampParts {
    t: u32,
    i: u32,
}

impl From<ExtendedTimestamp> for ClusterTime {
    fn from(ext: ExtendedTimestamp) -> Self {
        Self::new(ext.timestamp.t, ext.timestamp.i)
    }
}

impl From<ClusterTime> for ExtendedTimestamp {
    fn from(time: ClusterTime) -> Self {
        Self {
            timestamp: TimestampParts {
                t: time.seconds,
                i: time.increment,
            },
        }
    }
}

/// Fields changed by a partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDescription {
    /// Fields set by the update, with their new values.
    #[serde(rename = "updatedFields")]
    pub updated_fields: Document,
    /// Fields removed by the update.
    #[serde(rename = "removedFields")]
    pub removed_fields: Vec<String>,
    /// Arrays truncated by the update.
    #[serde(rename = "truncatedArrays", default, skip_serializing_if = "Option::is_none")]
    pub truncated_arrays: Option<Vec<Value>>,
    /// Any further store-provided keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Document,
}

/// A normalized change event.
///
/// Created from exactly one raw record and handed straight to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Kind of change.
    #[serde(rename = "operationType")]
    pub operation: OperationType,

    /// Key of the affected document. Absent on collection-level operations.
    #[serde(rename = "documentKey", default, skip_serializing_if = "Option::is_none")]
    pub document_key: Option<Document>,

    /// Affected namespace. Absent only on `invalidate`.
    #[serde(rename = "ns", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,

    /// Target namespace of a `rename`.
    #[serde(rename = "to", default, skip_serializing_if = "Option::is_none")]
    pub rename_target: Option<Namespace>,

    /// Logical timestamp of the change.
    #[serde(rename = "clusterTime")]
    pub cluster_time: ClusterTime,

    /// Full document snapshot, when the feed was opened with update lookup.
    #[serde(rename = "fullDocument", default, skip_serializing_if = "Option::is_none")]
    pub full_document: Option<Document>,

    /// Partial-update description.
    #[serde(rename = "updateDescription", default, skip_serializing_if = "Option::is_none")]
    pub update_description: Option<UpdateDescription>,

    /// Opaque resume token of the record.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<Value>,
}

impl ChangeEvent {
    /// Serialize to a single-line JSON string.
    pub fn to_json(&self) -> String {
        // Map keys are strings and every value is already JSON.
        serde_json::to_string(self).unwrap_or_default()
    }
}
