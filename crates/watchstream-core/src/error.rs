//! Core error types.

use thiserror::Error;

use crate::normalize::NormalizeError;
use crate::source::SourceName;
use crate::store::StoreError;

/// Watcher errors.
///
/// Startup errors (`ConnectionFailed`, `CatalogUnavailable`, `InvalidPattern`,
/// `EmptyWatchSet`) halt the process. Per-source errors stay inside the
/// subscription task that raised them and are only surfaced through its
/// outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// The store connection could not be established or verified.
    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] StoreError),

    /// Candidate sources could not be enumerated.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[source] StoreError),

    /// A source's change feed could not be opened.
    #[error("subscription open failed for {ns}: {error}")]
    SubscriptionOpenFailed {
        ns: SourceName,
        #[source]
        error: StoreError,
    },

    /// An open change feed failed mid-stream.
    #[error("feed error on {ns}: {error}")]
    FeedError {
        ns: SourceName,
        #[source]
        error: StoreError,
    },

    /// A change record could not be normalized.
    #[error("malformed record on {ns}: {error}")]
    MalformedRecord {
        ns: SourceName,
        #[source]
        error: NormalizeError,
    },

    /// The database naming pattern does not compile.
    #[error("invalid naming pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// No source matched the naming policy.
    #[error("no database matched pattern {pattern}")]
    EmptyWatchSet { pattern: String },

    /// More sources terminated than the escalation policy allows.
    #[error("{terminated} sources terminated, limit is {limit}")]
    Escalated { terminated: usize, limit: usize },

    /// Every watched source has terminated.
    #[error("all {terminated} sources terminated")]
    AllSourcesTerminated { terminated: usize },
}

impl Error {
    /// Whether this error must halt the whole process.
    pub fn is_process_fatal(&self) -> bool {
        !matches!(
            self,
            Error::SubscriptionOpenFailed { .. }
                | Error::FeedError { .. }
                | Error::MalformedRecord { .. }
        )
    }
}
