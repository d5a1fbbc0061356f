//! Subscription state.

use std::fmt;

use crate::error::Error;

/// Why a subscription stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The feed could not be opened.
    OpenFailed(String),
    /// The feed failed or was invalidated mid-stream.
    FeedError(String),
    /// A record could not be normalized.
    MalformedRecord(String),
    /// The task was aborted or panicked.
    Aborted(String),
}

impl TerminationReason {
    /// Classify a subscription error.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::SubscriptionOpenFailed { error, .. } => Self::OpenFailed(error.to_string()),
            Error::FeedError { error, .. } => Self::FeedError(error.to_string()),
            Error::MalformedRecord { error, .. } => Self::MalformedRecord(error.to_string()),
            other => Self::Aborted(other.to_string()),
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed(msg) => write!(f, "open failed: {}", msg),
            Self::FeedError(msg) => write!(f, "feed error: {}", msg),
            Self::MalformedRecord(msg) => write!(f, "malformed record: {}", msg),
            Self::Aborted(msg) => write!(f, "aborted: {}", msg),
        }
    }
}

/// Runtime state of one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Issuing the watch call.
    Opening,
    /// Waiting for the next record.
    Streaming,
    /// Backing off after an empty poll.
    Retrying,
    /// Stopped for good.
    Terminated(TerminationReason),
}

impl SubscriptionState {
    /// Check if the subscription has stopped.
    pub fn is_terminated(&self) -> bool {
        matches!(self, SubscriptionState::Terminated(_))
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionState::Opening => "opening",
            SubscriptionState::Streaming => "streaming",
            SubscriptionState::Retrying => "retrying",
            SubscriptionState::Terminated(_) => "terminated",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionState::Terminated(reason) => write!(f, "terminated ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceName;
    use crate::store::StoreError;

    #[test]
    fn test_reason_from_error() {
        let error = Error::FeedError {
            ns: SourceName::new("d", "c"),
            error: StoreError::Stream("network timeout".into()),
        };
        assert_eq!(
            TerminationReason::from_error(&error),
            TerminationReason::FeedError("change stream error: network timeout".into())
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SubscriptionState::Retrying.to_string(), "retrying");
        let state =
            SubscriptionState::Terminated(TerminationReason::OpenFailed("ns not found".into()));
        assert!(state.is_terminated());
        assert_eq!(state.to_string(), "terminated (open failed: ns not found)");
    }
}
