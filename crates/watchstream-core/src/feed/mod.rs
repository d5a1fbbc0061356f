//! Per-source change feed subscription.
//!
//! A [`FeedSubscription`] owns one long-lived pull loop against one source:
//!
//! ```text
//! Opening -> Streaming -> Retrying (empty poll) -> Streaming
//!                      \-> Terminated (feed error / malformed record)
//! Opening -> Terminated (open failed)
//! ```
//!
//! Every failure is scoped to the source. A terminated subscription never
//! restarts itself.

mod state;
mod subscription;

pub use state::{SubscriptionState, TerminationReason};
pub use subscription::{
    FeedSubscription, MalformedRecordPolicy, SubscriptionConfig, SubscriptionOutcome,
    DEFAULT_EMPTY_POLL_INTERVAL,
};
