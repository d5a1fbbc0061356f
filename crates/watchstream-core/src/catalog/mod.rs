//! Source catalog resolution.
//!
//! Lists databases from the store, keeps the ones matching a
//! [`NamingPolicy`], and crosses them with a fixed collection list to build
//! the [`WatchSet`](crate::source::WatchSet).

mod policy;
mod resolver;

pub use policy::{NamingPolicy, DEFAULT_COLLECTIONS, DEFAULT_DATABASE_PATTERN};
pub use resolver::{build_watch_set, resolve, CatalogOptions};
