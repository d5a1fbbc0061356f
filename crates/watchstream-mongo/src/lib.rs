//! Watchstream MongoDB adapter.
//!
//! Implements the [`watchstream_core::ChangeStore`] and
//! [`watchstream_core::ChangeFeed`] traits on top of the official MongoDB
//! driver. Change stream documents are handed to the core as relaxed
//! extended JSON.

pub mod config;
pub mod convert;
pub mod store;

pub use config::MongoConfig;
pub use convert::to_raw_record;
pub use store::{MongoFeed, MongoStore};
