//! Watchstream Server library.
//!
//! Command-line configuration and the startup sequence of the
//! `watchstream` binary: resolve the watch set, start one subscription per
//! source, and supervise them until shutdown.

pub mod app;
pub mod config;

pub use app::{build_sink, run};
pub use config::{Args, OnMalformed, SinkKind, WatchConfig};
