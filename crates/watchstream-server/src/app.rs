//! Watcher startup and supervision.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};
use watchstream_core::{
    resolve, ChangeStore, Error, NamingPolicy, SharedSink, SharedStore, StdoutSink, TracingSink,
    WatchSet, WatchSupervisor,
};

use crate::config::{SinkKind, WatchConfig};

/// Build the configured event sink.
pub fn build_sink(kind: SinkKind) -> SharedSink {
    match kind {
        SinkKind::Log => Arc::new(TracingSink::new()),
        SinkKind::Stdout => Arc::new(StdoutSink::new()),
    }
}

/// Resolve the watch set and supervise it until `shutdown` completes.
///
/// Returns `Ok(())` on shutdown. Returns an error if startup fails, the
/// escalation policy fires, or every source has terminated.
pub async fn run<F>(
    store: SharedStore,
    sink: SharedSink,
    config: &WatchConfig,
    shutdown: F,
) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let watch_set = match resolve_watch_set(store.as_ref(), config).await {
        Ok(watch_set) => watch_set,
        Err(error) => {
            error!(
                error = %error,
                pattern = %config.database_pattern,
                "startup failed"
            );
            return Err(error);
        }
    };

    info!(
        sources = watch_set.len(),
        databases = watch_set.databases().len(),
        "watch set resolved"
    );

    let mut supervisor = WatchSupervisor::new(store, sink, config.subscription)
        .with_escalation(config.escalation);

    let failure = tokio::select! {
        error = supervisor.run(&watch_set) => Some(error),
        _ = shutdown => None,
    };

    let result = match failure {
        Some(error) => {
            error!(error = %error, "watch stopped");
            Err(error)
        }
        None => {
            info!("received shutdown signal");
            supervisor.shutdown().await;
            Ok(())
        }
    };

    info!(metrics = %supervisor.prometheus(), "final source metrics");
    result
}

async fn resolve_watch_set(
    store: &dyn ChangeStore,
    config: &WatchConfig,
) -> Result<WatchSet, Error> {
    let policy = NamingPolicy::new(&config.database_pattern)?;
    let watch_set = resolve(store, &policy, &config.collections, config.catalog).await?;
    if watch_set.is_empty() {
        return Err(Error::EmptyWatchSet {
            pattern: config.database_pattern.clone(),
        });
    }
    Ok(watch_set)
}
