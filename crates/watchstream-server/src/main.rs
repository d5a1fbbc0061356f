//! Watchstream - watch change streams across matching MongoDB databases.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchstream_core::Error;
use watchstream_mongo::MongoStore;
use watchstream_server::{build_sink, run, Args};

const DEFAULT_LOG_FILTER: &str =
    "watchstream=info,watchstream_server=info,watchstream_core=info,watchstream_mongo=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting watchstream");

    // Parse command-line arguments
    let args = Args::parse();
    let config = args.into_config();

    tracing::info!(
        database_pattern = %config.database_pattern,
        collections = ?config.collections,
        sink = ?config.sink,
        empty_poll_interval = ?config.subscription.empty_poll_interval,
        "configuration loaded"
    );

    // Connect to the store
    let store = match MongoStore::connect(&config.mongo).await {
        Ok(store) => store,
        Err(e) => {
            let error = Error::ConnectionFailed(e);
            tracing::error!(error = %error, "startup failed");
            return Err(error.into());
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    run(Arc::new(store), build_sink(config.sink), &config, shutdown).await?;
    tracing::info!("watchstream shutdown complete");

    Ok(())
}
