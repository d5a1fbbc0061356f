//! MongoDB store and change feed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::change_stream::ChangeStream;
use mongodb::options::{ClientOptions, FullDocumentType};
use mongodb::Client;
use tracing::{debug, info};

use watchstream_core::{
    ChangeFeed, ChangeStore, FeedOptions, RawChangeRecord, SourceName, StoreError,
};

use crate::config::MongoConfig;
use crate::convert::to_raw_record;

/// A pooled MongoDB client shared by every subscription.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    ping_timeout: Duration,
}

impl MongoStore {
    /// Build the client and verify it with a ping.
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let started = Instant::now();

        let mut options = ClientOptions::parse(&config.url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.max_pool_size = Some(config.max_pool_size);
        options.max_idle_time = Some(config.max_idle_time);
        if let Some(timeout) = config.connect_timeout {
            options.connect_timeout = Some(timeout);
        }
        if let Some(name) = &config.app_name {
            options.app_name = Some(name.clone());
        }

        let client =
            Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;
        let store = Self {
            client,
            ping_timeout: config.ping_timeout,
        };

        store.ping().await.map_err(|e| match e {
            StoreError::Command(message) => StoreError::Connection(message),
            other => other,
        })?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            max_pool_size = config.max_pool_size,
            "connected"
        );
        Ok(store)
    }
}

#[async_trait]
impl ChangeStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let admin = self.client.database("admin");
        let ping = async { admin.run_command(doc! { "ping": 1 }).await };

        tokio::time::timeout(self.ping_timeout, ping)
            .await
            .map_err(|_| StoreError::Timeout(self.ping_timeout))?
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(())
    }

    async fn list_database_names(&self) -> Result<Vec<String>, StoreError> {
        self.client
            .list_database_names()
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, StoreError> {
        self.client
            .database(database)
            .list_collection_names()
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn open_feed(
        &self,
        source: &SourceName,
        options: FeedOptions,
    ) -> Result<Box<dyn ChangeFeed>, StoreError> {
        let collection = self
            .client
            .database(&source.database)
            .collection::<Document>(&source.collection);

        let mut watch = collection.watch();
        if options.full_document_on_update {
            watch = watch.full_document(FullDocumentType::UpdateLookup);
        }
        let stream = watch
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;

        debug!(ns = %source, "change stream opened");
        Ok(Box::new(MongoFeed {
            stream: Some(stream.with_type::<Document>()),
        }))
    }
}

/// One open MongoDB change stream.
pub struct MongoFeed {
    // None once closed.
    stream: Option<ChangeStream<Document>>,
}

#[async_trait]
impl ChangeFeed for MongoFeed {
    async fn next_record(&mut self) -> Result<Option<RawChangeRecord>, StoreError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| StoreError::Stream("change stream closed".to_string()))?;

        let next = stream
            .next_if_any()
            .await
            .map_err(|e| StoreError::Stream(e.to_string()))?;
        Ok(next.map(to_raw_record))
    }

    async fn close(&mut self) {
        // Dropping the cursor kills it on the server.
        self.stream = None;
    }
}
