//! MongoDB Store - Optional Primary Document Backend
//!
//! Owns the connection lifecycle explicitly: `connect` caches a live
//! handle, `disconnect` drops it after a graceful client shutdown, and
//! `database` answers "is the primary usable right now?" without ever
//! failing. A failed connect leaves the store disconnected; callers
//! carry on with the fallback backend.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use super::convert::{
    document_to_record, filter_to_document, identity_string, record_to_document,
    updates_to_document,
};
use crate::domain::record::{DeleteResult, Filter, InsertOneResult, Record, UpdateResult, ID_FIELD};
use crate::ports::store::{DocumentStore, StoreError};

/// Live connection: the client plus the selected database.
struct MongoHandle {
    client: Client,
    database: Database,
}

/// Primary store adapter over the official MongoDB driver.
pub struct MongoStore {
    /// Cached handle; `None` while disconnected.
    handle: RwLock<Option<MongoHandle>>,
    /// Server selection timeout applied at connect time.
    server_selection_timeout: Duration,
    /// Application name reported to the server.
    app_name: String,
}

impl MongoStore {
    /// Create a disconnected store.
    pub fn new(app_name: impl Into<String>, server_selection_timeout: Duration) -> Self {
        Self {
            handle: RwLock::new(None),
            server_selection_timeout,
            app_name: app_name.into(),
        }
    }

    /// Connect and verify reachability with a ping.
    ///
    /// Returns whether the store is now available. Never fails: on any
    /// error the cached handle is cleared and a warning is logged.
    #[instrument(skip(self, uri))]
    pub async fn connect(&self, uri: &str, db_name: &str) -> bool {
        match self.try_connect(uri, db_name).await {
            Ok(handle) => {
                let previous = self.handle.write().await.replace(handle);
                if let Some(old) = previous {
                    old.client.shutdown().await;
                }
                info!(database = db_name, "Primary store connected");
                true
            }
            Err(e) => {
                self.handle.write().await.take();
                warn!(
                    database = db_name,
                    error = %e,
                    "Primary store unavailable, continuing with fallback only"
                );
                false
            }
        }
    }

    async fn try_connect(&self, uri: &str, db_name: &str) -> Result<MongoHandle> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;
        options.server_selection_timeout = Some(self.server_selection_timeout);
        options.connect_timeout = Some(self.server_selection_timeout);
        options.app_name = Some(self.app_name.clone());

        let client = Client::with_options(options).context("Failed to build MongoDB client")?;
        let database = client.database(db_name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;

        Ok(MongoHandle { client, database })
    }

    /// Drop the live handle and shut the client down.
    pub async fn disconnect(&self) {
        let handle = self.handle.write().await.take();
        if let Some(handle) = handle {
            handle.client.shutdown().await;
            info!("Primary store disconnected");
        }
    }

    /// The live database handle, or `None` when unavailable.
    pub async fn database(&self) -> Option<Database> {
        self.handle
            .read()
            .await
            .as_ref()
            .map(|h| h.database.clone())
    }

    async fn collection(&self, name: &str) -> Result<Collection<Document>> {
        let database = self
            .database()
            .await
            .ok_or(StoreError::Unavailable { backend: "primary" })?;
        Ok(database.collection::<Document>(name))
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn is_available(&self) -> bool {
        self.handle.read().await.is_some()
    }

    #[instrument(skip(self, filter), fields(store = "primary"))]
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>> {
        let query = filter_to_document(filter)?;
        let cursor = self
            .collection(collection)
            .await?
            .find(query)
            .await
            .context("MongoDB find failed")?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .context("MongoDB cursor failed")?;
        Ok(docs.into_iter().map(document_to_record).collect())
    }

    #[instrument(skip(self, filter), fields(store = "primary"))]
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Record>> {
        let query = filter_to_document(filter)?;
        let doc = self
            .collection(collection)
            .await?
            .find_one(query)
            .await
            .context("MongoDB findOne failed")?;
        Ok(doc.map(document_to_record))
    }

    #[instrument(skip(self, doc), fields(store = "primary"))]
    async fn insert_one(&self, collection: &str, doc: Record) -> Result<InsertOneResult> {
        let document = record_to_document(&doc)?;
        let result = self
            .collection(collection)
            .await?
            .insert_one(document)
            .await
            .context("MongoDB insertOne failed")?;

        let inserted_id = identity_string(&result.inserted_id);
        let mut record = Record::with_capacity(doc.len() + 1);
        record.insert(ID_FIELD.to_string(), inserted_id.clone().into());
        record.extend(doc.into_iter().filter(|(k, _)| k != ID_FIELD));

        Ok(InsertOneResult {
            inserted_id,
            record,
        })
    }

    #[instrument(skip(self, filter, updates), fields(store = "primary"))]
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &Record,
    ) -> Result<UpdateResult> {
        let query = filter_to_document(filter)?;
        let set = updates_to_document(updates)?;
        let coll = self.collection(collection).await?;

        // An empty $set is rejected by the server.
        if set.is_empty() {
            let matched = coll
                .find_one(query)
                .await
                .context("MongoDB findOne failed")?
                .is_some();
            return Ok(UpdateResult {
                matched_count: u64::from(matched),
                modified_count: 0,
            });
        }

        let result = coll
            .update_one(query, doc! { "$set": set })
            .await
            .context("MongoDB updateOne failed")?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    #[instrument(skip(self, filter), fields(store = "primary"))]
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult> {
        let query = filter_to_document(filter)?;
        let result = self
            .collection(collection)
            .await?
            .delete_one(query)
            .await
            .context("MongoDB deleteOne failed")?;
        Ok(DeleteResult {
            deleted_count: result.deleted_count,
        })
    }

    async fn is_healthy(&self) -> bool {
        let Some(database) = self.database().await else {
            return false;
        };
        database.run_command(doc! { "ping": 1 }).await.is_ok()
    }
}
