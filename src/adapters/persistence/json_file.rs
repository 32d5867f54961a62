//! JSON File Store - Fallback Document Persistence
//!
//! Keeps every collection in a single JSON file shaped as
//! `{ "<collection>": [ {record}, ... ], ... }`. The file is read on
//! each operation and fully rewritten on each mutation using atomic
//! writes (write to tmp file, then rename), so it is always either the
//! old or the new version, never a partial write.
//!
//! A missing or unparsable file is treated as an empty datastore.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::record::{
    generate_identity, identity_of, matches, shallow_merge, DeleteResult, Filter,
    InsertOneResult, Record, UpdateResult, ID_FIELD,
};
use crate::ports::store::DocumentStore;

/// On-disk shape: collection name → ordered records.
pub type Datastore = BTreeMap<String, Vec<Record>>;

/// File-backed document store, always available.
pub struct JsonFileStore {
    /// Path to the datastore file.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp: OsString = path.as_os_str().to_owned();
        tmp.push(".tmp");

        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole datastore. Never fails.
    pub async fn load(&self) -> Datastore {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No datastore file yet, starting empty");
                return Datastore::new();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Datastore file unreadable, treating as empty"
                );
                return Datastore::new();
            }
        };

        if content.trim().is_empty() {
            return Datastore::new();
        }

        match serde_json::from_str::<Datastore>(&content) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Datastore file corrupt, treating as empty"
                );
                Datastore::new()
            }
        }
    }

    /// Names of all collections currently on disk.
    pub async fn collections(&self) -> Vec<String> {
        self.load().await.into_keys().collect()
    }

    /// Rewrite the whole file atomically (tmp → rename).
    async fn persist(&self, data: &Datastore) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create datastore directory")?;
        }

        let json = serde_json::to_string_pretty(data).context("Failed to serialize datastore")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp datastore file")?;

        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename datastore file")?;

        debug!(
            path = %self.path.display(),
            collections = data.len(),
            "Datastore persisted"
        );

        Ok(())
    }

    /// Load, apply `f`, and persist if `f` reports a change.
    async fn mutate<T>(&self, f: impl FnOnce(&mut Datastore) -> (T, bool)) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await;
        let (out, dirty) = f(&mut data);
        if dirty {
            self.persist(&data).await?;
        }
        Ok(out)
    }
}

/// Put the identity first, replacing a missing or null `_id`.
fn with_identity(doc: Record, id: &str) -> Record {
    if doc.get(ID_FIELD).is_some_and(|v| !v.is_null()) {
        return doc;
    }
    let mut stored = Record::with_capacity(doc.len() + 1);
    stored.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    stored.extend(doc.into_iter().filter(|(k, _)| k != ID_FIELD));
    stored
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn is_available(&self) -> bool {
        true
    }

    #[instrument(skip(self, filter), fields(store = "fallback"))]
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>> {
        let mut data = self.load().await;
        let records = data.remove(collection).unwrap_or_default();
        if filter.is_empty() {
            return Ok(records);
        }
        Ok(records.into_iter().filter(|r| matches(r, filter)).collect())
    }

    #[instrument(skip(self, filter), fields(store = "fallback"))]
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Record>> {
        let mut data = self.load().await;
        Ok(data
            .remove(collection)
            .and_then(|records| records.into_iter().find(|r| matches(r, filter))))
    }

    #[instrument(skip(self, doc), fields(store = "fallback"))]
    async fn insert_one(&self, collection: &str, doc: Record) -> Result<InsertOneResult> {
        let inserted_id = identity_of(&doc).unwrap_or_else(generate_identity);
        let record = with_identity(doc, &inserted_id);

        let stored = record.clone();
        self.mutate(|data| {
            data.entry(collection.to_string()).or_default().push(stored);
            ((), true)
        })
        .await?;

        info!(collection, id = %inserted_id, "Record inserted into file store");

        Ok(InsertOneResult {
            inserted_id,
            record,
        })
    }

    #[instrument(skip(self, filter, updates), fields(store = "fallback"))]
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        updates: &Record,
    ) -> Result<UpdateResult> {
        self.mutate(|data| {
            let Some(record) = data
                .get_mut(collection)
                .and_then(|records| records.iter_mut().find(|r| matches(r, filter)))
            else {
                return (UpdateResult::none(), false);
            };

            let changed = shallow_merge(record, updates);
            let result = UpdateResult {
                matched_count: 1,
                modified_count: u64::from(changed),
            };
            (result, changed)
        })
        .await
    }

    #[instrument(skip(self, filter), fields(store = "fallback"))]
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult> {
        self.mutate(|data| {
            let Some(records) = data.get_mut(collection) else {
                return (DeleteResult::none(), false);
            };
            match records.iter().position(|r| matches(r, filter)) {
                Some(idx) => {
                    records.remove(idx);
                    (DeleteResult { deleted_count: 1 }, true)
                }
                None => (DeleteResult::none(), false),
            }
        })
        .await
    }

    /// Check that the datastore directory is writable.
    async fn is_healthy(&self) -> bool {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if fs::create_dir_all(dir).await.is_err() {
            return false;
        }
        let probe = dir.join(".health_check");
        let result = fs::write(&probe, b"ok").await;
        let _ = fs::remove_file(&probe).await;
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{filter_from, id_filter};
    use serde_json::json;

    fn store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("local_db.json"));
        (dir, store)
    }

    fn rec(value: Value) -> Record {
        filter_from(value)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        let found = store.find("users", &Filter::new()).await.unwrap();
        assert!(found.is_empty());
        assert!(store.collections().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty() {
        let (_dir, store) = store();
        std::fs::write(store.path(), "{ not json").unwrap();
        let found = store.find("users", &Filter::new()).await.unwrap();
        assert!(found.is_empty());
        assert!(store.find_one("users", &Filter::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_identity_first() {
        let (_dir, store) = store();
        let result = store
            .insert_one("users", rec(json!({"email": "a@x.com", "role": "trader"})))
            .await
            .unwrap();

        assert!(!result.inserted_id.is_empty());
        let first_key = result.record.keys().next().unwrap();
        assert_eq!(first_key, ID_FIELD);
        assert_eq!(result.record["_id"], result.inserted_id.as_str());
    }

    #[tokio::test]
    async fn test_insert_keeps_caller_identity() {
        let (_dir, store) = store();
        let result = store
            .insert_one("users", rec(json!({"id": "u-1", "email": "b@x.com"})))
            .await
            .unwrap();
        assert_eq!(result.inserted_id, "u-1");
        assert_eq!(result.record["_id"], "u-1");
        assert_eq!(result.record["id"], "u-1");

        let found = store.find_one("users", &id_filter("u-1")).await.unwrap().unwrap();
        assert_eq!(found["email"], "b@x.com");
    }

    #[tokio::test]
    async fn test_file_shape_round_trip() {
        let (_dir, store) = store();
        store
            .insert_one("users", rec(json!({"_id": "1", "email": "a@x.com"})))
            .await
            .unwrap();
        store
            .insert_one("notifications", rec(json!({"_id": "n1", "read": false})))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            parsed,
            json!({
                "notifications": [{"_id": "n1", "read": false}],
                "users": [{"_id": "1", "email": "a@x.com"}]
            })
        );
        assert!(!store.tmp_path.exists());
    }

    #[tokio::test]
    async fn test_update_first_match_only() {
        let (_dir, store) = store();
        for id in ["1", "2"] {
            store
                .insert_one("users", rec(json!({"_id": id, "role": "trader"})))
                .await
                .unwrap();
        }

        let result = store
            .update_one(
                "users",
                &rec(json!({"role": "trader"})),
                &rec(json!({"role": "admin"})),
            )
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched_count: 1, modified_count: 1 });

        let admins = store.find("users", &rec(json!({"role": "admin"}))).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0]["_id"], "1");
    }

    #[tokio::test]
    async fn test_update_without_change_is_not_modified() {
        let (_dir, store) = store();
        store
            .insert_one("users", rec(json!({"_id": "1", "role": "trader"})))
            .await
            .unwrap();
        let result = store
            .update_one("users", &id_filter("1"), &rec(json!({"role": "trader"})))
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched_count: 1, modified_count: 0 });

        let missing = store
            .update_one("users", &id_filter("404"), &rec(json!({"role": "x"})))
            .await
            .unwrap();
        assert_eq!(missing, UpdateResult::none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        store
            .insert_one("users", rec(json!({"_id": "1"})))
            .await
            .unwrap();

        let first = store.delete_one("users", &id_filter("1")).await.unwrap();
        let second = store.delete_one("users", &id_filter("1")).await.unwrap();
        assert_eq!(first.deleted_count, 1);
        assert_eq!(second.deleted_count, 0);
        assert_eq!(store.collections().await, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert_one("transactions", rec(json!({"n": i})))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = store.find("transactions", &Filter::new()).await.unwrap();
        assert_eq!(all.len(), 16);
    }

    #[tokio::test]
    async fn test_is_healthy_in_writable_dir() {
        let (_dir, store) = store();
        assert!(store.is_healthy().await);
        assert!(store.is_available().await);
    }
}
