//! Typed Collections - Compile-time Checked Access to Known Collections
//!
//! Wraps the untyped data provider with (de)serialization for one
//! `CollectionModel`. Records that no longer fit the model are skipped
//! with a warning so one bad document cannot fail a whole listing.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use super::data_provider::DataProvider;
use crate::domain::models::CollectionModel;
use crate::domain::record::{
  id_filter, identity_of, DeleteResult, Filter, Record, UpdateResult, ID_FIELD,
};
use crate::ports::store::{DocumentStore, StoreError};

/// Typed access to one collection through a shared provider.
pub struct TypedCollection<T: CollectionModel, P: DocumentStore, F: DocumentStore> {
  provider: Arc<DataProvider<P, F>>,
  _model: PhantomData<fn() -> T>,
}

impl<T: CollectionModel, P: DocumentStore, F: DocumentStore> TypedCollection<T, P, F> {
  /// Bind the model's collection on `provider`.
  pub fn new(provider: Arc<DataProvider<P, F>>) -> Self {
    Self {
      provider,
      _model: PhantomData,
    }
  }

  fn decode(record: Record) -> Option<T> {
    let id = identity_of(&record);
    match serde_json::from_value(Value::Object(record)) {
      Ok(model) => Some(model),
      Err(e) => {
        warn!(
          collection = T::COLLECTION,
          id = ?id,
          error = %e,
          "Skipping record that does not fit its model"
        );
        None
      }
    }
  }

  fn encode(model: &T) -> Result<Record> {
    match serde_json::to_value(model).context("Failed to serialize model")? {
      Value::Object(record) => Ok(record),
      other => Err(StoreError::Conversion {
        what: "model",
        reason: format!("expected an object, got {other}"),
      }
      .into()),
    }
  }

  /// All records matching `filter` that decode into `T`.
  pub async fn find(&self, filter: &Filter) -> Vec<T> {
    self.provider
      .find(T::COLLECTION, filter)
      .await
      .into_iter()
      .filter_map(Self::decode)
      .collect()
  }

  /// First record matching `filter`, if it decodes into `T`.
  pub async fn find_one(&self, filter: &Filter) -> Option<T> {
    self.provider
      .find_one(T::COLLECTION, filter)
      .await
      .and_then(Self::decode)
  }

  /// Record with identity `id`.
  pub async fn find_by_id(&self, id: &str) -> Option<T> {
    self.find_one(&id_filter(id)).await
  }

  /// Persist `model`, returning it with its assigned identity.
  ///
  /// Fails when no backend stored the record and the model carried no
  /// identity of its own.
  pub async fn insert(&self, model: &T) -> Result<T> {
    let record = Self::encode(model)?;
    let inserted = self.provider.insert_one(T::COLLECTION, record).await;
    if inserted.inserted_id.is_empty() {
      anyhow::bail!("Insert into {} failed on every backend", T::COLLECTION);
    }
    let mut stored = inserted.record;
    stored.insert(ID_FIELD.to_string(), Value::String(inserted.inserted_id));
    serde_json::from_value(Value::Object(stored)).context("Stored record does not fit its model")
  }

  /// Merge `model` into its stored record, or insert it when it has no
  /// identity yet or nothing carries that identity. Returns the identity.
  pub async fn save(&self, model: &T) -> Result<String> {
    if let Some(id) = model.id() {
      let record = Self::encode(model)?;
      if self.update_by_id(id, &record).await.matched_count > 0 {
        return Ok(id.to_string());
      }
    }
    let stored = self.insert(model).await?;
    stored
      .id()
      .map(str::to_string)
      .context("Stored record has no identity")
  }

  /// Field-level merge into the record with identity `id`.
  pub async fn update_by_id(&self, id: &str, updates: &Record) -> UpdateResult {
    self.provider
      .update_one(T::COLLECTION, &id_filter(id), updates)
      .await
  }

  /// Remove the record with identity `id`.
  pub async fn delete_by_id(&self, id: &str) -> DeleteResult {
    self.provider.delete_one(T::COLLECTION, &id_filter(id)).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::metrics::StoreMetrics;
  use crate::adapters::mongo::MongoStore;
  use crate::adapters::persistence::JsonFileStore;
  use crate::domain::models::{Role, User};
  use crate::domain::record::filter_from;
  use serde_json::json;
  use std::time::Duration;

  type Users = TypedCollection<User, MongoStore, JsonFileStore>;

  fn users_at(path: std::path::PathBuf) -> Users {
    let provider = Arc::new(DataProvider::new(
      Arc::new(MongoStore::new("test", Duration::from_millis(50))),
      Arc::new(JsonFileStore::new(path)),
      Arc::new(StoreMetrics::new().unwrap()),
    ));
    TypedCollection::new(provider)
  }

  fn users() -> (tempfile::TempDir, Users) {
    let dir = tempfile::tempdir().unwrap();
    let users = users_at(dir.path().join("local_db.json"));
    (dir, users)
  }

  fn user(email: &str) -> User {
    User {
      id: None,
      email: email.to_string(),
      role: Role::Trader,
      name: None,
      balance: 100.0,
      plan: None,
      extra: Record::new(),
    }
  }

  #[tokio::test]
  async fn test_insert_and_promote_user() {
    let (_dir, users) = users();
    let stored = users.insert(&user("a@x.com")).await.unwrap();
    let id = stored.id.clone().unwrap();

    let result = users
      .update_by_id(&id, &filter_from(json!({"role": "admin"})))
      .await;
    assert_eq!(result.modified_count, 1);

    let found = users.find_by_id(&id).await.unwrap();
    assert_eq!(found.role, Role::Admin);
    assert_eq!(found.email, "a@x.com");
    assert_eq!(found.balance, 100.0);

    assert_eq!(users.delete_by_id(&id).await.deleted_count, 1);
    assert!(users.find_by_id(&id).await.is_none());
  }

  #[tokio::test]
  async fn test_find_skips_records_that_do_not_fit() {
    let (_dir, users) = users();
    users.insert(&user("ok@x.com")).await.unwrap();
    users
      .provider
      .insert_one("users", filter_from(json!({"email": "broken@x.com", "role": 7})))
      .await;

    let all = users.find(&Filter::new()).await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].email, "ok@x.com");
  }

  #[tokio::test]
  async fn test_insert_errors_when_no_backend_stores_it() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let users = users_at(blocker.join("local_db.json"));

    let err = users.insert(&user("a@x.com")).await.unwrap_err();
    assert!(err.to_string().contains("every backend"));
    assert_eq!(users.provider.failures(), 1);
  }

  #[tokio::test]
  async fn test_save_inserts_then_merges() {
    let (_dir, users) = users();
    let mut model = user("a@x.com");

    let id = users.save(&model).await.unwrap();
    assert!(!id.is_empty());

    model.id = Some(id.clone());
    model.role = Role::Admin;
    assert_eq!(users.save(&model).await.unwrap(), id);

    let all = users.find(&Filter::new()).await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].role, Role::Admin);
    assert_eq!(all[0].id(), Some(id.as_str()));
  }

  #[tokio::test]
  async fn test_whole_balance_found_by_integer_and_string_filters() {
    let (_dir, users) = users();
    users.insert(&user("a@x.com")).await.unwrap();

    for filter in [json!({"balance": 100}), json!({"balance": "100"}), json!({"balance": 100.0})] {
      assert_eq!(users.find(&filter_from(filter)).await.len(), 1);
    }
    assert!(users.find(&filter_from(json!({"balance": 99}))).await.is_empty());
  }
}
