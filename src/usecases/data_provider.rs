//! Data Provider - Unified Dual-Backend Access
//!
//! Fans every logical operation out to the primary store (when it is
//! available) and then to the fallback store. Each backend call is
//! independent: a failure in one is logged, counted, and never stops
//! the other from running or reaches the caller as an error.
//!
//! Result precedence:
//! - `find`: primary records first, then fallback records whose
//!   identity the primary did not already return
//! - `find_one`: primary hit wins; fallback is consulted on a primary
//!   miss, error, or outage
//! - writes: primary result, else fallback result, else a zero-effect
//!   result

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::adapters::metrics::StoreMetrics;
use crate::domain::record::{
  identity_of, DeleteResult, Filter, InsertOneResult, Record, UpdateResult, ID_FIELD,
};
use crate::ports::store::DocumentStore;

/// Point-in-time view of backend availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderStatus {
  /// Primary store has a live connection.
  pub primary_available: bool,
  /// Fallback store can write to disk.
  pub fallback_healthy: bool,
}

/// The single entry point callers use for persistence.
///
/// Holds no mutable state of its own; all state lives in the two stores.
pub struct DataProvider<P: DocumentStore, F: DocumentStore> {
  /// Optional networked store.
  primary: Arc<P>,
  /// Always-available local store.
  fallback: Arc<F>,
  /// Operation and failure counters.
  metrics: Arc<StoreMetrics>,
}

impl<P: DocumentStore, F: DocumentStore> DataProvider<P, F> {
  /// Create a provider over an explicit pair of stores.
  pub fn new(primary: Arc<P>, fallback: Arc<F>, metrics: Arc<StoreMetrics>) -> Self {
    Self {
      primary,
      fallback,
      metrics,
    }
  }

  /// The primary store.
  pub fn primary(&self) -> &Arc<P> {
    &self.primary
  }

  /// The fallback store.
  pub fn fallback(&self) -> &Arc<F> {
    &self.fallback
  }

  /// Shared metrics.
  pub fn metrics(&self) -> &Arc<StoreMetrics> {
    &self.metrics
  }

  /// Total backend failures swallowed so far.
  pub fn failures(&self) -> u64 {
    self.metrics.total_failures()
  }

  /// Current backend availability.
  pub async fn status(&self) -> ProviderStatus {
    ProviderStatus {
      primary_available: self.primary_up().await,
      fallback_healthy: self.fallback.is_healthy().await,
    }
  }

  async fn primary_up(&self) -> bool {
    let up = self.primary.is_available().await;
    self.metrics.primary_available.set(i64::from(up));
    up
  }

  /// Turn a backend error into a logged, counted `None`.
  fn recover<T>(
    &self,
    backend: &'static str,
    operation: &'static str,
    collection: &str,
    result: anyhow::Result<T>,
  ) -> Option<T> {
    match result {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(
          backend,
          operation,
          collection,
          error = %format!("{e:#}"),
          "Backend call failed, continuing"
        );
        self.metrics.record_failure(backend, operation);
        None
      }
    }
  }

  /// Union of both backends, deduplicated by identity, primary first.
  #[instrument(skip(self, filter))]
  pub async fn find(&self, collection: &str, filter: &Filter) -> Vec<Record> {
    self.metrics.record_operation("find");

    let mut merged = Vec::new();
    let mut seen = HashSet::new();

    if self.primary_up().await {
      let result = self.primary.find(collection, filter).await;
      if let Some(records) = self.recover(self.primary.name(), "find", collection, result) {
        push_unique(&mut merged, &mut seen, records);
      }
    }

    let primary_count = merged.len();
    let result = self.fallback.find(collection, filter).await;
    if let Some(records) = self.recover(self.fallback.name(), "find", collection, result) {
      push_unique(&mut merged, &mut seen, records);
    }

    debug!(
      primary = primary_count,
      fallback_only = merged.len() - primary_count,
      "Merged find results"
    );
    merged
  }

  /// First matching record: primary hit wins, otherwise the fallback's.
  #[instrument(skip(self, filter))]
  pub async fn find_one(&self, collection: &str, filter: &Filter) -> Option<Record> {
    self.metrics.record_operation("find_one");

    if self.primary_up().await {
      let result = self.primary.find_one(collection, filter).await;
      if let Some(Some(record)) =
        self.recover(self.primary.name(), "find_one", collection, result)
      {
        return Some(record);
      }
    }

    let result = self.fallback.find_one(collection, filter).await;
    self.recover(self.fallback.name(), "find_one", collection, result)
      .flatten()
  }

  /// Write to both backends.
  ///
  /// The primary's assigned identity is carried into the fallback copy
  /// so later reads see one record, not two.
  #[instrument(skip(self, doc))]
  pub async fn insert_one(&self, collection: &str, doc: Record) -> InsertOneResult {
    self.metrics.record_operation("insert_one");

    let mut primary_result = None;
    let mut fallback_doc = doc.clone();

    if self.primary_up().await {
      let result = self.primary.insert_one(collection, doc.clone()).await;
      primary_result = self.recover(self.primary.name(), "insert_one", collection, result);
      if let Some(inserted) = &primary_result {
        fallback_doc.insert(ID_FIELD.to_string(), inserted.inserted_id.clone().into());
      }
    }

    let result = self.fallback.insert_one(collection, fallback_doc).await;
    let fallback_result = self.recover(self.fallback.name(), "insert_one", collection, result);

    primary_result.or(fallback_result).unwrap_or_else(|| {
      warn!(collection, "Insert failed on every backend");
      InsertOneResult {
        inserted_id: identity_of(&doc).unwrap_or_default(),
        record: doc,
      }
    })
  }

  /// Field-level merge applied to both backends.
  #[instrument(skip(self, filter, updates))]
  pub async fn update_one(
    &self,
    collection: &str,
    filter: &Filter,
    updates: &Record,
  ) -> UpdateResult {
    self.metrics.record_operation("update_one");

    let mut primary_result = None;
    if self.primary_up().await {
      let result = self.primary.update_one(collection, filter, updates).await;
      primary_result = self.recover(self.primary.name(), "update_one", collection, result);
    }

    let result = self.fallback.update_one(collection, filter, updates).await;
    let fallback_result = self.recover(self.fallback.name(), "update_one", collection, result);

    primary_result
      .or(fallback_result)
      .unwrap_or_else(UpdateResult::none)
  }

  /// Delete from both backends.
  #[instrument(skip(self, filter))]
  pub async fn delete_one(&self, collection: &str, filter: &Filter) -> DeleteResult {
    self.metrics.record_operation("delete_one");

    let mut primary_result = None;
    if self.primary_up().await {
      let result = self.primary.delete_one(collection, filter).await;
      primary_result = self.recover(self.primary.name(), "delete_one", collection, result);
    }

    let result = self.fallback.delete_one(collection, filter).await;
    let fallback_result = self.recover(self.fallback.name(), "delete_one", collection, result);

    primary_result
      .or(fallback_result)
      .unwrap_or_else(DeleteResult::none)
  }
}

fn push_unique(merged: &mut Vec<Record>, seen: &mut HashSet<String>, records: Vec<Record>) {
  for record in records {
    match identity_of(&record) {
      Some(id) => {
        if seen.insert(id) {
          merged.push(record);
        }
      }
      None => merged.push(record),
    }
  }
}
