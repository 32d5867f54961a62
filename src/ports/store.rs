//! Document Store Port - Collection-Oriented Persistence Interface
//!
//! Defines the five verbs every backend must offer over named,
//! schemaless collections. The primary (networked) and fallback
//! (file-backed) adapters both implement this trait; the data
//! provider fans each call out to both.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::record::{DeleteResult, Filter, InsertOneResult, Record, UpdateResult};

/// Adapter-level failure conditions.
///
/// Adapters wrap these in `anyhow::Error` with call-site context;
/// callers that care can `downcast_ref::<StoreError>()`.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The backend has no live connection.
  #[error("{backend} store is not connected")]
  Unavailable {
    /// Backend name (`primary`, `fallback`).
    backend: &'static str,
  },
  /// A record or filter could not be converted to the backend's format.
  #[error("failed to convert {what}: {reason}")]
  Conversion {
    /// What was being converted.
    what: &'static str,
    /// Underlying reason.
    reason: String,
  },
}

/// Trait for collection-oriented document stores.
///
/// All methods are best-effort from the caller's perspective: an
/// `Err` means this backend could not serve the call, not that the
/// logical operation failed overall.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
  /// Short backend name used in logs and metric labels.
  fn name(&self) -> &'static str;

  /// Whether the store can currently accept calls. Never fails.
  async fn is_available(&self) -> bool;

  /// All records in `collection` matching `filter`, in stored order.
  async fn find(&self, collection: &str, filter: &Filter) -> anyhow::Result<Vec<Record>>;

  /// First record matching `filter`, if any.
  async fn find_one(&self, collection: &str, filter: &Filter) -> anyhow::Result<Option<Record>>;

  /// Store `doc`, assigning an identity if it has none.
  async fn insert_one(&self, collection: &str, doc: Record) -> anyhow::Result<InsertOneResult>;

  /// Field-level merge of `updates` into the first record matching `filter`.
  async fn update_one(
    &self,
    collection: &str,
    filter: &Filter,
    updates: &Record,
  ) -> anyhow::Result<UpdateResult>;

  /// Remove the first record matching `filter`.
  async fn delete_one(&self, collection: &str, filter: &Filter) -> anyhow::Result<DeleteResult>;

  /// Deeper health probe (disk writable, server reachable).
  async fn is_healthy(&self) -> bool;
}
