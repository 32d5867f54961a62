//! Typed records for the dashboard's known collections.
//!
//! Each model names the fields controllers actually read and keeps
//! everything else in `extra`, so unknown fields survive a
//! read-modify-write cycle unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::record::Record;

/// A typed view over one named collection.
pub trait CollectionModel: Serialize + DeserializeOwned + Send + Sync {
    /// Collection name on both backends.
    const COLLECTION: &'static str;

    /// Identity, once persisted.
    fn id(&self) -> Option<&str>;
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trader,
    Admin,
}

/// A dashboard account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl CollectionModel for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Direction of a balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Trade,
    Upgrade,
}

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// A balance movement on an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl CollectionModel for Transaction {
    const COLLECTION: &'static str = "transactions";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A message shown in the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(flatten)]
    pub extra: Record,
}

impl CollectionModel for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A purchasable account tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePlan {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(flatten)]
    pub extra: Record,
}

impl CollectionModel for UpgradePlan {
    const COLLECTION: &'static str = "upgrade_plans";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
