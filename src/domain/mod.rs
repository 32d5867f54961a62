//! Domain layer - Records, identities and collection models.
//!
//! Pure data types and matching rules shared by every backend.
//! No I/O here (hexagonal architecture inner ring).

pub mod models;
pub mod record;

// Re-export core types for convenience
pub use models::{CollectionModel, Notification, Transaction, UpgradePlan, User};
pub use record::{DeleteResult, Filter, InsertOneResult, Record, UpdateResult};
