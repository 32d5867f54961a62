//! Primary Store Adapter - MongoDB
//!
//! Networked document store behind the `DocumentStore` port. Optional:
//! when it cannot connect, the data provider runs on the file store alone.

pub mod convert;
pub mod store;

pub use store::MongoStore;
