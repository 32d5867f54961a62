//! Persistence Adapters - File-backed Document Storage
//!
//! Implements the `DocumentStore` port on top of a single JSON file
//! with atomic whole-file rewrites. No database dependency: this is
//! the fallback backend that is always available.

pub mod json_file;

pub use json_file::{Datastore, JsonFileStore};
