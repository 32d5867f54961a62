//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `DocumentStore`: Collection-oriented record persistence

pub mod store;

pub use store::{DocumentStore, StoreError};
