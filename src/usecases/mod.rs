//! Use Cases Layer - Application Persistence Logic
//!
//! Orchestrates the store ports into the operations callers use.
//! Controllers only ever talk to this layer, never to an adapter.
//!
//! Use cases:
//! - `DataProvider`: Dual-backend fan-out, merge and fallback
//! - `TypedCollection`: Model-typed access to known collections

pub mod collections;
pub mod data_provider;

pub use collections::TypedCollection;
pub use data_provider::{DataProvider, ProviderStatus};
