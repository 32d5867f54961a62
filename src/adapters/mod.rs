//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (MongoDB driver, file I/O, HTTP). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `mongo`: Primary document store over the MongoDB driver
//! - `persistence`: Fallback JSON-file document store
//! - `metrics`: Prometheus counters and health check endpoints

pub mod metrics;
pub mod mongo;
pub mod persistence;
