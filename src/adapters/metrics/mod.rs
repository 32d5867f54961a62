//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus counters for provider operations and swallowed
//! backend failures, plus health check endpoints (/live, /ready,
//! /metrics) via axum 0.7.

pub mod health;
pub mod prometheus;

pub use health::HealthServer;
pub use prometheus::StoreMetrics;
