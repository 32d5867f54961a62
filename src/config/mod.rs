//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides. Every section has defaults, so a
//! missing file yields a working fallback-only setup.

pub mod loader;

use serde::Deserialize;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Primary (MongoDB) store.
  #[serde(default)]
  pub primary: PrimaryConfig,
  /// Fallback (JSON file) store.
  #[serde(default)]
  pub fallback: FallbackConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name (also the driver app name).
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Primary store configuration.
///
/// An absent or empty `uri` disables the primary entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryConfig {
  /// MongoDB connection string.
  #[serde(default)]
  pub uri: Option<String>,
  /// Database name.
  #[serde(default = "default_database")]
  pub database: String,
  /// Server selection / connect timeout (milliseconds).
  #[serde(default = "default_server_selection_timeout")]
  pub server_selection_timeout_ms: u64,
}

impl PrimaryConfig {
  /// Connection string, if the primary is enabled.
  pub fn enabled_uri(&self) -> Option<&str> {
    self.uri.as_deref().map(str::trim).filter(|u| !u.is_empty())
  }
}

/// Fallback store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
  /// Path of the JSON datastore file.
  #[serde(default = "default_fallback_path")]
  pub path: String,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve /live, /ready and /metrics.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
    }
  }
}

impl Default for PrimaryConfig {
  fn default() -> Self {
    Self {
      uri: None,
      database: default_database(),
      server_selection_timeout_ms: default_server_selection_timeout(),
    }
  }
}

impl Default for FallbackConfig {
  fn default() -> Self {
    Self {
      path: default_fallback_path(),
    }
  }
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "dual-store".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_database() -> String {
  "dashboard".to_string()
}

fn default_server_selection_timeout() -> u64 {
  5_000
}

fn default_fallback_path() -> String {
  "local_db.json".to_string()
}

fn default_true() -> bool {
  true
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
