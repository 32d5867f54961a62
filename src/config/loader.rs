//! Configuration Loader - File Loading, Env Overrides and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages for
//! misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Environment variable overriding `primary.uri`.
pub const ENV_MONGODB_URI: &str = "MONGODB_URI";
/// Environment variable overriding `primary.database`.
pub const ENV_MONGODB_DB: &str = "MONGODB_DB";
/// Environment variable overriding `fallback.path`.
pub const ENV_LOCAL_DB_PATH: &str = "LOCAL_DB_PATH";
/// Environment variable overriding `service.log_level`.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Load and validate configuration from a TOML file.
///
/// A missing file is not an error: defaults are used. Environment
/// variables are applied on top of whatever the file provided.
///
/// # Errors
/// Returns detailed error if:
/// - The file exists but can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let mut config = if path.exists() {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)?
  } else {
    info!(path = %path.display(), "No config file found, using defaults");
    AppConfig::default()
  };

  apply_overrides(&mut config, |key| std::env::var(key).ok());
  validate_config(&config)?;

  info!(
    primary_enabled = config.primary.enabled_uri().is_some(),
    database = %config.primary.database,
    fallback_path = %config.fallback.path,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Apply overrides from `lookup` (normally the process environment).
pub fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
  if let Some(uri) = lookup(ENV_MONGODB_URI) {
    config.primary.uri = Some(uri);
  }
  if let Some(db) = lookup(ENV_MONGODB_DB) {
    config.primary.database = db;
  }
  if let Some(path) = lookup(ENV_LOCAL_DB_PATH) {
    config.fallback.path = path;
  }
  if let Some(level) = lookup(ENV_LOG_LEVEL) {
    config.service.log_level = level;
  }
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.fallback.path.trim().is_empty(),
    "fallback.path must not be empty"
  );

  if config.primary.enabled_uri().is_some() {
    anyhow::ensure!(
      !config.primary.database.trim().is_empty(),
      "primary.database must be set when primary.uri is configured"
    );
    anyhow::ensure!(
      config.primary.server_selection_timeout_ms > 0,
      "primary.server_selection_timeout_ms must be positive"
    );
  }

  if config.metrics.enabled {
    anyhow::ensure!(
      !config.metrics.bind_address.is_empty(),
      "metrics.bind_address must not be empty"
    );
  }

  Ok(())
}
