//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    bind = %config.service.bind_address,
    submissions = config.trade.max_submissions_per_window,
    window_s = config.trade.submission_window_seconds,
    sweep_s = config.scheduler.interval_seconds,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.trim().is_empty(),
    "service.name must not be empty"
  );
  config
    .service
    .bind_address
    .parse::<SocketAddr>()
    .with_context(|| {
      format!(
        "service.bind_address is not a socket address: {}",
        config.service.bind_address
      )
    })?;

  // Offer throttle validation
  anyhow::ensure!(
    config.trade.max_submissions_per_window > 0,
    "trade.max_submissions_per_window must be positive"
  );
  anyhow::ensure!(
    config.trade.submission_window_seconds > 0,
    "trade.submission_window_seconds must be positive"
  );

  // Sweep validation
  anyhow::ensure!(
    config.scheduler.interval_seconds > 0,
    "scheduler.interval_seconds must be positive, got {}",
    config.scheduler.interval_seconds
  );

  // Admission validation
  anyhow::ensure!(
    config.admission.requests_per_second > 0,
    "admission.requests_per_second must be positive"
  );
  anyhow::ensure!(
    config.admission.burst >= config.admission.requests_per_second,
    "admission.burst ({}) must be >= requests_per_second ({})",
    config.admission.burst,
    config.admission.requests_per_second
  );

  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "persistence.data_dir must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = parse_config(
      r#"
      [service]
      name = "coop-trade"
      "#,
    )
    .unwrap();
    assert_eq!(config.trade.max_submissions_per_window, 4);
    assert_eq!(config.trade.submission_window_seconds, 60);
    assert_eq!(config.scheduler.interval_seconds, 60);
    assert!(config.scheduler.enabled);
    assert_eq!(config.service.bind_address, "0.0.0.0:8080");
    assert!(config.directory.seed_path.is_none());
  }

  #[test]
  fn test_rejects_zero_window() {
    let result = parse_config(
      r#"
      [service]
      name = "coop-trade"

      [trade]
      submission_window_seconds = 0
      "#,
    );
    assert!(result.is_err());
  }

  #[test]
  fn test_rejects_bad_bind_address() {
    let result = parse_config(
      r#"
      [service]
      name = "coop-trade"
      bind_address = "localhost"
      "#,
    );
    assert!(result.is_err());
  }
}
