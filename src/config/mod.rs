//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Throttle limits,
//! sweep cadence and file locations are externalized here; nothing is
//! hardcoded in the use case layer.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::ports::ThrottleQuota;

/// Top-level service configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the service begins accepting requests.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity, logging and bind address.
  pub service: ServiceConfig,
  /// Offer ledger rules.
  #[serde(default)]
  pub trade: TradeConfig,
  /// Expired-bid sweep.
  #[serde(default)]
  pub scheduler: SchedulerConfig,
  /// Per-principal HTTP admission throttle.
  #[serde(default)]
  pub admission: AdmissionConfig,
  /// State file and audit log locations.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Membership / approval seed data.
  #[serde(default)]
  pub directory: DirectoryConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// HTTP bind address for the trade API, health and metrics.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
}

/// Offer ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeConfig {
  /// Submissions allowed per (buyer, bid) inside one window.
  #[serde(default = "default_max_submissions")]
  pub max_submissions_per_window: u32,
  /// Sliding window length (seconds).
  #[serde(default = "default_submission_window")]
  pub submission_window_seconds: u64,
}

impl TradeConfig {
  pub const fn submission_quota(&self) -> ThrottleQuota {
    ThrottleQuota::new(
      self.max_submissions_per_window,
      Duration::from_secs(self.submission_window_seconds),
    )
  }
}

impl Default for TradeConfig {
  fn default() -> Self {
    Self {
      max_submissions_per_window: default_max_submissions(),
      submission_window_seconds: default_submission_window(),
    }
  }
}

/// Scheduler sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
  /// Run the sweep at all.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Interval between sweeps (seconds).
  #[serde(default = "default_sweep_interval")]
  pub interval_seconds: u64,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      interval_seconds: default_sweep_interval(),
    }
  }
}

/// HTTP admission throttle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
  /// Sustained requests per second per principal.
  #[serde(default = "default_requests_per_second")]
  pub requests_per_second: u32,
  /// Burst capacity per principal.
  #[serde(default = "default_burst")]
  pub burst: u32,
}

impl Default for AdmissionConfig {
  fn default() -> Self {
    Self {
      requests_per_second: default_requests_per_second(),
      burst: default_burst(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the state file and JSONL audit logs.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// Load/save the in-memory store as `state.json`.
  #[serde(default = "default_true")]
  pub state_file_enabled: bool,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      state_file_enabled: true,
    }
  }
}

/// Directory seed configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
  /// JSON file with memberships, contributions and approved buyers.
  pub seed_path: Option<String>,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_bind_address() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_true() -> bool {
  true
}

fn default_max_submissions() -> u32 {
  4
}

fn default_submission_window() -> u64 {
  60
}

fn default_sweep_interval() -> u64 {
  60
}

fn default_requests_per_second() -> u32 {
  20
}

fn default_burst() -> u32 {
  40
}

fn default_data_dir() -> String {
  "data".to_string()
}
