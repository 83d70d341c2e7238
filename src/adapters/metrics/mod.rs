//! Metrics and Monitoring Adapters
//!
//! Prometheus metrics rendered at `/metrics` and health probes at
//! `/live` and `/ready`, all mounted on the main axum listener.

pub mod health;
pub mod prometheus;

pub use health::HealthState;
pub use self::prometheus::MetricsRegistry;
