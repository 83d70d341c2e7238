//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! infrastructure (in-memory store, files, HTTP). Each sub-module groups
//! adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `clock`: Wall clock and a manual clock for tests
//! - `directory`: Seeded memberships, contributions and buyer approvals
//! - `http`: axum router, principal extraction, admission, audit
//! - `metrics`: Prometheus metrics and health probes
//! - `notify`: Structured-log notifier
//! - `persistence`: In-memory store, JSON state file, JSONL audit log
//! - `throttle`: Sliding-window submission counter

pub mod clock;
pub mod directory;
pub mod http;
pub mod metrics;
pub mod notify;
pub mod persistence;
pub mod throttle;
