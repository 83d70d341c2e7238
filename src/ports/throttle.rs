//! Submission Throttle Port - Shared Rate-limit Counter Interface
//!
//! Offer submissions are limited per (buyer, bid) over a sliding window.
//! The counter lives behind this port so it can be backed by a shared
//! store with atomic increment-with-expiry; an in-process adapter only
//! gives approximate limits once the service runs on several replicas.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Window parameters for a throttle key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleQuota {
  /// Hits allowed inside one window.
  pub limit: u32,
  /// Sliding window length.
  pub window: Duration,
}

impl ThrottleQuota {
  pub const fn new(limit: u32, window: Duration) -> Self {
    Self { limit, window }
  }
}

/// Outcome of recording one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
  /// Hit recorded; `remaining` further hits fit in the window.
  Allowed { remaining: u32 },
  /// Window full; nothing recorded.
  Limited,
}

#[async_trait]
pub trait SubmissionThrottle: Send + Sync + 'static {
  /// Atomically check the window for `key` at `now` and record a hit if
  /// it fits.
  async fn hit(
    &self,
    key: &str,
    quota: ThrottleQuota,
    now: DateTime<Utc>,
  ) -> anyhow::Result<ThrottleDecision>;
}
