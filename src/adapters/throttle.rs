//! Sliding-window Submission Throttle - In-process Counter Store
//!
//! Keeps the timestamps of recent hits per key and drops those that fell
//! out of the window before counting. The check and the record happen
//! under one lock, so a hit is atomic within this process.
//!
//! Counters are per process. Behind a load balancer with several
//! replicas the effective limit is multiplied by the replica count; a
//! shared counter store belongs behind the same port for that setup.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::ports::{SubmissionThrottle, ThrottleDecision, ThrottleQuota};

#[derive(Debug, Default)]
pub struct SlidingWindowThrottle {
    hits: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl SlidingWindowThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys whose every hit is older than `window` at `now`.
    pub async fn purge_idle(&self, window: std::time::Duration, now: DateTime<Utc>) -> usize {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return 0;
        };
        let mut hits = self.hits.lock().await;
        let before = hits.len();
        hits.retain(|_, stamps| stamps.back().is_some_and(|t| now - *t < window));
        before - hits.len()
    }
}

#[async_trait]
impl SubmissionThrottle for SlidingWindowThrottle {
    async fn hit(
        &self,
        key: &str,
        quota: ThrottleQuota,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ThrottleDecision> {
        let window = chrono::Duration::from_std(quota.window)?;
        let mut hits = self.hits.lock().await;
        let stamps = hits.entry(key.to_string()).or_default();

        // Evict hits that fell out of the window.
        while stamps.front().is_some_and(|t| now - *t >= window) {
            stamps.pop_front();
        }

        let used = u32::try_from(stamps.len()).unwrap_or(u32::MAX);
        if used >= quota.limit {
            return Ok(ThrottleDecision::Limited);
        }

        stamps.push_back(now);
        Ok(ThrottleDecision::Allowed {
            remaining: quota.limit - used - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const QUOTA: ThrottleQuota = ThrottleQuota::new(4, Duration::from_secs(60));

    #[tokio::test]
    async fn test_limits_fifth_hit_inside_window() {
        let throttle = SlidingWindowThrottle::new();
        let start = Utc::now();

        for i in 0..4 {
            let at = start + chrono::Duration::seconds(i);
            let decision = throttle.hit("b1:bid-1", QUOTA, at).await.unwrap();
            assert_eq!(
                decision,
                ThrottleDecision::Allowed {
                    remaining: 3 - u32::try_from(i).unwrap()
                }
            );
        }
        let fifth = throttle
            .hit("b1:bid-1", QUOTA, start + chrono::Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(fifth, ThrottleDecision::Limited);

        // Other keys are independent.
        let other = throttle.hit("b1:bid-2", QUOTA, start).await.unwrap();
        assert!(matches!(other, ThrottleDecision::Allowed { .. }));
    }

    #[tokio::test]
    async fn test_window_slides() {
        let throttle = SlidingWindowThrottle::new();
        let start = Utc::now();
        for i in 0..4 {
            throttle
                .hit("k", QUOTA, start + chrono::Duration::seconds(i * 10))
                .await
                .unwrap();
        }
        // First hit expires at +60s, freeing exactly one slot.
        let at = start + chrono::Duration::seconds(60);
        assert!(matches!(
            throttle.hit("k", QUOTA, at).await.unwrap(),
            ThrottleDecision::Allowed { remaining: 0 }
        ));
        assert_eq!(
            throttle.hit("k", QUOTA, at).await.unwrap(),
            ThrottleDecision::Limited
        );
    }

    #[tokio::test]
    async fn test_purge_idle_keys() {
        let throttle = SlidingWindowThrottle::new();
        let start = Utc::now();
        throttle.hit("old", QUOTA, start).await.unwrap();
        throttle
            .hit("fresh", QUOTA, start + chrono::Duration::seconds(90))
            .await
            .unwrap();

        let purged = throttle
            .purge_idle(QUOTA.window, start + chrono::Duration::seconds(100))
            .await;
        assert_eq!(purged, 1);
    }
}
