//! Per-principal request admission.
//!
//! Every caller (keyed by `x-actor-uid`, or one shared bucket for
//! requests without one) gets a token bucket of `requests_per_second`
//! with `burst` capacity. Exhausted buckets are answered with 429 before
//! the request reaches a handler. This guards the service as a whole and
//! is separate from the per-(buyer, bid) offer submission window.

use std::num::NonZeroU32;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use super::principal::UID_HEADER;
use super::response::failure;
use super::AppState;
use crate::config::AdmissionConfig;

const ANONYMOUS: &str = "anonymous";

pub struct Admission {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl Admission {
    pub fn new(config: &AdmissionConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(rps);
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(rps).allow_burst(burst)),
        }
    }

    /// Take one token for `key`.
    pub fn admit(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Forget buckets that have fully refilled.
    pub fn purge_idle(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        let after = self.limiter.len();
        debug!(before, after, "Admission buckets purged");
        before.saturating_sub(after)
    }
}

/// Middleware: reject callers whose bucket is empty.
pub async fn admit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = request
        .headers()
        .get(UID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| ANONYMOUS.to_string(), |v| v.trim().to_string());

    if state.admission.admit(&key) {
        next.run(request).await
    } else {
        warn!(caller = %key, "Request admission throttled");
        failure(
            StatusCode::TOO_MANY_REQUESTS,
            "too many requests, slow down",
        )
    }
}
