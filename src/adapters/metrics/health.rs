//! Health Probes - Liveness and Readiness
//!
//! `/live` answers as long as the process serves HTTP. `/ready` also
//! requires the trade store to report healthy and the service not to be
//! draining for shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::ports::TradeStore;

/// Shared health state polled by readiness probes.
#[derive(Clone)]
pub struct HealthState {
    store: Arc<dyn TradeStore>,
    /// Cleared once shutdown has been requested.
    accepting: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new(store: Arc<dyn TradeStore>) -> Self {
        Self {
            store,
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop reporting ready; in-flight requests still complete.
    pub fn begin_drain(&self) {
        self.accepting.store(false, Ordering::Relaxed);
    }

    pub async fn is_ready(&self) -> bool {
        self.accepting.load(Ordering::Relaxed) && self.store.is_healthy().await
    }

    /// `/live` and `/ready` routes.
    pub fn routes(self) -> Router {
        Router::new()
            .route("/live", get(liveness))
            .route("/ready", get(readiness))
            .with_state(self)
    }
}

/// Liveness probe: always 200 while the process is serving.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 200 only when the store is healthy and not draining.
async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    if state.is_ready().await {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
