//! Request audit and HTTP metrics.
//!
//! Mounted with `route_layer`, so it only sees requests that matched a
//! route and `MatchedPath` is always available. One audit record and one
//! metrics sample per routed request. Audit write failures are logged
//! and never change the response.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use super::principal::principal_from_headers;
use super::AppState;
use crate::ports::AuditRecord;

/// Pull `:name` parameters out of `path` using the route `template`.
pub fn path_params(template: &str, path: &str) -> HashMap<String, String> {
    template
        .split('/')
        .zip(path.split('/'))
        .filter_map(|(t, p)| {
            t.strip_prefix(':')
                .map(|name| (name.to_string(), p.to_string()))
        })
        .collect()
}

pub async fn record_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| path.clone(), |m| m.as_str().to_string());
    let principal = principal_from_headers(request.headers()).ok();

    let response = next.run(request).await;
    let status = response.status();

    state
        .metrics
        .http_requests
        .with_label_values(&[route.as_str(), method.as_str(), status.as_str()])
        .inc();
    state
        .metrics
        .http_latency_seconds
        .with_label_values(&[route.as_str()])
        .observe(started.elapsed().as_secs_f64());

    let mut params = path_params(&route, &path);
    let record = AuditRecord {
        at: state.clock.now(),
        actor_uid: principal.as_ref().map(|p| p.uid.clone()),
        actor_role: principal.as_ref().map(|p| p.role.as_str().to_string()),
        action: format!("{method} {route}"),
        org_id: params.remove("org_id"),
        bid_id: params.remove("bid_id"),
        offer_id: params.remove("offer_id"),
        status_code: status.as_u16(),
    };
    if let Err(e) = state.audit.record(&record).await {
        warn!(action = %record.action, error = %e, "Audit write failed");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_params_follow_template() {
        let params = path_params(
            "/trade/orgs/:org_id/bids/:bid_id/close",
            "/trade/orgs/coop-a/bids/b-42/close",
        );
        assert_eq!(params.get("org_id").map(String::as_str), Some("coop-a"));
        assert_eq!(params.get("bid_id").map(String::as_str), Some("b-42"));
        assert_eq!(params.len(), 2);

        assert!(path_params("/trade/bids/open", "/trade/bids/open").is_empty());
    }
}
