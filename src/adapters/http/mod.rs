//! HTTP Adapter - axum Router for the Trade API
//!
//! Routes:
//! - `/trade/orgs/:org_id/bids[...]`: cooperative staff operations
//! - `/trade/bids/...`: buyer offers, open bids and masked results
//! - `/trade/farmer/bids`: farmer bid feed
//! - `/live`, `/ready`, `/metrics`: probes and Prometheus
//!
//! Trade routes pass through per-principal admission and the request
//! audit layer. Probes and metrics do not.

pub mod admission;
pub mod audit;
pub mod handlers;
pub mod principal;
pub mod response;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::ports::{AuditSink, Clock};
use crate::usecases::{BidLifecycle, EligibilityResolver, OfferLedger};

pub use admission::Admission;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<BidLifecycle>,
    pub ledger: Arc<OfferLedger>,
    pub eligibility: Arc<EligibilityResolver>,
    pub audit: Arc<dyn AuditSink>,
    pub metrics: Arc<MetricsRegistry>,
    pub admission: Arc<Admission>,
    pub clock: Arc<dyn Clock>,
}

/// Build the complete application router.
pub fn router(state: AppState, health: HealthState) -> Router {
    let trade = Router::new()
        .route(
            "/trade/orgs/:org_id/bids",
            post(handlers::create_bid).get(handlers::list_bids),
        )
        .route("/trade/orgs/:org_id/bids/:bid_id", get(handlers::get_bid))
        .route(
            "/trade/orgs/:org_id/bids/:bid_id/offers",
            get(handlers::list_offers),
        )
        .route(
            "/trade/orgs/:org_id/bids/:bid_id/close",
            post(handlers::close_bid),
        )
        .route(
            "/trade/orgs/:org_id/bids/:bid_id/winner",
            post(handlers::set_winner),
        )
        .route(
            "/trade/orgs/:org_id/bids/:bid_id/cancel",
            post(handlers::cancel_bid),
        )
        .route("/trade/bids/open", get(handlers::list_open_bids))
        .route("/trade/bids/:bid_id/offers", post(handlers::submit_offer))
        .route(
            "/trade/bids/:bid_id/offers/:offer_id/withdraw",
            post(handlers::withdraw_offer),
        )
        .route("/trade/bids/:bid_id/result", get(handlers::bid_result))
        .route("/trade/farmer/bids", get(handlers::farmer_bids))
        // Last added runs first: audit wraps admission so 429s are audited too.
        .route_layer(from_fn_with_state(state.clone(), admission::admit))
        .route_layer(from_fn_with_state(state.clone(), audit::record_request))
        .with_state(state.clone());

    let ops = Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(state);

    Router::new().merge(trade).merge(ops).merge(health.routes())
}
