//! Route handlers. Each one extracts the caller and inputs, calls a
//! single use case and wraps the result in the envelope.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::error;

use super::principal::Actor;
use super::response::{ApiError, ApiJson, created, failure, ok, optional_body};
use super::AppState;
use crate::domain::{BidRequest, BidStatus, Commodity};
use crate::usecases::BidFilter;

type HandlerResult = Result<Response, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerBody {
    pub winner_offer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferBody {
    pub price_per_kg: Decimal,
    pub qty: Decimal,
    /// Only a superadmin may submit on behalf of another buyer.
    pub buyer_uid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BidListQuery {
    pub status: Option<String>,
    pub commodity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommodityQuery {
    pub commodity: Option<String>,
}

fn parse_commodity(raw: Option<&str>) -> Result<Option<Commodity>, ApiError> {
    raw.filter(|c| !c.is_empty())
        .map(Commodity::parse)
        .transpose()
        .map_err(ApiError)
}

pub async fn create_bid(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(org_id): Path<String>,
    ApiJson(request): ApiJson<BidRequest>,
) -> HandlerResult {
    let bid = state.lifecycle.create_bid(&org_id, request, &actor).await?;
    Ok(created(bid))
}

pub async fn list_bids(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(org_id): Path<String>,
    Query(query): Query<BidListQuery>,
) -> HandlerResult {
    let filter = BidFilter {
        status: query
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(BidStatus::parse)
            .transpose()?,
        commodity: parse_commodity(query.commodity.as_deref())?,
    };
    let bids = state.lifecycle.list_bids(&org_id, filter, &actor).await?;
    Ok(ok(bids))
}

pub async fn get_bid(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((org_id, bid_id)): Path<(String, String)>,
) -> HandlerResult {
    let bid = state.lifecycle.get_bid(&org_id, &bid_id, &actor).await?;
    Ok(ok(bid))
}

pub async fn list_offers(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((org_id, bid_id)): Path<(String, String)>,
) -> HandlerResult {
    let offers = state
        .lifecycle
        .list_offers_for_bid(&org_id, &bid_id, &actor)
        .await?;
    Ok(ok(offers))
}

pub async fn close_bid(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((org_id, bid_id)): Path<(String, String)>,
    body: Bytes,
) -> HandlerResult {
    let body: WinnerBody = optional_body(&body)?;
    let bid = state
        .lifecycle
        .close_bid(&org_id, &bid_id, body.winner_offer_id.as_deref(), &actor)
        .await?;
    state.metrics.bids_closed.with_label_values(&["manual"]).inc();
    Ok(ok(bid))
}

pub async fn set_winner(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((org_id, bid_id)): Path<(String, String)>,
    body: Bytes,
) -> HandlerResult {
    let body: WinnerBody = optional_body(&body)?;
    let update = state
        .lifecycle
        .set_winner(&org_id, &bid_id, body.winner_offer_id.as_deref(), &actor)
        .await?;
    if update.closed_now() {
        state.metrics.bids_closed.with_label_values(&["manual"]).inc();
    }
    Ok(ok(update.into_bid()))
}

pub async fn cancel_bid(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((org_id, bid_id)): Path<(String, String)>,
) -> HandlerResult {
    let bid = state.lifecycle.cancel_bid(&org_id, &bid_id, &actor).await?;
    Ok(ok(bid))
}

pub async fn list_open_bids(
    State(state): State<AppState>,
    Actor(_actor): Actor,
    Query(query): Query<CommodityQuery>,
) -> HandlerResult {
    let commodity = parse_commodity(query.commodity.as_deref())?;
    let bids = state.lifecycle.list_open_bids(commodity).await?;
    Ok(ok(bids))
}

pub async fn submit_offer(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(bid_id): Path<String>,
    ApiJson(body): ApiJson<OfferBody>,
) -> HandlerResult {
    let buyer_uid = body.buyer_uid.unwrap_or_else(|| actor.uid.clone());
    let offer = state
        .ledger
        .submit_offer(&bid_id, &buyer_uid, body.price_per_kg, body.qty, &actor)
        .await?;
    Ok(created(offer))
}

pub async fn withdraw_offer(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((bid_id, offer_id)): Path<(String, String)>,
) -> HandlerResult {
    let offer = state
        .ledger
        .withdraw_offer(&bid_id, &offer_id, &actor)
        .await?;
    Ok(ok(offer))
}

pub async fn bid_result(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(bid_id): Path<String>,
) -> HandlerResult {
    let result = state.lifecycle.bid_result(&bid_id, &actor).await?;
    Ok(ok(result))
}

pub async fn farmer_bids(State(state): State<AppState>, Actor(actor): Actor) -> HandlerResult {
    let bids = state.eligibility.visible_bids(&actor).await?;
    Ok(ok(bids))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!(error = %e, "Metrics render failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
        }
    }
}
