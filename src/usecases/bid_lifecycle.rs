//! Bid Lifecycle Manager - Staff Operations and Masked Reads
//!
//! Org-scoped operations (create, list, close, set winner, cancel) require
//! a principal that manages the owning cooperative. A bid that belongs to a
//! different cooperative is reported as not found rather than forbidden.
//!
//! Cross-org reads (`list_open_bids`, `bid_result`) only ever return the
//! masked projection.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::snapshot::sort_by_deadline;
use crate::domain::{
  Award, Bid, BidRequest, BidStatus, Commodity, MaskedBid, MaskedResult, Offer, OfferStatus,
  Principal, TradeError, TradeResult,
};
use crate::ports::{Audience, Clock, Notice, Notifier, TradeStore};
use crate::usecases::winner_resolution::{CloseOutcome, CloseTrigger, WinnerResolution};

/// Optional filters for `list_bids`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BidFilter {
  pub status: Option<BidStatus>,
  pub commodity: Option<Commodity>,
}

/// What `set_winner` did to the bid.
#[derive(Debug, Clone)]
pub enum WinnerUpdate {
  /// The bid was open and has just been closed.
  Closed(Bid),
  /// The bid was already closed; only its winner fields were rewritten.
  Corrected(Bid),
}

impl WinnerUpdate {
  pub const fn closed_now(&self) -> bool {
    matches!(self, Self::Closed(_))
  }

  pub fn into_bid(self) -> Bid {
    match self {
      Self::Closed(bid) | Self::Corrected(bid) => bid,
    }
  }
}

pub struct BidLifecycle {
  store: Arc<dyn TradeStore>,
  resolution: Arc<WinnerResolution>,
  notifier: Arc<dyn Notifier>,
  clock: Arc<dyn Clock>,
}

impl BidLifecycle {
  pub fn new(
    store: Arc<dyn TradeStore>,
    resolution: Arc<WinnerResolution>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      store,
      resolution,
      notifier,
      clock,
    }
  }

  /// Open a new bid for `org_id`.
  #[instrument(skip(self, request, actor), fields(actor = %actor.uid))]
  pub async fn create_bid(
    &self,
    org_id: &str,
    request: BidRequest,
    actor: &Principal,
  ) -> TradeResult<Bid> {
    actor.require_org_staff(org_id)?;

    let bid = Bid::open(org_id, request, &actor.uid, self.clock.now())?;
    self.store.insert_bid(&bid).await?;
    info!(
      bid_id = %bid.bid_id,
      commodity = %bid.commodity,
      qty = %bid.requested_qty,
      closes_at = %bid.closes_at,
      "Bid opened"
    );

    let audience = Audience::EligibleMembers {
      org_id: bid.org_id.clone(),
      commodity: bid.commodity,
      visibility: bid.visibility_mode,
    };
    let notice = Notice::BidOpened {
      bid_id: bid.bid_id.clone(),
      commodity: bid.commodity,
      closes_at: bid.closes_at,
    };
    if let Err(e) = self.notifier.notify(&audience, &notice).await {
      warn!(bid_id = %bid.bid_id, error = %e, "Bid opened notification failed");
    }

    Ok(bid)
  }

  /// Full bid as seen by the owning cooperative.
  pub async fn get_bid(&self, org_id: &str, bid_id: &str, actor: &Principal) -> TradeResult<Bid> {
    actor.require_org_staff(org_id)?;
    self.org_bid(org_id, bid_id).await
  }

  /// Bids of one cooperative, newest first.
  pub async fn list_bids(
    &self,
    org_id: &str,
    filter: BidFilter,
    actor: &Principal,
  ) -> TradeResult<Vec<Bid>> {
    actor.require_org_staff(org_id)?;

    let mut bids: Vec<Bid> = self
      .store
      .list_org_bids(org_id)
      .await?
      .into_iter()
      .filter(|b| filter.status.is_none_or(|s| b.status == s))
      .filter(|b| filter.commodity.is_none_or(|c| b.commodity == c))
      .collect();
    bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(bids)
  }

  /// Masked open bids across every cooperative, soonest deadline first.
  pub async fn list_open_bids(&self, commodity: Option<Commodity>) -> TradeResult<Vec<MaskedBid>> {
    let now = self.clock.now();
    let mut bids: Vec<MaskedBid> = self
      .store
      .list_bids_by_status(BidStatus::Open, commodity)
      .await?
      .iter()
      .filter(|b| b.accepts_offers_at(now))
      .map(MaskedBid::from)
      .collect();
    sort_by_deadline(&mut bids);
    Ok(bids)
  }

  /// Close an open bid, optionally naming the winner.
  #[instrument(skip(self, actor), fields(actor = %actor.uid))]
  pub async fn close_bid(
    &self,
    org_id: &str,
    bid_id: &str,
    winner_offer_id: Option<&str>,
    actor: &Principal,
  ) -> TradeResult<Bid> {
    actor.require_org_staff(org_id)?;
    self.org_bid(org_id, bid_id).await?;

    let CloseOutcome { bid, .. } = self
      .resolution
      .close(bid_id, winner_offer_id, CloseTrigger::Manual)
      .await?;
    Ok(bid)
  }

  /// Close an open bid, or correct the recorded winner of a closed one.
  ///
  /// A correction only rewrites the bid's winner fields. Offer statuses
  /// settled by the original close are left as they were.
  #[instrument(skip(self, actor), fields(actor = %actor.uid))]
  pub async fn set_winner(
    &self,
    org_id: &str,
    bid_id: &str,
    winner_offer_id: Option<&str>,
    actor: &Principal,
  ) -> TradeResult<WinnerUpdate> {
    actor.require_org_staff(org_id)?;
    let bid = self.org_bid(org_id, bid_id).await?;

    match bid.status {
      BidStatus::Open => {
        let outcome = self
          .resolution
          .close(bid_id, winner_offer_id, CloseTrigger::Manual)
          .await?;
        Ok(WinnerUpdate::Closed(outcome.bid))
      }
      BidStatus::Closed => {
        let offer_id = winner_offer_id.ok_or_else(|| {
          TradeError::Validation("winnerOfferId is required to correct a closed bid".into())
        })?;
        let offer = self
          .store
          .get_offer(bid_id, offer_id)
          .await?
          .ok_or_else(|| TradeError::NotFound(format!("offer {offer_id} on bid {bid_id}")))?;
        if offer.status == OfferStatus::Withdrawn {
          return Err(TradeError::Conflict(format!(
            "offer {offer_id} was withdrawn and cannot win"
          )));
        }

        let award = Award {
          offer_id: offer.offer_id,
          buyer_uid: offer.buyer_uid,
          price_per_kg: offer.price_per_kg,
        };
        let corrected = self
          .store
          .correct_winner(bid_id, &award, self.clock.now())
          .await?;
        warn!(
          bid_id,
          previous = ?bid.winning_offer_id,
          corrected = %award.offer_id,
          "Winner corrected on closed bid"
        );
        Ok(WinnerUpdate::Corrected(corrected))
      }
      BidStatus::Cancelled => Err(TradeError::Conflict(format!(
        "bid {bid_id} is cancelled"
      ))),
    }
  }

  /// Cancel an open bid. Its offers stay as they are.
  #[instrument(skip(self, actor), fields(actor = %actor.uid))]
  pub async fn cancel_bid(&self, org_id: &str, bid_id: &str, actor: &Principal) -> TradeResult<Bid> {
    actor.require_org_staff(org_id)?;
    self.org_bid(org_id, bid_id).await?;

    let cancelled = self.store.cancel_bid(bid_id, self.clock.now()).await?;
    info!(bid_id, "Bid cancelled");
    Ok(cancelled)
  }

  /// Every offer on a bid, identities included. Staff only.
  pub async fn list_offers_for_bid(
    &self,
    org_id: &str,
    bid_id: &str,
    actor: &Principal,
  ) -> TradeResult<Vec<Offer>> {
    actor.require_org_staff(org_id)?;
    self.org_bid(org_id, bid_id).await?;
    Ok(self.store.offers_for_bid(bid_id).await?.offers)
  }

  /// Masked outcome of a bid plus the caller's own latest offer status.
  pub async fn bid_result(&self, bid_id: &str, actor: &Principal) -> TradeResult<MaskedResult> {
    let bid = self
      .store
      .get_bid(bid_id)
      .await?
      .ok_or_else(|| TradeError::NotFound(format!("bid {bid_id}")))?;

    let set = self.store.offers_for_bid(bid_id).await?;
    let own = set
      .offers
      .iter()
      .filter(|o| o.buyer_uid == actor.uid)
      .max_by_key(|o| o.created_at);

    Ok(MaskedResult::new(&bid, own))
  }

  async fn org_bid(&self, org_id: &str, bid_id: &str) -> TradeResult<Bid> {
    match self.store.get_bid(bid_id).await? {
      Some(bid) if bid.org_id == org_id => Ok(bid),
      _ => Err(TradeError::NotFound(format!(
        "bid {bid_id} in org {org_id}"
      ))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, Utc};
  use rust_decimal_macros::dec;

  use crate::adapters::clock::ManualClock;
  use crate::adapters::notify::LogNotifier;
  use crate::adapters::persistence::MemoryTradeStore;
  use crate::domain::{Role, TransparencyMode};

  struct Fixture {
    lifecycle: BidLifecycle,
    store: Arc<MemoryTradeStore>,
    clock: Arc<ManualClock>,
  }

  fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryTradeStore::new());
    let notifier = Arc::new(LogNotifier);
    let resolution = Arc::new(WinnerResolution::new(
      store.clone(),
      notifier.clone(),
      clock.clone(),
    ));
    let lifecycle = BidLifecycle::new(store.clone(), resolution, notifier, clock.clone());
    Fixture {
      lifecycle,
      store,
      clock,
    }
  }

  fn staff(org: &str) -> Principal {
    Principal::new("staff-1", Role::OrgStaff, Some(org.into()))
  }

  fn request(commodity: &str, hours: i64, fx: &Fixture) -> BidRequest {
    BidRequest {
      commodity: commodity.into(),
      requested_qty: dec!(500),
      unit: "kg".into(),
      opens_at: None,
      closes_at: fx.clock.now() + Duration::hours(hours),
      visibility_mode: None,
      transparency_mode: None,
    }
  }

  #[tokio::test]
  async fn test_create_requires_org_staff() {
    let fx = fixture();
    let result = fx
      .lifecycle
      .create_bid("coop-a", request("kales", 2, &fx), &staff("coop-b"))
      .await;
    assert!(matches!(result, Err(TradeError::Authorization(_))));

    let farmer = Principal::new("f1", Role::Farmer, Some("coop-a".into()));
    let result = fx
      .lifecycle
      .create_bid("coop-a", request("kales", 2, &fx), &farmer)
      .await;
    assert!(matches!(result, Err(TradeError::Authorization(_))));
  }

  #[tokio::test]
  async fn test_create_rejects_invalid_input() {
    let fx = fixture();
    let bad = fx
      .lifecycle
      .create_bid("coop-a", request("maize", 2, &fx), &staff("coop-a"))
      .await;
    assert!(matches!(bad, Err(TradeError::Validation(_))));

    let past = fx
      .lifecycle
      .create_bid("coop-a", request("kales", -1, &fx), &staff("coop-a"))
      .await;
    assert!(matches!(past, Err(TradeError::Validation(_))));
  }

  #[tokio::test]
  async fn test_other_org_bid_is_not_found() {
    let fx = fixture();
    let bid = fx
      .lifecycle
      .create_bid("coop-a", request("kales", 2, &fx), &staff("coop-a"))
      .await
      .unwrap();

    let result = fx
      .lifecycle
      .get_bid("coop-b", &bid.bid_id, &staff("coop-b"))
      .await;
    assert!(matches!(result, Err(TradeError::NotFound(_))));
  }

  #[tokio::test]
  async fn test_list_bids_newest_first_with_filters() {
    let fx = fixture();
    let actor = staff("coop-a");
    let first = fx
      .lifecycle
      .create_bid("coop-a", request("kales", 2, &fx), &actor)
      .await
      .unwrap();
    fx.clock.advance(Duration::minutes(1));
    let second = fx
      .lifecycle
      .create_bid("coop-a", request("cabbage", 2, &fx), &actor)
      .await
      .unwrap();

    let all = fx
      .lifecycle
      .list_bids("coop-a", BidFilter::default(), &actor)
      .await
      .unwrap();
    let ids: Vec<_> = all.iter().map(|b| b.bid_id.clone()).collect();
    assert_eq!(ids, vec![second.bid_id.clone(), first.bid_id.clone()]);

    let kales = fx
      .lifecycle
      .list_bids(
        "coop-a",
        BidFilter {
          status: Some(BidStatus::Open),
          commodity: Some(Commodity::Kales),
        },
        &actor,
      )
      .await
      .unwrap();
    assert_eq!(kales.len(), 1);
    assert_eq!(kales[0].bid_id, first.bid_id);
  }

  #[tokio::test]
  async fn test_open_bids_are_masked_and_sorted_by_deadline() {
    let fx = fixture();
    let late = fx
      .lifecycle
      .create_bid("coop-a", request("kales", 5, &fx), &staff("coop-a"))
      .await
      .unwrap();
    let mut req = request("kales", 1, &fx);
    req.transparency_mode = Some(TransparencyMode::FullList);
    let soon = fx
      .lifecycle
      .create_bid("coop-b", req, &staff("coop-b"))
      .await
      .unwrap();

    let open = fx.lifecycle.list_open_bids(Some(Commodity::Kales)).await.unwrap();
    assert_eq!(open.len(), 2);
    assert_eq!(open[0].bid_id, soon.bid_id);
    assert_eq!(open[1].bid_id, late.bid_id);
    assert!(open[0].price_list.is_some());
    assert!(open[1].price_list.is_none());

    fx.clock.advance(Duration::hours(2));
    let open = fx.lifecycle.list_open_bids(None).await.unwrap();
    assert_eq!(open.len(), 1);
  }

  #[tokio::test]
  async fn test_cancel_then_close_conflicts() {
    let fx = fixture();
    let actor = staff("coop-a");
    let bid = fx
      .lifecycle
      .create_bid("coop-a", request("tomatoes", 2, &fx), &actor)
      .await
      .unwrap();

    let cancelled = fx
      .lifecycle
      .cancel_bid("coop-a", &bid.bid_id, &actor)
      .await
      .unwrap();
    assert_eq!(cancelled.status, BidStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let close = fx
      .lifecycle
      .close_bid("coop-a", &bid.bid_id, None, &actor)
      .await;
    assert!(matches!(close, Err(TradeError::Conflict(_))));
    let winner = fx
      .lifecycle
      .set_winner("coop-a", &bid.bid_id, None, &actor)
      .await;
    assert!(matches!(winner, Err(TradeError::Conflict(_))));
  }

  #[tokio::test]
  async fn test_set_winner_corrects_closed_bid() {
    let fx = fixture();
    let actor = staff("coop-a");
    let bid = fx
      .lifecycle
      .create_bid("coop-a", request("tomatoes", 2, &fx), &actor)
      .await
      .unwrap();
    let now = fx.clock.now();
    let low = Offer::submit(&bid.bid_id, "b-low", None, dec!(40), dec!(100), now).unwrap();
    let high = Offer::submit(&bid.bid_id, "b-high", None, dec!(55), dec!(100), now).unwrap();
    fx.store.insert_offer(&low).await.unwrap();
    fx.store.insert_offer(&high).await.unwrap();

    let closed = fx
      .lifecycle
      .close_bid("coop-a", &bid.bid_id, None, &actor)
      .await
      .unwrap();
    assert_eq!(closed.winning_buyer_uid.as_deref(), Some("b-high"));

    let missing_id = fx
      .lifecycle
      .set_winner("coop-a", &bid.bid_id, None, &actor)
      .await;
    assert!(matches!(missing_id, Err(TradeError::Validation(_))));

    let update = fx
      .lifecycle
      .set_winner("coop-a", &bid.bid_id, Some(&low.offer_id), &actor)
      .await
      .unwrap();
    assert!(!update.closed_now());
    let corrected = update.into_bid();
    assert_eq!(corrected.status, BidStatus::Closed);
    assert_eq!(corrected.winning_buyer_uid.as_deref(), Some("b-low"));
    assert_eq!(corrected.winning_price, Some(dec!(40)));
    assert_eq!(corrected.closed_at, closed.closed_at);
  }

  #[tokio::test]
  async fn test_set_winner_on_open_bid_closes_it() {
    let fx = fixture();
    let actor = staff("coop-a");
    let bid = fx
      .lifecycle
      .create_bid("coop-a", request("kales", 2, &fx), &actor)
      .await
      .unwrap();
    let now = fx.clock.now();
    let low = Offer::submit(&bid.bid_id, "b-low", None, dec!(40), dec!(100), now).unwrap();
    let high = Offer::submit(&bid.bid_id, "b-high", None, dec!(55), dec!(100), now).unwrap();
    fx.store.insert_offer(&low).await.unwrap();
    fx.store.insert_offer(&high).await.unwrap();

    let update = fx
      .lifecycle
      .set_winner("coop-a", &bid.bid_id, Some(&low.offer_id), &actor)
      .await
      .unwrap();
    assert!(update.closed_now());
    let closed = update.into_bid();
    assert_eq!(closed.status, BidStatus::Closed);
    assert_eq!(closed.winning_buyer_uid.as_deref(), Some("b-low"));
  }

  #[tokio::test]
  async fn test_bid_result_reports_own_offer_only() {
    let fx = fixture();
    let actor = staff("coop-a");
    let bid = fx
      .lifecycle
      .create_bid("coop-a", request("cabbage", 2, &fx), &actor)
      .await
      .unwrap();
    let now = fx.clock.now();
    for (buyer, price) in [("b1", dec!(20)), ("b2", dec!(25))] {
      let offer = Offer::submit(&bid.bid_id, buyer, None, price, dec!(10), now).unwrap();
      fx.store.insert_offer(&offer).await.unwrap();
    }
    fx.lifecycle
      .close_bid("coop-a", &bid.bid_id, None, &actor)
      .await
      .unwrap();

    let b1 = Principal::new("b1", Role::Buyer, None);
    let result = fx.lifecycle.bid_result(&bid.bid_id, &b1).await.unwrap();
    assert_eq!(result.winning_price, Some(dec!(25)));
    assert_eq!(result.your_offer_status, Some(OfferStatus::Lost));

    let json = serde_json::to_string(&result).unwrap();
    assert!(!json.contains("b2"));

    let stranger = Principal::new("b9", Role::Buyer, None);
    let result = fx.lifecycle.bid_result(&bid.bid_id, &stranger).await.unwrap();
    assert!(result.your_offer_status.is_none());
  }
}
