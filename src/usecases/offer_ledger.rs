//! Offer Ledger - Buyer Offer Submission and Withdrawal
//!
//! Submission checks, in order:
//! - Caller may offer as this buyer, amounts are positive
//! - Buyer passes the external approval check
//! - Bid exists, is open and its deadline has not passed
//! - Sliding-window throttle per (buyer, bid)
//! - No other active offer for (buyer, bid), enforced by the store's
//!   conditional insert
//!
//! Every successful mutation refreshes the bid snapshot.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Offer, Principal, TradeError, TradeResult};
use crate::ports::{
  Audience, BuyerApproval, Clock, Notice, Notifier, SubmissionThrottle, ThrottleDecision,
  ThrottleQuota, TradeStore,
};
use crate::usecases::snapshot_projector::SnapshotProjector;

/// Collaborators of the offer ledger.
pub struct OfferLedgerDeps {
  pub store: Arc<dyn TradeStore>,
  pub throttle: Arc<dyn SubmissionThrottle>,
  pub approval: Arc<dyn BuyerApproval>,
  pub notifier: Arc<dyn Notifier>,
  pub clock: Arc<dyn Clock>,
}

pub struct OfferLedger {
  store: Arc<dyn TradeStore>,
  throttle: Arc<dyn SubmissionThrottle>,
  approval: Arc<dyn BuyerApproval>,
  notifier: Arc<dyn Notifier>,
  clock: Arc<dyn Clock>,
  projector: Arc<SnapshotProjector>,
  quota: ThrottleQuota,
}

impl OfferLedger {
  pub fn new(deps: OfferLedgerDeps, projector: Arc<SnapshotProjector>, quota: ThrottleQuota) -> Self {
    Self {
      store: deps.store,
      throttle: deps.throttle,
      approval: deps.approval,
      notifier: deps.notifier,
      clock: deps.clock,
      projector,
      quota,
    }
  }

  /// Submit a new active offer for `buyer_uid` on `bid_id`.
  #[instrument(skip(self, actor), fields(actor = %actor.uid))]
  pub async fn submit_offer(
    &self,
    bid_id: &str,
    buyer_uid: &str,
    price_per_kg: Decimal,
    qty: Decimal,
    actor: &Principal,
  ) -> TradeResult<Offer> {
    if !actor.can_offer_as(buyer_uid) {
      return Err(TradeError::Authorization(format!(
        "{} '{}' cannot submit offers as '{buyer_uid}'",
        actor.role, actor.uid
      )));
    }

    let now = self.clock.now();
    let buyer_org = if actor.uid == buyer_uid {
      actor.org_id.clone()
    } else {
      None
    };
    let offer = Offer::submit(bid_id, buyer_uid, buyer_org, price_per_kg, qty, now)?;

    let approved = self
      .approval
      .is_approved(buyer_uid)
      .await
      .map_err(|e| TradeError::dependency("buyer approval lookup", &e))?;
    if !approved {
      return Err(TradeError::Authorization(format!(
        "buyer '{buyer_uid}' is not approved for trading"
      )));
    }

    let bid = self
      .store
      .get_bid(bid_id)
      .await?
      .ok_or_else(|| TradeError::NotFound(format!("bid {bid_id}")))?;
    bid.require_open()?;
    if !bid.accepts_offers_at(now) {
      return Err(TradeError::Conflict(format!(
        "bid {bid_id} stopped accepting offers at {}",
        bid.closes_at
      )));
    }

    let key = throttle_key(buyer_uid, bid_id);
    match self
      .throttle
      .hit(&key, self.quota, now)
      .await
      .map_err(|e| TradeError::dependency("submission throttle", &e))?
    {
      ThrottleDecision::Allowed { remaining } => {
        debug!(key = %key, remaining, "Submission within throttle window");
      }
      ThrottleDecision::Limited => {
        warn!(bid_id, buyer_uid, "Offer submission throttled");
        return Err(TradeError::RateLimited {
          limit: self.quota.limit,
          window_secs: self.quota.window.as_secs(),
        });
      }
    }

    let revision = self.store.insert_offer(&offer).await?;
    info!(
      bid_id,
      offer_id = %offer.offer_id,
      price = %offer.price_per_kg,
      qty = %offer.qty,
      revision,
      "Offer submitted"
    );

    self.projector.refresh_best_effort(bid_id).await;

    let audience = Audience::OrgStaff {
      org_id: bid.org_id.clone(),
    };
    let notice = Notice::OfferReceived {
      bid_id: bid.bid_id.clone(),
      commodity: bid.commodity,
      price_per_kg: offer.price_per_kg,
    };
    if let Err(e) = self.notifier.notify(&audience, &notice).await {
      warn!(bid_id, error = %e, "Offer notification failed");
    }

    Ok(offer)
  }

  /// Withdraw an active offer. Owner or superadmin only.
  #[instrument(skip(self, actor), fields(actor = %actor.uid))]
  pub async fn withdraw_offer(
    &self,
    bid_id: &str,
    offer_id: &str,
    actor: &Principal,
  ) -> TradeResult<Offer> {
    let offer = self
      .store
      .get_offer(bid_id, offer_id)
      .await?
      .ok_or_else(|| TradeError::NotFound(format!("offer {offer_id} on bid {bid_id}")))?;

    if !actor.can_withdraw(&offer.buyer_uid) {
      return Err(TradeError::Authorization(format!(
        "{} '{}' cannot withdraw offer {offer_id}",
        actor.role, actor.uid
      )));
    }
    if !offer.is_active() {
      return Err(TradeError::Conflict(format!(
        "offer {offer_id} is {:?}, only active offers can be withdrawn",
        offer.status
      )));
    }

    let withdrawn = self
      .store
      .withdraw_offer(bid_id, offer_id, self.clock.now())
      .await?;
    info!(bid_id, offer_id, "Offer withdrawn");

    self.projector.refresh_best_effort(bid_id).await;
    Ok(withdrawn)
  }

  /// All offers of a bid in submission order. Internal and staff views only.
  pub async fn list_offers_for_bid(&self, bid_id: &str) -> TradeResult<Vec<Offer>> {
    Ok(self.store.offers_for_bid(bid_id).await?.offers)
  }
}

fn throttle_key(buyer_uid: &str, bid_id: &str) -> String {
  format!("offer-submit:{buyer_uid}:{bid_id}")
}
