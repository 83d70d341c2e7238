//! Winner Resolution Engine - Atomic Bid Close
//!
//! Close flow:
//! 1. Read the bid and reject anything that is not open
//! 2. Read the offer set and plan the winner
//! 3. Commit through the store, guarded by "still open" and the revision
//! 4. Only after a successful commit, notify buyers and the cooperative
//!
//! The open-status guard inside the commit is the only thing that makes
//! manual closes and the sweep safe against each other. There is no lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{Bid, Offer, ResolutionPlan, TradeError, TradeResult, WinnerSource, plan_resolution};
use crate::ports::{Audience, Clock, CommitOutcome, Notice, Notifier, TradeStore};

/// Commit attempts against a moving offer set before giving up.
const MAX_ATTEMPTS: usize = 5;

/// What initiated a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
  /// Staff called close / set-winner.
  Manual,
  /// The periodic sweep found the bid past its deadline.
  Scheduler,
}

impl CloseTrigger {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Manual => "manual",
      Self::Scheduler => "scheduler",
    }
  }
}

/// Result of a successful close.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
  pub bid: Bid,
  pub plan: ResolutionPlan,
}

pub struct WinnerResolution {
  store: Arc<dyn TradeStore>,
  notifier: Arc<dyn Notifier>,
  clock: Arc<dyn Clock>,
}

impl WinnerResolution {
  pub fn new(
    store: Arc<dyn TradeStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      store,
      notifier,
      clock,
    }
  }

  /// Resolve and close an open bid.
  ///
  /// # Errors
  /// `NotFound` for an unknown bid, `Conflict` if the bid is not open
  /// (including losing a race to another close).
  #[instrument(skip(self))]
  pub async fn close(
    &self,
    bid_id: &str,
    winner_override: Option<&str>,
    trigger: CloseTrigger,
  ) -> TradeResult<CloseOutcome> {
    for attempt in 1..=MAX_ATTEMPTS {
      let bid = self
        .store
        .get_bid(bid_id)
        .await?
        .ok_or_else(|| TradeError::NotFound(format!("bid {bid_id}")))?;
      bid.require_open()?;

      let set = self.store.offers_for_bid(bid_id).await?;
      let plan = plan_resolution(&set.offers, winner_override);

      if plan.override_ignored {
        warn!(
          bid_id,
          winner_override = ?winner_override,
          "Override does not name an eligible offer, using best price"
        );
      }
      if plan.tied_at_top {
        warn!(bid_id, "Top price is tied, winner follows submission order");
      }

      let now = self.clock.now();
      match self
        .store
        .commit_resolution(bid_id, &plan, set.revision, now)
        .await?
      {
        CommitOutcome::Committed(closed) => {
          info!(
            bid_id,
            winner = ?plan.award.as_ref().map(|a| &a.offer_id),
            price = ?plan.award.as_ref().map(|a| a.price_per_kg),
            losers = plan.losers.len(),
            source = ?plan.source,
            trigger = trigger.as_str(),
            "Bid closed"
          );
          self.announce(&closed, &plan, &set.offers).await;
          return Ok(CloseOutcome { bid: closed, plan });
        }
        CommitOutcome::StaleRevision => {
          info!(bid_id, attempt, "Offer set changed before commit, re-planning");
        }
      }
    }

    Err(TradeError::Conflict(format!(
      "bid {bid_id} offer set kept changing during close"
    )))
  }

  /// Fire post-commit notices. Failures are logged and never retried.
  async fn announce(&self, bid: &Bid, plan: &ResolutionPlan, offers: &[Offer]) {
    if let Some(award) = &plan.award {
      self
        .send(
          Audience::Users {
            uids: vec![award.buyer_uid.clone()],
          },
          Notice::OfferWon {
            bid_id: bid.bid_id.clone(),
            price_per_kg: award.price_per_kg,
          },
        )
        .await;
    }

    let losing_buyers: BTreeSet<_> = offers
      .iter()
      .filter(|o| plan.losers.contains(&o.offer_id))
      .map(|o| o.buyer_uid.clone())
      .filter(|uid| plan.award.as_ref().is_none_or(|a| &a.buyer_uid != uid))
      .collect();
    if !losing_buyers.is_empty() {
      self
        .send(
          Audience::Users {
            uids: losing_buyers.into_iter().collect(),
          },
          Notice::OfferLost {
            bid_id: bid.bid_id.clone(),
          },
        )
        .await;
    }

    self
      .send(
        Audience::OrgStaff {
          org_id: bid.org_id.clone(),
        },
        Notice::BidClosed {
          bid_id: bid.bid_id.clone(),
          winning_price: bid.winning_price,
        },
      )
      .await;

    if plan.source == WinnerSource::NoEligibleOffers {
      info!(bid_id = %bid.bid_id, "Bid closed without eligible offers");
    }
  }

  async fn send(&self, audience: Audience, notice: Notice) {
    if let Err(e) = self.notifier.notify(&audience, &notice).await {
      warn!(error = %e, ?notice, "Close notification failed");
    }
  }
}
