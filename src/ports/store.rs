//! Trade Store Port - Bid and Offer Persistence Interface
//!
//! Every write on this trait is conditional. The store checks its guard
//! (bid open, offer active, revision unchanged) and applies the change in
//! one atomic step, the way a document database transaction would. Use
//! cases never perform an unguarded read-modify-write.
//!
//! Each bid carries a `revision` counter that is bumped on every offer-set
//! mutation. Writers that derive data from an offer set (snapshots,
//! resolutions) pass the revision they read and the store refuses the
//! write if it moved.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
  Award, Bid, BidSnapshot, BidStatus, Commodity, Offer, ResolutionPlan, TradeResult,
};

/// Offer set of one bid plus the revision it was read at.
#[derive(Debug, Clone, Default)]
pub struct OfferSet {
  pub offers: Vec<Offer>,
  pub revision: u64,
}

/// Result of a guarded resolution commit.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
  /// The bid is now closed with the plan applied.
  Committed(Bid),
  /// The offer set changed since it was read; re-read and re-plan.
  StaleRevision,
}

/// Result of a guarded snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotWrite {
  Written,
  /// The offer set changed since it was read; re-read and re-project.
  StaleRevision,
  /// The bid is closed or cancelled and its snapshot no longer moves.
  Frozen,
}

#[async_trait]
pub trait TradeStore: Send + Sync + 'static {
  /// Insert a freshly opened bid. Conflict if the id is taken.
  async fn insert_bid(&self, bid: &Bid) -> TradeResult<()>;

  async fn get_bid(&self, bid_id: &str) -> TradeResult<Option<Bid>>;

  /// All bids owned by an organization, any status.
  async fn list_org_bids(&self, org_id: &str) -> TradeResult<Vec<Bid>>;

  /// Bids in `status`, optionally restricted to one commodity.
  async fn list_bids_by_status(
    &self,
    status: BidStatus,
    commodity: Option<Commodity>,
  ) -> TradeResult<Vec<Bid>>;

  /// Index query `(status = open, commodity)` with `closes_at <= now`.
  async fn expired_open_bids(
    &self,
    commodity: Commodity,
    now: DateTime<Utc>,
  ) -> TradeResult<Vec<Bid>>;

  /// open → cancelled. Conflict unless the bid is open.
  async fn cancel_bid(&self, bid_id: &str, now: DateTime<Utc>) -> TradeResult<Bid>;

  /// Insert an active offer.
  ///
  /// Guard: the parent bid exists, is open and not past `closes_at` at
  /// `offer.created_at`, and the buyer has no other active offer on it.
  /// Returns the new revision.
  async fn insert_offer(&self, offer: &Offer) -> TradeResult<u64>;

  async fn get_offer(&self, bid_id: &str, offer_id: &str) -> TradeResult<Option<Offer>>;

  /// active → withdrawn. Conflict unless the offer is active.
  async fn withdraw_offer(
    &self,
    bid_id: &str,
    offer_id: &str,
    now: DateTime<Utc>,
  ) -> TradeResult<Offer>;

  /// Offers of a bid in submission order, with the current revision.
  async fn offers_for_bid(&self, bid_id: &str) -> TradeResult<OfferSet>;

  /// Replace the snapshot of an open bid if the revision is unchanged.
  async fn write_snapshot(
    &self,
    bid_id: &str,
    snapshot: &BidSnapshot,
    revision: u64,
  ) -> TradeResult<SnapshotWrite>;

  /// Close the bid and settle its offers according to `plan`.
  ///
  /// Guard: bid open (Conflict otherwise) and revision unchanged
  /// (`StaleRevision` otherwise).
  async fn commit_resolution(
    &self,
    bid_id: &str,
    plan: &ResolutionPlan,
    revision: u64,
    now: DateTime<Utc>,
  ) -> TradeResult<CommitOutcome>;

  /// Rewrite the winner fields of a closed bid. Conflict unless closed.
  async fn correct_winner(
    &self,
    bid_id: &str,
    award: &Award,
    now: DateTime<Utc>,
  ) -> TradeResult<Bid>;

  /// Check if the store is reachable.
  async fn is_healthy(&self) -> bool;
}
