//! In-memory Trade Store - Conditional Writes Behind One Lock
//!
//! Implements `TradeStore` over a `tokio::sync::RwLock`. Every conditional
//! write takes the write lock, re-checks its guard against current state
//! and applies the whole change before releasing it, which is exactly the
//! transactional read-modify-write the port promises.
//!
//! Offers are kept per bid in submission order, which is the listing order
//! winner resolution relies on for equal prices.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{
    Award, Bid, BidId, BidSnapshot, BidStatus, Commodity, Offer, ResolutionPlan, TradeError,
    TradeResult,
};
use crate::ports::{CommitOutcome, OfferSet, SnapshotWrite, TradeStore};

/// Serializable image of the store, used by the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreImage {
    pub bids: Vec<Bid>,
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone)]
struct BidEntry {
    bid: Bid,
    offers: Vec<Offer>,
    revision: u64,
}

impl BidEntry {
    fn new(bid: Bid) -> Self {
        Self {
            bid,
            offers: Vec::new(),
            revision: 0,
        }
    }

    fn offer_mut(&mut self, offer_id: &str) -> TradeResult<&mut Offer> {
        let bid_id = &self.bid.bid_id;
        self.offers
            .iter_mut()
            .find(|o| o.offer_id == offer_id)
            .ok_or_else(|| TradeError::NotFound(format!("offer {offer_id} on bid {bid_id}")))
    }
}

/// Process-local trade store.
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    entries: RwLock<HashMap<BidId, BidEntry>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out every bid and offer.
    pub async fn export(&self) -> StoreImage {
        let entries = self.entries.read().await;
        let mut image = StoreImage::default();
        for entry in entries.values() {
            image.bids.push(entry.bid.clone());
            image.offers.extend(entry.offers.iter().cloned());
        }
        image.bids.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        image
    }

    /// Replace the store contents with a previously exported image.
    ///
    /// Offers whose bid is missing from the image are dropped.
    pub async fn restore(&self, image: StoreImage) {
        let mut restored: HashMap<BidId, BidEntry> = image
            .bids
            .into_iter()
            .map(|bid| (bid.bid_id.clone(), BidEntry::new(bid)))
            .collect();

        let mut orphans = 0_usize;
        for offer in image.offers {
            match restored.get_mut(&offer.bid_id) {
                Some(entry) => entry.offers.push(offer),
                None => orphans += 1,
            }
        }
        for entry in restored.values_mut() {
            entry.offers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        }

        info!(bids = restored.len(), orphans, "Trade store restored");
        *self.entries.write().await = restored;
    }
}

fn missing_bid(bid_id: &str) -> TradeError {
    TradeError::NotFound(format!("bid {bid_id}"))
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn insert_bid(&self, bid: &Bid) -> TradeResult<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&bid.bid_id) {
            return Err(TradeError::Conflict(format!(
                "bid {} already exists",
                bid.bid_id
            )));
        }
        entries.insert(bid.bid_id.clone(), BidEntry::new(bid.clone()));
        Ok(())
    }

    async fn get_bid(&self, bid_id: &str) -> TradeResult<Option<Bid>> {
        Ok(self.entries.read().await.get(bid_id).map(|e| e.bid.clone()))
    }

    async fn list_org_bids(&self, org_id: &str) -> TradeResult<Vec<Bid>> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.bid.org_id == org_id)
            .map(|e| e.bid.clone())
            .collect())
    }

    async fn list_bids_by_status(
        &self,
        status: BidStatus,
        commodity: Option<Commodity>,
    ) -> TradeResult<Vec<Bid>> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.bid.status == status)
            .filter(|e| commodity.is_none_or(|c| e.bid.commodity == c))
            .map(|e| e.bid.clone())
            .collect())
    }

    async fn expired_open_bids(
        &self,
        commodity: Commodity,
        now: DateTime<Utc>,
    ) -> TradeResult<Vec<Bid>> {
        let mut expired: Vec<Bid> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.bid.commodity == commodity && e.bid.is_expired_at(now))
            .map(|e| e.bid.clone())
            .collect();
        expired.sort_by(|a, b| a.closes_at.cmp(&b.closes_at));
        Ok(expired)
    }

    async fn cancel_bid(&self, bid_id: &str, now: DateTime<Utc>) -> TradeResult<Bid> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(bid_id).ok_or_else(|| missing_bid(bid_id))?;
        entry.bid.cancel(now)?;
        Ok(entry.bid.clone())
    }

    async fn insert_offer(&self, offer: &Offer) -> TradeResult<u64> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&offer.bid_id)
            .ok_or_else(|| missing_bid(&offer.bid_id))?;

        entry.bid.require_open()?;
        if !entry.bid.accepts_offers_at(offer.created_at) {
            return Err(TradeError::Conflict(format!(
                "bid {} closed for offers at {}",
                entry.bid.bid_id, entry.bid.closes_at
            )));
        }
        if entry
            .offers
            .iter()
            .any(|o| o.is_active() && o.buyer_uid == offer.buyer_uid)
        {
            return Err(TradeError::Conflict(format!(
                "buyer {} already has an active offer on bid {}",
                offer.buyer_uid, offer.bid_id
            )));
        }

        entry.offers.push(offer.clone());
        entry.revision += 1;
        Ok(entry.revision)
    }

    async fn get_offer(&self, bid_id: &str, offer_id: &str) -> TradeResult<Option<Offer>> {
        Ok(self.entries.read().await.get(bid_id).and_then(|e| {
            e.offers
                .iter()
                .find(|o| o.offer_id == offer_id)
                .cloned()
        }))
    }

    async fn withdraw_offer(
        &self,
        bid_id: &str,
        offer_id: &str,
        now: DateTime<Utc>,
    ) -> TradeResult<Offer> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(bid_id).ok_or_else(|| missing_bid(bid_id))?;

        let offer = entry.offer_mut(offer_id)?;
        offer.withdraw(now)?;
        let withdrawn = offer.clone();

        entry.revision += 1;
        Ok(withdrawn)
    }

    async fn offers_for_bid(&self, bid_id: &str) -> TradeResult<OfferSet> {
        let entries = self.entries.read().await;
        let entry = entries.get(bid_id).ok_or_else(|| missing_bid(bid_id))?;
        Ok(OfferSet {
            offers: entry.offers.clone(),
            revision: entry.revision,
        })
    }

    async fn write_snapshot(
        &self,
        bid_id: &str,
        snapshot: &BidSnapshot,
        revision: u64,
    ) -> TradeResult<SnapshotWrite> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(bid_id).ok_or_else(|| missing_bid(bid_id))?;
        if entry.bid.status != BidStatus::Open {
            return Ok(SnapshotWrite::Frozen);
        }
        if entry.revision != revision {
            return Ok(SnapshotWrite::StaleRevision);
        }
        entry.bid.snapshot = snapshot.clone();
        Ok(SnapshotWrite::Written)
    }

    async fn commit_resolution(
        &self,
        bid_id: &str,
        plan: &ResolutionPlan,
        revision: u64,
        now: DateTime<Utc>,
    ) -> TradeResult<CommitOutcome> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(bid_id).ok_or_else(|| missing_bid(bid_id))?;

        entry.bid.require_open()?;
        if entry.revision != revision {
            debug!(bid_id, expected = revision, actual = entry.revision, "Stale resolution");
            return Ok(CommitOutcome::StaleRevision);
        }

        // Stage on copies so a rejected transition leaves nothing half-applied.
        let mut offers = entry.offers.clone();
        for offer in &mut offers {
            if let Some(target) = plan.target_status(offer) {
                offer.settle(target, now)?;
            }
        }
        let mut bid = entry.bid.clone();
        bid.close(plan.award.as_ref(), now)?;

        entry.offers = offers;
        entry.bid = bid;
        entry.revision += 1;
        Ok(CommitOutcome::Committed(entry.bid.clone()))
    }

    async fn correct_winner(
        &self,
        bid_id: &str,
        award: &Award,
        now: DateTime<Utc>,
    ) -> TradeResult<Bid> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(bid_id).ok_or_else(|| missing_bid(bid_id))?;
        entry.bid.correct_award(award, now)?;
        Ok(entry.bid.clone())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
