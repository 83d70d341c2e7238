//! Snapshot Projector - Derived Bid Aggregates
//!
//! Recomputes `Bid::snapshot` from the live offer set after every offer
//! mutation. The write is guarded by the offer-set revision, so two
//! concurrent refreshes cannot leave an older projection on top of a
//! newer one; a refresh that loses the race re-reads and retries. Once a
//! bid is closed or cancelled its snapshot is frozen and refreshes stop.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::{BidSnapshot, TradeResult, project_snapshot};
use crate::ports::{SnapshotWrite, TradeStore};

/// Attempts before a refresh gives up to a newer writer.
const MAX_ATTEMPTS: usize = 5;

pub struct SnapshotProjector {
  store: Arc<dyn TradeStore>,
}

impl SnapshotProjector {
  pub fn new(store: Arc<dyn TradeStore>) -> Self {
    Self { store }
  }

  /// Recompute and store the snapshot of `bid_id`.
  ///
  /// Returns the snapshot written, or `None` if the bid is no longer open
  /// or every attempt lost the race to a concurrent mutation (whose own
  /// refresh will land later).
  #[instrument(skip(self))]
  pub async fn refresh(&self, bid_id: &str) -> TradeResult<Option<BidSnapshot>> {
    for attempt in 1..=MAX_ATTEMPTS {
      let set = self.store.offers_for_bid(bid_id).await?;
      let snapshot = project_snapshot(&set.offers);

      match self
        .store
        .write_snapshot(bid_id, &snapshot, set.revision)
        .await?
      {
        SnapshotWrite::Written => {
          debug!(
            bid_id,
            revision = set.revision,
            bidders = snapshot.bidder_count,
            "Snapshot refreshed"
          );
          return Ok(Some(snapshot));
        }
        SnapshotWrite::Frozen => {
          debug!(bid_id, "Bid no longer open, snapshot left as frozen");
          return Ok(None);
        }
        SnapshotWrite::StaleRevision => {
          debug!(bid_id, attempt, "Offer set moved during projection, retrying");
        }
      }
    }

    warn!(bid_id, attempts = MAX_ATTEMPTS, "Snapshot refresh abandoned");
    Ok(None)
  }

  /// Refresh, logging instead of propagating failures.
  ///
  /// The snapshot is derived data; a failed refresh must not fail the
  /// offer mutation that triggered it.
  pub async fn refresh_best_effort(&self, bid_id: &str) {
    if let Err(e) = self.refresh(bid_id).await {
      warn!(bid_id, error = %e, "Snapshot refresh failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::clock::ManualClock;
  use crate::adapters::notify::LogNotifier;
  use crate::adapters::persistence::MemoryTradeStore;
  use crate::usecases::winner_resolution::{CloseTrigger, WinnerResolution};
  use crate::domain::{Bid, BidRequest, Offer};
  use crate::ports::Clock;
  use chrono::{Duration, Utc};
  use rust_decimal_macros::dec;

  #[tokio::test]
  async fn test_refresh_writes_projection() {
    let store = Arc::new(MemoryTradeStore::new());
    let now = Utc::now();
    let bid = Bid::open(
      "coop-a",
      BidRequest {
        commodity: "cabbage".into(),
        requested_qty: dec!(200),
        unit: "kg".into(),
        opens_at: None,
        closes_at: now + Duration::hours(2),
        visibility_mode: None,
        transparency_mode: None,
      },
      "staff",
      now,
    )
    .unwrap();
    store.insert_bid(&bid).await.unwrap();

    for (buyer, price) in [("b1", dec!(30)), ("b2", dec!(45))] {
      let offer = Offer::submit(&bid.bid_id, buyer, None, price, dec!(50), now).unwrap();
      store.insert_offer(&offer).await.unwrap();
    }

    let projector = SnapshotProjector::new(store.clone());
    let snap = projector.refresh(&bid.bid_id).await.unwrap().unwrap();
    assert_eq!(snap.bidder_count, 2);
    assert_eq!(snap.top_price, Some(dec!(45)));

    let stored = store.get_bid(&bid.bid_id).await.unwrap().unwrap();
    assert_eq!(stored.snapshot, snap);
  }

  #[tokio::test]
  async fn test_late_refresh_leaves_closed_snapshot_alone() {
    let store = Arc::new(MemoryTradeStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let now = clock.now();
    let bid = Bid::open(
      "coop-a",
      BidRequest {
        commodity: "kales".into(),
        requested_qty: dec!(100),
        unit: "kg".into(),
        opens_at: None,
        closes_at: now + Duration::hours(1),
        visibility_mode: None,
        transparency_mode: None,
      },
      "staff",
      now,
    )
    .unwrap();
    store.insert_bid(&bid).await.unwrap();

    let projector = SnapshotProjector::new(store.clone());
    for (buyer, price) in [("a", dec!(90)), ("b", dec!(120))] {
      let offer = Offer::submit(&bid.bid_id, buyer, None, price, dec!(10), now).unwrap();
      store.insert_offer(&offer).await.unwrap();
      projector.refresh(&bid.bid_id).await.unwrap();
    }
    // Third offer lands but its refresh only runs after the close.
    let late = Offer::submit(&bid.bid_id, "c", None, dec!(80), dec!(10), now).unwrap();
    store.insert_offer(&late).await.unwrap();

    let resolution = WinnerResolution::new(store.clone(), Arc::new(LogNotifier), clock.clone());
    let outcome = resolution
      .close(&bid.bid_id, None, CloseTrigger::Manual)
      .await
      .unwrap();
    let frozen = outcome.bid.snapshot.clone();
    assert_eq!(frozen.bidder_count, 2);

    assert!(projector.refresh(&bid.bid_id).await.unwrap().is_none());
    let stored = store.get_bid(&bid.bid_id).await.unwrap().unwrap();
    assert_eq!(stored.snapshot, frozen);
    assert_eq!(stored.snapshot.top_price_list, vec![dec!(120), dec!(90)]);
  }
}
