//! Scheduler Sweep - Force-close Expired Bids
//!
//! Sweep flow:
//! 1. For each commodity, query open bids whose deadline has passed
//! 2. Re-read each bid and skip it if it is no longer open
//! 3. Close it through winner resolution with no override
//! 4. Write one audit record per closed bid
//!
//! The sweep keeps no progress state. A bid left behind by a crash or a
//! failure is simply picked up again on the next tick, and a bid closed by
//! somebody else in the meantime is counted as skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::domain::{Bid, BidId, Commodity, Principal, TradeError};
use crate::ports::{AuditRecord, AuditSink, Clock, TradeStore};
use crate::usecases::winner_resolution::{CloseTrigger, WinnerResolution};

/// Audit action recorded for sweep closes.
pub const SWEEP_ACTION: &str = "scheduler.close_expired_bid";

/// Aggregated report from one sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
  /// Bids this sweep closed.
  pub closed: Vec<BidId>,
  /// Bids that were already closed or cancelled by the time we got to them.
  pub skipped: Vec<BidId>,
  /// Bids whose close failed; retried next tick.
  pub failed: Vec<BidId>,
  /// When the sweep started.
  pub started_at: Option<DateTime<Utc>>,
}

impl SweepReport {
  pub fn is_idle(&self) -> bool {
    self.closed.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
  }
}

pub struct SchedulerSweep {
  store: Arc<dyn TradeStore>,
  resolution: Arc<WinnerResolution>,
  audit: Arc<dyn AuditSink>,
  clock: Arc<dyn Clock>,
}

impl SchedulerSweep {
  pub fn new(
    store: Arc<dyn TradeStore>,
    resolution: Arc<WinnerResolution>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      store,
      resolution,
      audit,
      clock,
    }
  }

  /// Run one pass over every commodity.
  pub async fn sweep_once(&self) -> SweepReport {
    let started_at = self.clock.now();
    let mut report = SweepReport {
      started_at: Some(started_at),
      ..SweepReport::default()
    };

    for commodity in Commodity::ALL {
      let expired = match self.store.expired_open_bids(commodity, started_at).await {
        Ok(bids) => bids,
        Err(e) => {
          error!(%commodity, error = %e, "Expired bid query failed, skipping commodity");
          continue;
        }
      };

      for bid in expired {
        self.close_expired(&bid, &mut report).await;
      }
    }

    if !report.is_idle() {
      info!(
        closed = report.closed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Sweep complete"
      );
    }
    report
  }

  async fn close_expired(&self, candidate: &Bid, report: &mut SweepReport) {
    let bid_id = candidate.bid_id.clone();

    match self.store.get_bid(&bid_id).await {
      Ok(Some(current)) if current.is_expired_at(self.clock.now()) => {}
      Ok(_) => {
        report.skipped.push(bid_id);
        return;
      }
      Err(e) => {
        warn!(bid_id = %bid_id, error = %e, "Re-read before close failed");
        report.failed.push(bid_id);
        return;
      }
    }

    match self
      .resolution
      .close(&bid_id, None, CloseTrigger::Scheduler)
      .await
    {
      Ok(outcome) => {
        self.audit_close(&outcome.bid).await;
        report.closed.push(bid_id);
      }
      Err(TradeError::Conflict(reason)) => {
        info!(bid_id = %bid_id, reason = %reason, "Bid closed concurrently, skipping");
        report.skipped.push(bid_id);
      }
      Err(e) => {
        error!(bid_id = %bid_id, error = %e, "Sweep close failed");
        report.failed.push(bid_id);
      }
    }
  }

  async fn audit_close(&self, bid: &Bid) {
    let actor = Principal::scheduler();
    let record = AuditRecord {
      at: self.clock.now(),
      actor_uid: Some(actor.uid),
      actor_role: Some(actor.role.as_str().to_string()),
      action: SWEEP_ACTION.to_string(),
      org_id: Some(bid.org_id.clone()),
      bid_id: Some(bid.bid_id.clone()),
      offer_id: bid.winning_offer_id.clone(),
      status_code: 200,
    };
    if let Err(e) = self.audit.record(&record).await {
      warn!(bid_id = %bid.bid_id, error = %e, "Sweep audit write failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use rust_decimal_macros::dec;

  use crate::adapters::clock::ManualClock;
  use crate::adapters::notify::LogNotifier;
  use crate::adapters::persistence::{MemoryAuditSink, MemoryTradeStore};
  use crate::domain::principal::SCHEDULER_UID;
  use crate::domain::{BidRequest, BidStatus, Offer, Role};

  struct Fixture {
    sweep: SchedulerSweep,
    store: Arc<MemoryTradeStore>,
    audit: Arc<MemoryAuditSink>,
    clock: Arc<ManualClock>,
  }

  fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryTradeStore::new());
    let audit = Arc::new(MemoryAuditSink::default());
    let resolution = Arc::new(WinnerResolution::new(
      store.clone(),
      Arc::new(LogNotifier),
      clock.clone(),
    ));
    let sweep = SchedulerSweep::new(store.clone(), resolution, audit.clone(), clock.clone());
    Fixture {
      sweep,
      store,
      audit,
      clock,
    }
  }

  async fn open_bid(fx: &Fixture, commodity: &str, minutes: i64) -> Bid {
    let now = fx.clock.now();
    let bid = Bid::open(
      "coop-a",
      BidRequest {
        commodity: commodity.into(),
        requested_qty: dec!(100),
        unit: "kg".into(),
        opens_at: None,
        closes_at: now + Duration::minutes(minutes),
        visibility_mode: None,
        transparency_mode: None,
      },
      "staff",
      now,
    )
    .unwrap();
    fx.store.insert_bid(&bid).await.unwrap();
    bid
  }

  #[tokio::test]
  async fn test_sweep_closes_only_expired() {
    let fx = fixture();
    let expiring = open_bid(&fx, "kales", 5).await;
    let later = open_bid(&fx, "tomatoes", 120).await;
    let offer = Offer::submit(&expiring.bid_id, "b1", None, dec!(42), dec!(10), fx.clock.now())
      .unwrap();
    fx.store.insert_offer(&offer).await.unwrap();

    fx.clock.advance(Duration::minutes(10));
    let report = fx.sweep.sweep_once().await;
    assert_eq!(report.closed, vec![expiring.bid_id.clone()]);
    assert!(report.failed.is_empty());

    let closed = fx.store.get_bid(&expiring.bid_id).await.unwrap().unwrap();
    assert_eq!(closed.status, BidStatus::Closed);
    assert_eq!(closed.winning_price, Some(dec!(42)));
    let untouched = fx.store.get_bid(&later.bid_id).await.unwrap().unwrap();
    assert_eq!(untouched.status, BidStatus::Open);

    let records = fx.audit.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actor_uid.as_deref(), Some(SCHEDULER_UID));
    assert_eq!(records[0].actor_role.as_deref(), Some(Role::SuperAdmin.as_str()));
    assert_eq!(records[0].bid_id.as_deref(), Some(expiring.bid_id.as_str()));
  }

  #[tokio::test]
  async fn test_back_to_back_sweeps_close_once() {
    let fx = fixture();
    open_bid(&fx, "cabbage", 1).await;
    fx.clock.advance(Duration::minutes(2));

    let first = fx.sweep.sweep_once().await;
    let second = fx.sweep.sweep_once().await;
    assert_eq!(first.closed.len(), 1);
    assert!(second.is_idle());
    assert_eq!(fx.audit.records().await.len(), 1);
  }

  #[tokio::test]
  async fn test_concurrent_sweeps_close_once() {
    let fx = fixture();
    for _ in 0..3 {
      open_bid(&fx, "kales", 1).await;
    }
    fx.clock.advance(Duration::minutes(2));

    let (a, b) = tokio::join!(fx.sweep.sweep_once(), fx.sweep.sweep_once());
    assert_eq!(a.closed.len() + b.closed.len(), 3);
    assert!(a.failed.is_empty() && b.failed.is_empty());
    assert_eq!(fx.audit.records().await.len(), 3);
  }
}
