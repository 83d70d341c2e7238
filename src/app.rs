//! Service wiring shared by `main` and the integration tests.
//!
//! Builds every use case over one set of port implementations and hands
//! out the pieces the HTTP router and the sweep task need.

use std::sync::Arc;

use crate::adapters::http::{Admission, AppState};
use crate::adapters::metrics::MetricsRegistry;
use crate::config::AppConfig;
use crate::ports::{
  AuditSink, BuyerApproval, Clock, ContributionHistory, MembershipSource, Notifier,
  SubmissionThrottle, TradeStore,
};
use crate::usecases::{
  BidLifecycle, EligibilityResolver, OfferLedger, OfferLedgerDeps, SchedulerSweep,
  SnapshotProjector, WinnerResolution,
};

/// Port implementations the engine runs on.
pub struct Ports {
  pub store: Arc<dyn TradeStore>,
  pub throttle: Arc<dyn SubmissionThrottle>,
  pub approval: Arc<dyn BuyerApproval>,
  pub memberships: Vec<Arc<dyn MembershipSource>>,
  pub contributions: Arc<dyn ContributionHistory>,
  pub notifier: Arc<dyn Notifier>,
  pub audit: Arc<dyn AuditSink>,
  pub clock: Arc<dyn Clock>,
}

/// Fully wired services.
pub struct Services {
  pub state: AppState,
  pub sweep: Arc<SchedulerSweep>,
  pub store: Arc<dyn TradeStore>,
}

impl Services {
  pub fn wire(config: &AppConfig, ports: Ports, metrics: Arc<MetricsRegistry>) -> Self {
    let Ports {
      store,
      throttle,
      approval,
      memberships,
      contributions,
      notifier,
      audit,
      clock,
    } = ports;

    let resolution = Arc::new(WinnerResolution::new(
      store.clone(),
      notifier.clone(),
      clock.clone(),
    ));
    let projector = Arc::new(SnapshotProjector::new(store.clone()));

    let lifecycle = Arc::new(BidLifecycle::new(
      store.clone(),
      resolution.clone(),
      notifier.clone(),
      clock.clone(),
    ));
    let ledger = Arc::new(OfferLedger::new(
      OfferLedgerDeps {
        store: store.clone(),
        throttle,
        approval,
        notifier,
        clock: clock.clone(),
      },
      projector,
      config.trade.submission_quota(),
    ));
    let eligibility = Arc::new(EligibilityResolver::new(
      memberships,
      contributions,
      store.clone(),
      clock.clone(),
    ));
    let sweep = Arc::new(SchedulerSweep::new(
      store.clone(),
      resolution,
      audit.clone(),
      clock.clone(),
    ));

    let state = AppState {
      lifecycle,
      ledger,
      eligibility,
      audit,
      metrics,
      admission: Arc::new(Admission::new(&config.admission)),
      clock,
    };

    Self {
      state,
      sweep,
      store,
    }
  }
}
