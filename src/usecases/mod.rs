//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the trade engine's workflows. Each use case is a self-contained
//! business operation.
//!
//! Use cases:
//! - `BidLifecycle`: Staff bid operations and masked reads
//! - `OfferLedger`: Offer submission, withdrawal, throttling
//! - `WinnerResolution`: Atomic bid close and winner selection
//! - `SnapshotProjector`: Derived bid aggregates
//! - `EligibilityResolver`: Farmer-visible bid feed
//! - `SchedulerSweep`: Periodic close of expired bids

pub mod bid_lifecycle;
pub mod eligibility;
pub mod offer_ledger;
pub mod scheduler_sweep;
pub mod snapshot_projector;
pub mod winner_resolution;

pub use bid_lifecycle::{BidFilter, BidLifecycle, WinnerUpdate};
pub use eligibility::EligibilityResolver;
pub use offer_ledger::{OfferLedger, OfferLedgerDeps};
pub use scheduler_sweep::{SchedulerSweep, SweepReport};
pub use snapshot_projector::SnapshotProjector;
pub use winner_resolution::{CloseOutcome, CloseTrigger, WinnerResolution};
