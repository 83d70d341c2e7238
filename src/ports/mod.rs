//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use case layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `TradeStore`: Bid/offer persistence with conditional writes
//! - `SubmissionThrottle`: Shared sliding-window counter
//! - `MembershipSource`, `ContributionHistory`, `BuyerApproval`: Directory lookups
//! - `Notifier`, `AuditSink`: Best-effort side effects
//! - `Clock`: Wall clock

pub mod clock;
pub mod directory;
pub mod notifier;
pub mod store;
pub mod throttle;

pub use clock::Clock;
pub use directory::{BuyerApproval, ContributionHistory, MembershipSource};
pub use notifier::{AuditRecord, AuditSink, Audience, Notice, Notifier};
pub use store::{CommitOutcome, OfferSet, SnapshotWrite, TradeStore};
pub use throttle::{SubmissionThrottle, ThrottleDecision, ThrottleQuota};
