//! Domain layer - Core trade entities and rules.
//!
//! Pure logic for bids, offers, principals, winner selection and the
//! masked read model. Nothing in here performs I/O (hexagonal inner ring);
//! persistence and collaborators are reached through `crate::ports`.

pub mod bid;
pub mod error;
pub mod offer;
pub mod principal;
pub mod resolution;
pub mod snapshot;

// Re-export core types for convenience
pub use bid::{
    Award, Bid, BidId, BidRequest, BidSnapshot, BidStatus, Commodity, TransparencyMode,
    VisibilityMode,
};
pub use error::{TradeError, TradeResult};
pub use offer::{Offer, OfferId, OfferStatus};
pub use principal::{OrgId, Principal, Role, Uid};
pub use resolution::{ResolutionPlan, WinnerSource, plan_resolution};
pub use snapshot::{MaskedBid, MaskedResult, project_snapshot};
