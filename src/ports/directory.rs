//! Directory Ports - Read-only Membership and Approval Collaborators
//!
//! Membership is recorded twice upstream: a per-user mirror and a per-org
//! member index. The two can disagree and either can be unavailable, so
//! each is a separate `MembershipSource` and callers merge them.

use async_trait::async_trait;

use crate::domain::{Commodity, OrgId};

/// One independently queried view of "which orgs is this user a member of".
#[async_trait]
pub trait MembershipSource: Send + Sync + 'static {
  /// Source name for logs.
  fn name(&self) -> &'static str;

  /// Organizations where `uid` is an active member.
  async fn active_orgs(&self, uid: &str) -> anyhow::Result<Vec<OrgId>>;
}

/// Historical produce contributions per (org, member, commodity).
#[async_trait]
pub trait ContributionHistory: Send + Sync + 'static {
  /// Commodities `uid` has a recorded contribution for within `org_id`.
  async fn contributed_commodities(
    &self,
    org_id: &str,
    uid: &str,
  ) -> anyhow::Result<Vec<Commodity>>;
}

/// Buyer onboarding / approval registry.
#[async_trait]
pub trait BuyerApproval: Send + Sync + 'static {
  async fn is_approved(&self, buyer_uid: &str) -> anyhow::Result<bool>;
}
