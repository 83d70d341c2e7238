//! Visibility & Eligibility Resolver - Farmer Bid Feed
//!
//! Membership is read from every configured `MembershipSource` at once and
//! the successful answers are unioned. A source that errors or answers
//! empty simply contributes nothing; the feed degrades instead of failing.
//!
//! Per bid:
//! - `all_members`: visible to any active member of the owning org
//! - `eligible_only`: visible only with a recorded contribution in the
//!   bid's commodity for that org

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use crate::domain::snapshot::sort_by_deadline;
use crate::domain::{
  Bid, Commodity, MaskedBid, OrgId, Principal, Role, TradeError, TradeResult, VisibilityMode,
};
use crate::ports::{Clock, ContributionHistory, MembershipSource, TradeStore};

/// Union the successful answers of several fallible lookups.
///
/// Each entry carries the source name for the log line emitted when it
/// failed. Failed entries contribute nothing.
pub fn union_successes<T: Ord>(
  results: impl IntoIterator<Item = (&'static str, anyhow::Result<Vec<T>>)>,
) -> BTreeSet<T> {
  let mut merged = BTreeSet::new();
  for (source, result) in results {
    match result {
      Ok(items) => merged.extend(items),
      Err(e) => warn!(source, error = %e, "Lookup source failed, skipping"),
    }
  }
  merged
}

pub struct EligibilityResolver {
  sources: Vec<Arc<dyn MembershipSource>>,
  contributions: Arc<dyn ContributionHistory>,
  store: Arc<dyn TradeStore>,
  clock: Arc<dyn Clock>,
}

impl EligibilityResolver {
  pub fn new(
    sources: Vec<Arc<dyn MembershipSource>>,
    contributions: Arc<dyn ContributionHistory>,
    store: Arc<dyn TradeStore>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      sources,
      contributions,
      store,
      clock,
    }
  }

  /// Organizations where `uid` is an active member, per any source.
  pub async fn member_orgs(&self, uid: &str) -> BTreeSet<OrgId> {
    let lookups = self.sources.iter().map(|source| async move {
      (source.name(), source.active_orgs(uid).await)
    });
    union_successes(join_all(lookups).await)
  }

  /// Open bids a farmer may see, masked, soonest deadline first.
  #[instrument(skip(self, actor), fields(actor = %actor.uid))]
  pub async fn visible_bids(&self, actor: &Principal) -> TradeResult<Vec<MaskedBid>> {
    match actor.role {
      Role::Farmer => {}
      Role::Buyer | Role::OrgStaff | Role::OrgAdmin | Role::SuperAdmin => {
        return Err(TradeError::Authorization(format!(
          "{} '{}' has no farmer bid feed",
          actor.role, actor.uid
        )));
      }
    }

    let orgs = self.member_orgs(&actor.uid).await;
    debug!(orgs = orgs.len(), "Resolved farmer memberships");

    let per_org = join_all(orgs.iter().map(|org| self.visible_in_org(org, &actor.uid))).await;

    let mut visible = Vec::new();
    for bids in per_org {
      visible.extend(bids?.iter().map(MaskedBid::from));
    }
    sort_by_deadline(&mut visible);
    Ok(visible)
  }

  async fn visible_in_org(&self, org_id: &str, uid: &str) -> TradeResult<Vec<Bid>> {
    let now = self.clock.now();
    let open: Vec<Bid> = self
      .store
      .list_org_bids(org_id)
      .await?
      .into_iter()
      .filter(|b| b.accepts_offers_at(now))
      .collect();

    let needs_history = open
      .iter()
      .any(|b| b.visibility_mode == VisibilityMode::EligibleOnly);
    let contributed: BTreeSet<Commodity> = if needs_history {
      union_successes([(
        "contribution_history",
        self.contributions.contributed_commodities(org_id, uid).await,
      )])
    } else {
      BTreeSet::new()
    };

    Ok(open
      .into_iter()
      .filter(|b| match b.visibility_mode {
        VisibilityMode::AllMembers => true,
        VisibilityMode::EligibleOnly => contributed.contains(&b.commodity),
      })
      .collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_union_skips_failures() {
    let merged = union_successes([
      ("mirror", Ok(vec!["coop-a".to_string(), "coop-b".to_string()])),
      ("index", Err(anyhow::anyhow!("index unavailable"))),
      ("extra", Ok(vec!["coop-b".to_string(), "coop-c".to_string()])),
    ]);
    let merged: Vec<_> = merged.into_iter().collect();
    assert_eq!(merged, vec!["coop-a", "coop-b", "coop-c"]);
  }

  #[test]
  fn test_union_of_nothing_is_empty() {
    let merged: BTreeSet<String> =
      union_successes([("mirror", Err(anyhow::anyhow!("down")))]);
    assert!(merged.is_empty());
  }
}
