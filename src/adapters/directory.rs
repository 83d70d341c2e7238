//! Seeded Directory - Memberships, Contributions and Buyer Approvals
//!
//! Serves the read-only directory ports from a JSON seed file:
//!
//! ```json
//! {
//!   "userMemberships": { "farmer-1": [{ "orgId": "coop-a", "active": true }] },
//!   "orgMembers": { "coop-a": ["farmer-1"] },
//!   "contributions": [{ "orgId": "coop-a", "uid": "farmer-1", "commodity": "kales" }],
//!   "approvedBuyers": ["buyer-1"]
//! }
//! ```
//!
//! The per-user mirror and the per-org index are exposed as two separate
//! `MembershipSource`s, just like the two upstream records they stand in for.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::domain::{Commodity, OrgId, Uid};
use crate::ports::{BuyerApproval, ContributionHistory, MembershipSource};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipEntry {
    pub org_id: OrgId,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionEntry {
    pub org_id: OrgId,
    pub uid: Uid,
    pub commodity: Commodity,
}

/// Parsed seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySeed {
    #[serde(default)]
    pub user_memberships: HashMap<Uid, Vec<MembershipEntry>>,
    #[serde(default)]
    pub org_members: HashMap<OrgId, Vec<Uid>>,
    #[serde(default)]
    pub contributions: Vec<ContributionEntry>,
    #[serde(default)]
    pub approved_buyers: BTreeSet<Uid>,
}

/// Directory backed by an in-memory seed.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    seed: Arc<DirectorySeed>,
}

impl StaticDirectory {
    pub fn from_seed(seed: DirectorySeed) -> Self {
        Self {
            seed: Arc::new(seed),
        }
    }

    /// Load the seed from a JSON file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(Path::new(path))
            .await
            .with_context(|| format!("Failed to read directory seed: {path}"))?;
        let seed: DirectorySeed =
            serde_json::from_str(&content).context("Failed to parse directory seed JSON")?;

        info!(
            path,
            users = seed.user_memberships.len(),
            orgs = seed.org_members.len(),
            contributions = seed.contributions.len(),
            approved_buyers = seed.approved_buyers.len(),
            "Directory seed loaded"
        );
        Ok(Self::from_seed(seed))
    }

    pub fn approve_buyer(&mut self, uid: &str) {
        Arc::make_mut(&mut self.seed)
            .approved_buyers
            .insert(uid.to_string());
    }

    /// Record `uid` as an active member of `org_id` in both membership views.
    pub fn add_member(&mut self, uid: &str, org_id: &str) {
        let seed = Arc::make_mut(&mut self.seed);
        seed.user_memberships
            .entry(uid.to_string())
            .or_default()
            .push(MembershipEntry {
                org_id: org_id.to_string(),
                active: true,
            });
        seed.org_members
            .entry(org_id.to_string())
            .or_default()
            .push(uid.to_string());
    }

    pub fn add_contribution(&mut self, org_id: &str, uid: &str, commodity: Commodity) {
        Arc::make_mut(&mut self.seed)
            .contributions
            .push(ContributionEntry {
                org_id: org_id.to_string(),
                uid: uid.to_string(),
                commodity,
            });
    }

    /// Both membership views over the current seed.
    pub fn membership_sources(&self) -> Vec<Arc<dyn MembershipSource>> {
        vec![
            Arc::new(UserMembershipMirror {
                seed: self.seed.clone(),
            }),
            Arc::new(OrgMemberIndex {
                seed: self.seed.clone(),
            }),
        ]
    }
}

/// Per-user membership mirror (`users/{uid}/memberships`).
#[derive(Debug, Clone)]
pub struct UserMembershipMirror {
    seed: Arc<DirectorySeed>,
}

#[async_trait]
impl MembershipSource for UserMembershipMirror {
    fn name(&self) -> &'static str {
        "user_membership_mirror"
    }

    async fn active_orgs(&self, uid: &str) -> Result<Vec<OrgId>> {
        Ok(self
            .seed
            .user_memberships
            .get(uid)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|m| m.active)
                    .map(|m| m.org_id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Per-org member index (`orgs/{orgId}/members`).
#[derive(Debug, Clone)]
pub struct OrgMemberIndex {
    seed: Arc<DirectorySeed>,
}

#[async_trait]
impl MembershipSource for OrgMemberIndex {
    fn name(&self) -> &'static str {
        "org_member_index"
    }

    async fn active_orgs(&self, uid: &str) -> Result<Vec<OrgId>> {
        Ok(self
            .seed
            .org_members
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == uid))
            .map(|(org, _)| org.clone())
            .collect())
    }
}

#[async_trait]
impl ContributionHistory for StaticDirectory {
    async fn contributed_commodities(&self, org_id: &str, uid: &str) -> Result<Vec<Commodity>> {
        let found: BTreeSet<Commodity> = self
            .seed
            .contributions
            .iter()
            .filter(|c| c.org_id == org_id && c.uid == uid)
            .map(|c| c.commodity)
            .collect();
        Ok(found.into_iter().collect())
    }
}

#[async_trait]
impl BuyerApproval for StaticDirectory {
    async fn is_approved(&self, buyer_uid: &str) -> Result<bool> {
        Ok(self.seed.approved_buyers.contains(buyer_uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"{
        "userMemberships": {
            "f1": [{ "orgId": "coop-a" }, { "orgId": "coop-old", "active": false }]
        },
        "orgMembers": { "coop-b": ["f1", "f2"] },
        "contributions": [{ "orgId": "coop-a", "uid": "f1", "commodity": "kales" }],
        "approvedBuyers": ["b1"]
    }"#;

    #[tokio::test]
    async fn test_sources_answer_independently() {
        let seed: DirectorySeed = serde_json::from_str(SEED).unwrap();
        let directory = StaticDirectory::from_seed(seed);
        let sources = directory.membership_sources();

        let mirror = sources[0].active_orgs("f1").await.unwrap();
        assert_eq!(mirror, vec!["coop-a".to_string()]);
        let index = sources[1].active_orgs("f1").await.unwrap();
        assert_eq!(index, vec!["coop-b".to_string()]);
        assert!(sources[0].active_orgs("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_contributions_and_approvals() {
        let seed: DirectorySeed = serde_json::from_str(SEED).unwrap();
        let directory = StaticDirectory::from_seed(seed);

        assert_eq!(
            directory.contributed_commodities("coop-a", "f1").await.unwrap(),
            vec![Commodity::Kales]
        );
        assert!(directory
            .contributed_commodities("coop-b", "f1")
            .await
            .unwrap()
            .is_empty());
        assert!(directory.is_approved("b1").await.unwrap());
        assert!(!directory.is_approved("b2").await.unwrap());
    }
}
