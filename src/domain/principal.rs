//! Authenticated principal and role checks.
//!
//! Identity is verified upstream; by the time a request reaches the engine
//! the caller is an explicit `Principal` with one role out of a closed set.
//! Every permission check is an exhaustive `match` over `Role`.

use serde::{Deserialize, Serialize};

use super::error::{TradeError, TradeResult};

/// Organization (cooperative) identifier.
pub type OrgId = String;

/// User identifier as issued by the identity provider.
pub type Uid = String;

/// Closed set of roles known to the trade engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Cooperative member who supplies produce.
    Farmer,
    /// Buyer that submits offers against open bids.
    Buyer,
    /// Cooperative staff, scoped to one organization.
    OrgStaff,
    /// Cooperative administrator, scoped to one organization.
    OrgAdmin,
    /// Platform operator with cross-org authority.
    SuperAdmin,
}

impl Role {
    /// Parse the wire form (`farmer`, `buyer`, `org_staff`, `org_admin`, `superadmin`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "farmer" => Some(Self::Farmer),
            "buyer" => Some(Self::Buyer),
            "org_staff" | "staff" => Some(Self::OrgStaff),
            "org_admin" | "admin" => Some(Self::OrgAdmin),
            "superadmin" | "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// Wire form of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Buyer => "buyer",
            Self::OrgStaff => "org_staff",
            Self::OrgAdmin => "org_admin",
            Self::SuperAdmin => "superadmin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a trade operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: Uid,
    pub role: Role,
    /// Home organization for org-scoped roles and buyers attached to an org.
    pub org_id: Option<OrgId>,
}

impl Principal {
    pub fn new(uid: impl Into<Uid>, role: Role, org_id: Option<OrgId>) -> Self {
        Self {
            uid: uid.into(),
            role,
            org_id,
        }
    }

    /// Synthetic principal the scheduler sweep acts as.
    pub fn scheduler() -> Self {
        Self::new(SCHEDULER_UID, Role::SuperAdmin, None)
    }

    /// Whether this principal may manage bids of `org_id`.
    pub fn can_manage_org(&self, org_id: &str) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::OrgStaff | Role::OrgAdmin => self.org_id.as_deref() == Some(org_id),
            Role::Farmer | Role::Buyer => false,
        }
    }

    /// Fail with `Authorization` unless this principal manages `org_id`.
    pub fn require_org_staff(&self, org_id: &str) -> TradeResult<()> {
        if self.can_manage_org(org_id) {
            Ok(())
        } else {
            Err(TradeError::Authorization(format!(
                "{} '{}' cannot manage org '{org_id}'",
                self.role, self.uid
            )))
        }
    }

    /// Whether this principal may submit an offer on behalf of `buyer_uid`.
    pub fn can_offer_as(&self, buyer_uid: &str) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Buyer => self.uid == buyer_uid,
            Role::Farmer | Role::OrgStaff | Role::OrgAdmin => false,
        }
    }

    /// Whether this principal may withdraw an offer owned by `owner_uid`.
    pub fn can_withdraw(&self, owner_uid: &str) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Buyer => self.uid == owner_uid,
            Role::Farmer | Role::OrgStaff | Role::OrgAdmin => false,
        }
    }
}

/// Uid recorded for actions taken by the periodic sweep.
pub const SCHEDULER_UID: &str = "system:scheduler";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_round_trip() {
        for role in [
            Role::Farmer,
            Role::Buyer,
            Role::OrgStaff,
            Role::OrgAdmin,
            Role::SuperAdmin,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse(" Admin "), Some(Role::OrgAdmin));
        assert_eq!(Role::parse("government"), None);
    }

    #[test]
    fn test_org_scope() {
        let staff = Principal::new("s1", Role::OrgStaff, Some("coop-a".into()));
        assert!(staff.can_manage_org("coop-a"));
        assert!(!staff.can_manage_org("coop-b"));
        assert!(staff.require_org_staff("coop-b").is_err());

        let unscoped = Principal::new("s2", Role::OrgAdmin, None);
        assert!(!unscoped.can_manage_org("coop-a"));

        assert!(Principal::scheduler().can_manage_org("anything"));
    }

    #[test]
    fn test_buyer_can_only_act_as_self() {
        let buyer = Principal::new("b1", Role::Buyer, None);
        assert!(buyer.can_offer_as("b1"));
        assert!(!buyer.can_offer_as("b2"));
        assert!(!buyer.can_withdraw("b2"));

        let farmer = Principal::new("f1", Role::Farmer, None);
        assert!(!farmer.can_offer_as("f1"));
    }
}
