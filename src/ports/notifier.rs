//! Notification and Audit Ports - Best-effort Side Effects
//!
//! Both are fired after the authoritative state change. Callers log and
//! swallow failures; nothing here may roll back or block a transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{BidId, Commodity, OfferId, OrgId, Uid, VisibilityMode};

/// Who a notice is addressed to. Resolving the audience into concrete
/// recipients and channels belongs to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
  /// Staff and admins of a cooperative.
  OrgStaff { org_id: OrgId },
  /// Farmer members allowed to see a bid under its visibility mode.
  EligibleMembers {
    org_id: OrgId,
    commodity: Commodity,
    visibility: VisibilityMode,
  },
  /// Specific users.
  Users { uids: Vec<Uid> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
  BidOpened {
    bid_id: BidId,
    commodity: Commodity,
    closes_at: DateTime<Utc>,
  },
  OfferReceived {
    bid_id: BidId,
    commodity: Commodity,
    price_per_kg: Decimal,
  },
  /// Sent to the winning buyer.
  OfferWon { bid_id: BidId, price_per_kg: Decimal },
  /// Sent to every other offering buyer.
  OfferLost { bid_id: BidId },
  /// Sent to the cooperative once a bid is closed.
  BidClosed {
    bid_id: BidId,
    winning_price: Option<Decimal>,
  },
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
  async fn notify(&self, audience: &Audience, notice: &Notice) -> anyhow::Result<()>;
}

/// One audit line. Every routed request and every sweep close emits one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
  pub at: DateTime<Utc>,
  pub actor_uid: Option<Uid>,
  pub actor_role: Option<String>,
  pub action: String,
  pub org_id: Option<OrgId>,
  pub bid_id: Option<BidId>,
  pub offer_id: Option<OfferId>,
  pub status_code: u16,
}

#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
  async fn record(&self, record: &AuditRecord) -> anyhow::Result<()>;
}
