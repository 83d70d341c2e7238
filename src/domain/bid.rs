//! Bid entity and its lifecycle rules.
//!
//! A bid is a cooperative's time-boxed demand for one commodity. It is born
//! `Open`, and leaves that state exactly once: to `Closed` through winner
//! resolution or to `Cancelled` by staff.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{TradeError, TradeResult};
use super::offer::OfferId;
use super::principal::{OrgId, Uid};

/// Bid identifier.
pub type BidId = String;

/// The only unit of measure accepted for requested quantities.
pub const UNIT_KG: &str = "kg";

/// Settlement currency shown alongside every price.
pub const CURRENCY: &str = "KES";

/// Commodities the cooperative marketplace trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commodity {
    Kales,
    Cabbage,
    Tomatoes,
}

impl Commodity {
    /// Every supported commodity, in sweep order.
    pub const ALL: [Self; 3] = [Self::Kales, Self::Cabbage, Self::Tomatoes];

    pub fn parse(raw: &str) -> TradeResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kales" => Ok(Self::Kales),
            "cabbage" => Ok(Self::Cabbage),
            "tomatoes" => Ok(Self::Tomatoes),
            other => Err(TradeError::Validation(format!(
                "unsupported commodity '{other}'"
            ))),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kales => "kales",
            Self::Cabbage => "cabbage",
            Self::Tomatoes => "tomatoes",
        }
    }
}

impl std::fmt::Display for Commodity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Open,
    Closed,
    Cancelled,
}

impl BidStatus {
    pub fn parse(raw: &str) -> TradeResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(TradeError::Validation(format!(
                "unknown bid status '{other}'"
            ))),
        }
    }

    /// Only `Open` may move, and only to a terminal state.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Closed) | (Self::Open, Self::Cancelled)
        )
    }
}

/// Which farmer members may see a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    /// Only members with a recorded contribution in the bid's commodity.
    EligibleOnly,
    /// Every active member of the owning cooperative.
    #[default]
    AllMembers,
}

/// How much of the live price picture masked views reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransparencyMode {
    /// Bidder count and the best price only.
    #[default]
    TopOnly,
    /// Bidder count plus the ranked price list, without identities.
    FullList,
}

/// Denormalized aggregate over the live offer set, owned by the projector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidSnapshot {
    pub bidder_count: u32,
    pub top_price: Option<Decimal>,
    /// Best prices, highest first.
    pub top_price_list: Vec<Decimal>,
}

/// Winner fields written by resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub offer_id: OfferId,
    pub buyer_uid: Uid,
    pub price_per_kg: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub bid_id: BidId,
    pub org_id: OrgId,
    pub commodity: Commodity,
    pub requested_qty: Decimal,
    pub unit: String,
    pub currency: String,
    pub status: BidStatus,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub visibility_mode: VisibilityMode,
    pub transparency_mode: TransparencyMode,
    pub winning_offer_id: Option<OfferId>,
    pub winning_buyer_uid: Option<Uid>,
    pub winning_price: Option<Decimal>,
    pub snapshot: BidSnapshot,
    pub created_by_uid: Uid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Raw create-bid input as received from a caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    pub commodity: String,
    pub requested_qty: Decimal,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: DateTime<Utc>,
    pub visibility_mode: Option<VisibilityMode>,
    pub transparency_mode: Option<TransparencyMode>,
}

fn default_unit() -> String {
    UNIT_KG.to_string()
}

impl Bid {
    /// Validate a create request and build a fresh open bid.
    pub fn open(
        org_id: &str,
        request: BidRequest,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> TradeResult<Self> {
        let commodity = Commodity::parse(&request.commodity)?;

        if request.requested_qty <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "requestedQty must be positive, got {}",
                request.requested_qty
            )));
        }
        if !request.unit.trim().eq_ignore_ascii_case(UNIT_KG) {
            return Err(TradeError::Validation(format!(
                "unit must be '{UNIT_KG}', got '{}'",
                request.unit
            )));
        }

        let opens_at = request.opens_at.unwrap_or(now);
        if request.closes_at <= opens_at {
            return Err(TradeError::Validation(format!(
                "closesAt ({}) must be after opensAt ({opens_at})",
                request.closes_at
            )));
        }

        Ok(Self {
            bid_id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            commodity,
            requested_qty: request.requested_qty,
            unit: UNIT_KG.to_string(),
            currency: CURRENCY.to_string(),
            status: BidStatus::Open,
            opens_at,
            closes_at: request.closes_at,
            visibility_mode: request.visibility_mode.unwrap_or_default(),
            transparency_mode: request.transparency_mode.unwrap_or_default(),
            winning_offer_id: None,
            winning_buyer_uid: None,
            winning_price: None,
            snapshot: BidSnapshot::default(),
            created_by_uid: created_by.to_string(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            cancelled_at: None,
        })
    }

    /// Open and still inside its window at `now`.
    pub fn accepts_offers_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BidStatus::Open && self.closes_at > now
    }

    /// Open but past its deadline at `now`; the sweep closes these.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BidStatus::Open && self.closes_at <= now
    }

    /// Fail with `Conflict` unless the bid is still open.
    pub fn require_open(&self) -> TradeResult<()> {
        match self.status {
            BidStatus::Open => Ok(()),
            BidStatus::Closed | BidStatus::Cancelled => Err(TradeError::Conflict(format!(
                "bid {} is {:?}, not open",
                self.bid_id, self.status
            ))),
        }
    }

    /// Move to `Closed`, writing the award (or clearing it when there is none).
    pub fn close(&mut self, award: Option<&Award>, now: DateTime<Utc>) -> TradeResult<()> {
        self.transition(BidStatus::Closed)?;
        self.set_award(award);
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> TradeResult<()> {
        self.transition(BidStatus::Cancelled)?;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Retroactive winner correction on an already closed bid.
    pub fn correct_award(&mut self, award: &Award, now: DateTime<Utc>) -> TradeResult<()> {
        if self.status != BidStatus::Closed {
            return Err(TradeError::Conflict(format!(
                "winner correction requires a closed bid, {} is {:?}",
                self.bid_id, self.status
            )));
        }
        self.set_award(Some(award));
        self.updated_at = now;
        Ok(())
    }

    fn transition(&mut self, next: BidStatus) -> TradeResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(TradeError::Conflict(format!(
                "bid {} cannot move from {:?} to {next:?}",
                self.bid_id, self.status
            )));
        }
        self.status = next;
        Ok(())
    }

    fn set_award(&mut self, award: Option<&Award>) {
        self.winning_offer_id = award.map(|a| a.offer_id.clone());
        self.winning_buyer_uid = award.map(|a| a.buyer_uid.clone());
        self.winning_price = award.map(|a| a.price_per_kg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn request(closes_in_minutes: i64) -> BidRequest {
        BidRequest {
            commodity: "Tomatoes".to_string(),
            requested_qty: dec!(500),
            unit: "kg".to_string(),
            opens_at: None,
            closes_at: Utc::now() + Duration::minutes(closes_in_minutes),
            visibility_mode: None,
            transparency_mode: None,
        }
    }

    #[test]
    fn test_open_defaults() {
        let now = Utc::now();
        let bid = Bid::open("coop-a", request(30), "staff-1", now).unwrap();
        assert_eq!(bid.status, BidStatus::Open);
        assert_eq!(bid.commodity, Commodity::Tomatoes);
        assert_eq!(bid.opens_at, now);
        assert_eq!(bid.visibility_mode, VisibilityMode::AllMembers);
        assert_eq!(bid.transparency_mode, TransparencyMode::TopOnly);
        assert!(bid.winning_offer_id.is_none());
    }

    #[test]
    fn test_open_rejects_bad_input() {
        let now = Utc::now();

        let mut bad = request(30);
        bad.commodity = "maize".to_string();
        assert!(matches!(
            Bid::open("coop-a", bad, "s", now),
            Err(TradeError::Validation(_))
        ));

        let mut bad = request(30);
        bad.requested_qty = dec!(0);
        assert!(Bid::open("coop-a", bad, "s", now).is_err());

        let mut bad = request(30);
        bad.unit = "crates".to_string();
        assert!(Bid::open("coop-a", bad, "s", now).is_err());

        assert!(Bid::open("coop-a", request(-5), "s", now).is_err());
    }

    #[test]
    fn test_terminal_states_never_move() {
        let now = Utc::now();
        let mut bid = Bid::open("coop-a", request(30), "s", now).unwrap();
        bid.close(None, now).unwrap();
        assert_eq!(bid.status, BidStatus::Closed);
        assert!(bid.close(None, now).is_err());
        assert!(bid.cancel(now).is_err());

        let mut other = Bid::open("coop-a", request(30), "s", now).unwrap();
        other.cancel(now).unwrap();
        assert!(other.close(None, now).is_err());
        assert!(other.require_open().is_err());
    }

    #[test]
    fn test_correction_needs_closed_bid() {
        let now = Utc::now();
        let award = Award {
            offer_id: "o1".into(),
            buyer_uid: "b1".into(),
            price_per_kg: dec!(42),
        };
        let mut bid = Bid::open("coop-a", request(30), "s", now).unwrap();
        assert!(bid.correct_award(&award, now).is_err());
        bid.close(None, now).unwrap();
        bid.correct_award(&award, now).unwrap();
        assert_eq!(bid.status, BidStatus::Closed);
        assert_eq!(bid.winning_price, Some(dec!(42)));
    }
}
