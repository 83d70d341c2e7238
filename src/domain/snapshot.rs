//! Read-model projections.
//!
//! `project_snapshot` derives the denormalized aggregate stored on a bid.
//! `MaskedBid` and `MaskedResult` are what buyers and farmers are allowed
//! to see: counts and prices, never who offered them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::bid::{Bid, BidId, BidSnapshot, BidStatus, Commodity, TransparencyMode, VisibilityMode};
use super::offer::{Offer, OfferStatus};
use super::principal::OrgId;

/// Maximum number of prices kept in `BidSnapshot::top_price_list`.
pub const PRICE_LIST_LEN: usize = 10;

/// Recompute the aggregate for a bid from its full offer set.
pub fn project_snapshot(offers: &[Offer]) -> BidSnapshot {
    let mut prices: Vec<Decimal> = offers
        .iter()
        .filter(|o| o.status.is_eligible())
        .map(|o| o.price_per_kg)
        .collect();
    prices.sort_unstable_by(|a, b| b.cmp(a));

    let bidder_count = offers
        .iter()
        .filter(|o| o.status.is_eligible())
        .map(|o| o.buyer_uid.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    BidSnapshot {
        bidder_count: u32::try_from(bidder_count).unwrap_or(u32::MAX),
        top_price: prices.first().copied(),
        top_price_list: prices.into_iter().take(PRICE_LIST_LEN).collect(),
    }
}

/// Public, identity-free view of a bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedBid {
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
    pub bidder_count: u32,
    pub top_price: Option<Decimal>,
    /// Present only under `TransparencyMode::FullList`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_list: Option<Vec<Decimal>>,
}

impl From<&Bid> for MaskedBid {
    fn from(bid: &Bid) -> Self {
        let price_list = match bid.transparency_mode {
            TransparencyMode::FullList => Some(bid.snapshot.top_price_list.clone()),
            TransparencyMode::TopOnly => None,
        };
        Self {
            bid_id: bid.bid_id.clone(),
            org_id: bid.org_id.clone(),
            commodity: bid.commodity,
            requested_qty: bid.requested_qty,
            unit: bid.unit.clone(),
            currency: bid.currency.clone(),
            status: bid.status,
            opens_at: bid.opens_at,
            closes_at: bid.closes_at,
            visibility_mode: bid.visibility_mode,
            transparency_mode: bid.transparency_mode,
            bidder_count: bid.snapshot.bidder_count,
            top_price: bid.snapshot.top_price,
            price_list,
        }
    }
}

/// Masked outcome of a bid, optionally personalised for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedResult {
    pub bid: MaskedBid,
    pub winning_price: Option<Decimal>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Status of the caller's own most recent offer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_offer_status: Option<OfferStatus>,
}

impl MaskedResult {
    pub fn new(bid: &Bid, own_offer: Option<&Offer>) -> Self {
        Self {
            bid: MaskedBid::from(bid),
            winning_price: bid.winning_price,
            closed_at: bid.closed_at,
            your_offer_status: own_offer.map(|o| o.status),
        }
    }
}

/// Sort masked bids by deadline, soonest first.
pub fn sort_by_deadline(bids: &mut [MaskedBid]) {
    bids.sort_by(|a, b| a.closes_at.cmp(&b.closes_at).then_with(|| a.bid_id.cmp(&b.bid_id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bid::BidRequest;
    use rust_decimal_macros::dec;

    fn offer(buyer: &str, price: Decimal) -> Offer {
        Offer::submit("bid-1", buyer, Some("buyers-co".into()), price, dec!(5), Utc::now()).unwrap()
    }

    fn bid(mode: TransparencyMode) -> Bid {
        let now = Utc::now();
        Bid::open(
            "coop-a",
            BidRequest {
                commodity: "kales".into(),
                requested_qty: dec!(100),
                unit: "kg".into(),
                opens_at: None,
                closes_at: now + chrono::Duration::hours(1),
                visibility_mode: None,
                transparency_mode: Some(mode),
            },
            "staff",
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_projection_ignores_withdrawn() {
        let mut offers = vec![offer("a", dec!(90)), offer("b", dec!(120)), offer("c", dec!(80))];
        offers[1].withdraw(Utc::now()).unwrap();
        let snap = project_snapshot(&offers);
        assert_eq!(snap.bidder_count, 2);
        assert_eq!(snap.top_price, Some(dec!(90)));
        assert_eq!(snap.top_price_list, vec![dec!(90), dec!(80)]);
    }

    #[test]
    fn test_projection_caps_price_list() {
        let offers: Vec<Offer> = (1..=15)
            .map(|i| offer(&format!("buyer-{i}"), Decimal::from(i)))
            .collect();
        let snap = project_snapshot(&offers);
        assert_eq!(snap.bidder_count, 15);
        assert_eq!(snap.top_price_list.len(), PRICE_LIST_LEN);
        assert_eq!(snap.top_price_list[0], dec!(15));
    }

    #[test]
    fn test_masking_hides_identity() {
        let mut b = bid(TransparencyMode::TopOnly);
        b.snapshot = project_snapshot(&[offer("secret-buyer", dec!(70))]);
        let masked = MaskedBid::from(&b);
        assert!(masked.price_list.is_none());
        assert_eq!(masked.top_price, Some(dec!(70)));

        let json = serde_json::to_string(&masked).unwrap();
        assert!(!json.contains("secret-buyer"));
        assert!(!json.contains("buyers-co"));
        assert!(!json.contains("priceList"));
    }

    #[test]
    fn test_full_list_exposes_prices_only() {
        let mut b = bid(TransparencyMode::FullList);
        b.snapshot = project_snapshot(&[offer("x", dec!(70)), offer("y", dec!(75))]);
        let masked = MaskedBid::from(&b);
        assert_eq!(masked.price_list, Some(vec![dec!(75), dec!(70)]));
        let json = serde_json::to_string(&masked).unwrap();
        assert!(!json.contains("\"x\""));
    }
}
