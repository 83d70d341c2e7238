//! Winner selection for a closing bid.
//!
//! Pure planning step: given the full offer set of a bid and an optional
//! staff override, decide who wins and which offers lose. Applying the plan
//! atomically is the store's job (see `ports::store::TradeStore`).
//!
//! Eligible offers are those still `Active` or already `Winning`. An
//! override that names an eligible offer wins unconditionally; otherwise
//! the highest `price_per_kg` wins. Equal top prices keep the order in
//! which the store listed them; there is no business tie-break rule, so a
//! tie is reported on the plan for the caller to log.

use std::cmp::Ordering;

use serde::Serialize;

use super::bid::Award;
use super::offer::{Offer, OfferId, OfferStatus};

/// How the winner was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerSource {
    /// Staff named the winning offer.
    Override,
    /// Highest price per kg.
    BestPrice,
    /// Nothing eligible; the bid closes without a winner.
    NoEligibleOffers,
}

/// The outcome to commit when closing a bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionPlan {
    pub award: Option<Award>,
    /// Eligible offers that become `Lost`.
    pub losers: Vec<OfferId>,
    pub source: WinnerSource,
    /// More than one eligible offer shares the top price.
    pub tied_at_top: bool,
    /// An override was supplied but did not match an eligible offer.
    pub override_ignored: bool,
}

impl ResolutionPlan {
    /// Target status for an offer under this plan, `None` when untouched.
    pub fn target_status(&self, offer: &Offer) -> Option<OfferStatus> {
        if self
            .award
            .as_ref()
            .is_some_and(|a| a.offer_id == offer.offer_id)
        {
            return Some(OfferStatus::Winning);
        }
        if offer.is_active() && self.losers.contains(&offer.offer_id) {
            return Some(OfferStatus::Lost);
        }
        None
    }
}

/// Plan the resolution of a bid from its complete offer set.
pub fn plan_resolution(offers: &[Offer], winner_override: Option<&str>) -> ResolutionPlan {
    let mut eligible: Vec<&Offer> = offers.iter().filter(|o| o.status.is_eligible()).collect();

    let overridden = winner_override.and_then(|id| eligible.iter().position(|o| o.offer_id == id));
    let override_ignored = winner_override.is_some() && overridden.is_none();

    let (winner_idx, source) = match overridden {
        Some(idx) => (Some(idx), WinnerSource::Override),
        None if eligible.is_empty() => (None, WinnerSource::NoEligibleOffers),
        None => {
            // Stable: equal prices keep listing order.
            eligible.sort_by(|a, b| by_price_desc(a, b));
            (Some(0), WinnerSource::BestPrice)
        }
    };

    let tied_at_top = source == WinnerSource::BestPrice
        && eligible.len() > 1
        && eligible[0].price_per_kg == eligible[1].price_per_kg;

    let award = winner_idx.map(|idx| {
        let w = eligible[idx];
        Award {
            offer_id: w.offer_id.clone(),
            buyer_uid: w.buyer_uid.clone(),
            price_per_kg: w.price_per_kg,
        }
    });

    let losers = eligible
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != winner_idx)
        .map(|(_, o)| o.offer_id.clone())
        .collect();

    ResolutionPlan {
        award,
        losers,
        source,
        tied_at_top,
        override_ignored,
    }
}

fn by_price_desc(a: &Offer, b: &Offer) -> Ordering {
    b.price_per_kg.cmp(&a.price_per_kg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn offer(id: &str, buyer: &str, price: Decimal) -> Offer {
        let mut o = Offer::submit("bid-1", buyer, None, price, dec!(10), Utc::now()).unwrap();
        o.offer_id = id.to_string();
        o
    }

    fn abc() -> Vec<Offer> {
        vec![
            offer("A", "buyer-a", dec!(90)),
            offer("B", "buyer-b", dec!(120)),
            offer("C", "buyer-c", dec!(80)),
        ]
    }

    #[test]
    fn test_best_price_wins() {
        let plan = plan_resolution(&abc(), None);
        let award = plan.award.unwrap();
        assert_eq!(award.offer_id, "B");
        assert_eq!(award.price_per_kg, dec!(120));
        assert_eq!(plan.source, WinnerSource::BestPrice);
        assert_eq!(plan.losers.len(), 2);
        assert!(plan.losers.contains(&"A".to_string()));
        assert!(plan.losers.contains(&"C".to_string()));
        assert!(!plan.tied_at_top);
    }

    #[test]
    fn test_override_wins_regardless_of_price() {
        let plan = plan_resolution(&abc(), Some("A"));
        assert_eq!(plan.award.as_ref().unwrap().offer_id, "A");
        assert_eq!(plan.source, WinnerSource::Override);
        assert!(plan.losers.contains(&"B".to_string()));
        assert!(!plan.override_ignored);
    }

    #[test]
    fn test_unknown_override_falls_back_to_price() {
        let plan = plan_resolution(&abc(), Some("Z"));
        assert_eq!(plan.award.unwrap().offer_id, "B");
        assert!(plan.override_ignored);
    }

    #[test]
    fn test_withdrawn_offers_are_ignored() {
        let mut offers = abc();
        offers[1].withdraw(Utc::now()).unwrap();
        let plan = plan_resolution(&offers, Some("B"));
        assert_eq!(plan.award.unwrap().offer_id, "A");
        assert!(!plan.losers.contains(&"B".to_string()));
    }

    #[test]
    fn test_no_eligible_offers() {
        let plan = plan_resolution(&[], None);
        assert!(plan.award.is_none());
        assert!(plan.losers.is_empty());
        assert_eq!(plan.source, WinnerSource::NoEligibleOffers);
    }

    #[test]
    fn test_tie_is_flagged_not_broken_by_rule() {
        let offers = vec![
            offer("X", "buyer-x", dec!(100)),
            offer("Y", "buyer-y", dec!(100)),
        ];
        let plan = plan_resolution(&offers, None);
        assert!(plan.tied_at_top);
        assert_eq!(plan.award.unwrap().offer_id, "X");
    }

    #[test]
    fn test_target_status() {
        let offers = abc();
        let plan = plan_resolution(&offers, None);
        assert_eq!(plan.target_status(&offers[1]), Some(OfferStatus::Winning));
        assert_eq!(plan.target_status(&offers[0]), Some(OfferStatus::Lost));
    }
}
