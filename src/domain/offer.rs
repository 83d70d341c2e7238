//! Offer entity: a buyer's price submission against an open bid.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bid::BidId;
use super::error::{TradeError, TradeResult};
use super::principal::{OrgId, Uid};

/// Offer identifier.
pub type OfferId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Winning,
    Lost,
    Withdrawn,
}

impl OfferStatus {
    /// Offers that still compete when a bid is resolved.
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Active | Self::Winning)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub offer_id: OfferId,
    pub bid_id: BidId,
    pub buyer_uid: Uid,
    pub buyer_org_id: Option<OrgId>,
    pub price_per_kg: Decimal,
    pub qty: Decimal,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Validate price and quantity and build a fresh active offer.
    pub fn submit(
        bid_id: &str,
        buyer_uid: &str,
        buyer_org_id: Option<OrgId>,
        price_per_kg: Decimal,
        qty: Decimal,
        now: DateTime<Utc>,
    ) -> TradeResult<Self> {
        if price_per_kg <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "pricePerKg must be positive, got {price_per_kg}"
            )));
        }
        if qty <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "qty must be positive, got {qty}"
            )));
        }

        Ok(Self {
            offer_id: Uuid::new_v4().to_string(),
            bid_id: bid_id.to_string(),
            buyer_uid: buyer_uid.to_string(),
            buyer_org_id,
            price_per_kg,
            qty,
            status: OfferStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == OfferStatus::Active
    }

    /// active → withdrawn. Any other starting state is a conflict.
    pub fn withdraw(&mut self, now: DateTime<Utc>) -> TradeResult<()> {
        self.settle(OfferStatus::Withdrawn, now)
    }

    /// active → winning, or active → lost, at bid resolution.
    pub fn settle(&mut self, next: OfferStatus, now: DateTime<Utc>) -> TradeResult<()> {
        match (self.status, next) {
            (OfferStatus::Active, OfferStatus::Withdrawn | OfferStatus::Winning | OfferStatus::Lost) => {
                self.status = next;
                self.updated_at = now;
                Ok(())
            }
            // Re-affirming the winner of a re-read offer set is a no-op.
            (OfferStatus::Winning, OfferStatus::Winning) => Ok(()),
            (from, to) => Err(TradeError::Conflict(format!(
                "offer {} cannot move from {from:?} to {to:?}",
                self.offer_id
            ))),
        }
    }
}
