//! Listing DTO as embedded in cart items.
//!
//! The client never mutates a listing. Within a cart session it is a
//! snapshot of what the backend returned with the cart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CampaignId, CurrencyCode, ListingId, Money, SellerId};

/// Marketplace category of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingCategory {
    Vehicle,
    Electronics,
    RealEstate,
    Clothing,
    #[default]
    #[serde(other)]
    Other,
}

/// A listing referenced by a cart item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Listing ID.
    pub id: ListingId,
    /// Listing title.
    pub title: String,
    /// Marketplace category.
    #[serde(default, alias = "listingType")]
    pub category: ListingCategory,
    /// Regular unit price.
    pub price: Decimal,
    /// Discounted unit price while a campaign is running.
    #[serde(default)]
    pub campaign_price: Option<Decimal>,
    /// Campaign the discounted price belongs to.
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    /// Currency of both prices.
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Units in stock, when the backend reports it.
    #[serde(default)]
    pub quantity: Option<u32>,
    /// Seller information.
    #[serde(default)]
    pub seller: Option<SellerSummary>,
    /// Aggregated review statistics.
    #[serde(default)]
    pub review_stats: Option<ReviewStats>,
}

impl Listing {
    /// Regular unit price as money.
    #[must_use]
    pub const fn unit_price(&self) -> Money {
        Money::new(self.price, self.currency)
    }

    /// Whether a campaign discount applies.
    ///
    /// Requires a campaign id and a campaign price strictly below the
    /// regular price.
    #[must_use]
    pub fn has_active_campaign(&self) -> bool {
        self.campaign_id.is_some()
            && self
                .campaign_price
                .is_some_and(|campaign| campaign < self.price)
    }
}

/// Seller shown next to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSummary {
    /// Seller ID.
    pub id: SellerId,
    /// Public display name.
    #[serde(alias = "name")]
    pub display_name: String,
}

/// Review statistics for a seller or listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    /// Average rating on a 1-5 scale.
    pub average_rating: Decimal,
    /// Number of reviews.
    pub review_count: u32,
}
