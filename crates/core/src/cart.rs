//! Cart items and client-side cart arithmetic.
//!
//! Totals and clamps computed here drive display and button state only.
//! Stock and pricing are enforced by the backend, which recomputes the
//! order total at checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::listing::Listing;
use crate::reservation::ReservationWindow;
use crate::types::{CartItemId, CurrencyCode, Money};

/// A line in the buyer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Cart item ID.
    pub id: CartItemId,
    /// Listing being bought.
    pub listing: Listing,
    /// Requested quantity.
    pub quantity: u32,
    /// When the stock hold started.
    #[serde(default)]
    pub reserved_at: Option<DateTime<Utc>>,
    /// Explicit end of the stock hold, if the backend supplied one.
    #[serde(default)]
    pub reservation_end_time: Option<DateTime<Utc>>,
    /// Buyer notes for the seller.
    #[serde(default)]
    pub notes: Option<String>,
}

impl CartItem {
    /// Effective unit price after campaign discounts.
    #[must_use]
    pub fn effective_unit_price(&self) -> Money {
        Money::new(effective_unit_price(&self.listing), self.listing.currency)
    }

    /// Line total at the effective unit price.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.effective_unit_price() * self.quantity
    }

    /// Reservation window for this item, if it holds stock.
    #[must_use]
    pub fn reservation_window(&self, timeout: chrono::Duration) -> Option<ReservationWindow> {
        ReservationWindow::resolve(self.reserved_at, self.reservation_end_time, timeout)
    }
}

/// Unit price the buyer pays for a listing.
///
/// The campaign price wins only when a campaign id is set and the campaign
/// price is strictly lower than the regular price.
#[must_use]
pub fn effective_unit_price(listing: &Listing) -> Decimal {
    match listing.campaign_price {
        Some(campaign) if listing.has_active_campaign() => campaign,
        _ => listing.price,
    }
}

/// Totals derived from the cart contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    /// Sum of effective prices times quantity.
    pub total: Decimal,
    /// Sum of regular prices times quantity.
    pub original_total: Decimal,
    /// `max(0, original_total - total)`.
    pub discount: Decimal,
    /// Number of units across all lines.
    pub item_count: u32,
    /// Currency of the first line (TRY for an empty cart).
    pub currency: CurrencyCode,
}

impl CartTotals {
    /// Compute totals for a set of cart items.
    ///
    /// Carts are single-currency; the first line's currency labels the
    /// result.
    #[must_use]
    pub fn compute(items: &[CartItem]) -> Self {
        let currency = items
            .first()
            .map_or_else(CurrencyCode::default, |item| item.listing.currency);

        let (total, original_total, item_count) = items.iter().fold(
            (Decimal::ZERO, Decimal::ZERO, 0_u32),
            |(total, original, count), item| {
                let quantity = Decimal::from(item.quantity);
                (
                    total + effective_unit_price(&item.listing) * quantity,
                    original + item.listing.price * quantity,
                    count.saturating_add(item.quantity),
                )
            },
        );

        Self {
            total,
            original_total,
            discount: (original_total - total).max(Decimal::ZERO),
            item_count,
            currency,
        }
    }

    /// Total as money.
    #[must_use]
    pub const fn total_money(&self) -> Money {
        Money::new(self.total, self.currency)
    }

    /// Discount as money.
    #[must_use]
    pub const fn discount_money(&self) -> Money {
        Money::new(self.discount, self.currency)
    }
}

/// Result of checking a requested quantity against stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityClamp {
    /// The requested quantity fits in stock.
    Accepted(u32),
    /// The requested quantity exceeded stock and was reduced to `max`.
    Clamped {
        /// What the buyer asked for.
        requested: u32,
        /// Units in stock.
        max: u32,
    },
}

impl QuantityClamp {
    /// Quantity to send to the backend.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        match *self {
            Self::Accepted(quantity) => quantity,
            Self::Clamped { max, .. } => max,
        }
    }

    /// Whether the request was reduced.
    #[must_use]
    pub const fn was_clamped(&self) -> bool {
        matches!(self, Self::Clamped { .. })
    }
}

/// Clamp a requested quantity to the available stock.
///
/// Unknown stock accepts the request as is.
#[must_use]
pub const fn clamp_quantity(requested: u32, stock: Option<u32>) -> QuantityClamp {
    match stock {
        Some(max) if requested > max => QuantityClamp::Clamped { requested, max },
        _ => QuantityClamp::Accepted(requested),
    }
}
