//! Status and type enums shared across the client.
//!
//! Serialized forms match the backend's `SCREAMING_SNAKE_CASE` constants.

use serde::{Deserialize, Serialize};

/// How the buyer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Saved credit card.
    #[default]
    CreditCard,
    /// Bank transfer from a saved IBAN.
    Transfer,
    /// Marketplace wallet balance.
    Ewallet,
}

impl PaymentType {
    /// Backend constant for this payment type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "CREDIT_CARD",
            Self::Transfer => "TRANSFER",
            Self::Ewallet => "EWALLET",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "CREDIT_CARD" | "CARD" => Ok(Self::CreditCard),
            "TRANSFER" | "BANK_TRANSFER" => Ok(Self::Transfer),
            "EWALLET" | "E_WALLET" | "WALLET" => Ok(Self::Ewallet),
            _ => Err(format!("invalid payment type: {s}")),
        }
    }
}

/// Order status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
    #[serde(other)]
    Unknown,
}
