//! SecondHand REST backend interfaces.
//!
//! # Architecture
//!
//! - One trait per backend service (`CartApi`, `OrderApi`, `PaymentApi`,
//!   `EmailApi`) so the cart manager and checkout wizard can run against
//!   in-memory fakes in tests
//! - [`HttpBackend`] implements all of them with `reqwest`
//! - Saved cards and bank accounts are cached via `moka` and re-fetched after
//!   `invalidate_payment_methods`
//! - List endpoints answer with a bare array, a `{content: [...]}` page or a
//!   single object; [`ListEnvelope`] flattens all three at this boundary so
//!   nothing downstream sniffs shapes
//!
//! # Example
//!
//! ```rust,ignore
//! use secondhand_client::api::{HttpBackend, PaymentApi};
//!
//! let backend = HttpBackend::new(&config)?;
//! let cards = backend.get_credit_cards().await?;
//! ```

mod cache;
mod envelope;
mod http;

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use secondhand_core::{
    AddressId, AgreementId, BankAccountId, CartItem, CartItemId, CreditCardId, CurrencyCode,
    EmailId, Money, OfferId, OrderId, OrderStatus, PaymentType,
};

use crate::error::ApiResult;

pub use envelope::ListEnvelope;
pub use http::{HttpBackend, IDEMPOTENCY_KEY_HEADER};

// =============================================================================
// Service traits
// =============================================================================

/// Cart endpoints.
pub trait CartApi: Send + Sync {
    /// Fetch the buyer's cart.
    fn get_cart(&self) -> impl Future<Output = ApiResult<Vec<CartItem>>> + Send;

    /// Set the quantity of a cart item.
    fn update_quantity(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Remove one item from the cart.
    fn remove_item(&self, item_id: CartItemId) -> impl Future<Output = ApiResult<()>> + Send;

    /// Empty the cart.
    fn clear_cart(&self) -> impl Future<Output = ApiResult<()>> + Send;
}

/// Order endpoints.
pub trait OrderApi: Send + Sync {
    /// Place an order. `idempotency_key` lets the backend drop duplicates.
    fn checkout(
        &self,
        request: &CheckoutRequest,
        idempotency_key: &str,
    ) -> impl Future<Output = ApiResult<OrderConfirmation>> + Send;

    /// Ask the backend to email a payment verification code.
    fn initiate_payment_verification(
        &self,
        request: &PaymentVerificationRequest,
    ) -> impl Future<Output = ApiResult<()>> + Send;
}

/// Saved payment instrument endpoints.
pub trait PaymentApi: Send + Sync {
    /// Saved credit cards.
    fn get_credit_cards(&self) -> impl Future<Output = ApiResult<Vec<CreditCard>>> + Send;

    /// Saved bank accounts.
    fn get_bank_accounts(&self) -> impl Future<Output = ApiResult<Vec<BankAccount>>> + Send;

    /// The buyer's wallet, `None` if they have not opened one.
    fn get_ewallet(&self) -> impl Future<Output = ApiResult<Option<EWallet>>> + Send;
}

/// Mailbox endpoints used to read verification codes in-app.
pub trait EmailApi: Send + Sync {
    /// Most recent emails sent to the buyer.
    fn get_emails(&self) -> impl Future<Output = ApiResult<Vec<EmailMessage>>> + Send;
}

/// Everything the checkout wizard talks to.
pub trait Backend: CartApi + OrderApi + PaymentApi + EmailApi {}

impl<T: CartApi + OrderApi + PaymentApi + EmailApi> Backend for T {}

// =============================================================================
// Request types
// =============================================================================

/// Body of `POST /api/orders/checkout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
    pub notes: Option<String>,
    pub name: Option<String>,
    pub payment_type: PaymentType,
    pub payment_verification_code: String,
    pub agreements_accepted: bool,
    pub accepted_agreement_ids: Vec<AgreementId>,
    pub coupon_code: Option<String>,
    pub offer_id: Option<OfferId>,
    /// Card to charge when paying by credit card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_id: Option<CreditCardId>,
    /// IBAN to debit when paying by transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
}

/// Body of `POST /api/orders/payment-verification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerificationRequest {
    pub transaction_type: PaymentType,
    pub coupon_code: Option<String>,
    pub offer_id: Option<OfferId>,
}

// =============================================================================
// Response types
// =============================================================================

/// Order returned by a successful checkout.
///
/// `Default` stands for an order the backend accepted without a readable
/// confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    #[serde(default, alias = "orderId")]
    pub id: Option<OrderId>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderConfirmation {
    /// Label used in notifications.
    #[must_use]
    pub fn reference(&self) -> String {
        match (&self.order_number, self.id) {
            (Some(number), _) => number.clone(),
            (None, Some(id)) => format!("#{id}"),
            (None, None) => "(reference pending)".to_string(),
        }
    }
}

/// A saved credit card (number is masked by the backend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCard {
    pub id: CreditCardId,
    #[serde(alias = "cardNumber", alias = "maskedNumber")]
    pub masked_card_number: String,
    #[serde(default)]
    pub card_holder_name: Option<String>,
    #[serde(default)]
    pub expiry_month: Option<u8>,
    #[serde(default)]
    pub expiry_year: Option<u16>,
    #[serde(default)]
    pub is_default: bool,
}

/// A saved bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: BankAccountId,
    pub iban: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_holder_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// The buyer's marketplace wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EWallet {
    pub balance: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Orders at or above this amount need explicit confirmation.
    #[serde(default)]
    pub spending_warning_limit: Option<Decimal>,
    #[serde(default = "default_true")]
    pub spending_warning_enabled: bool,
}

const fn default_true() -> bool {
    true
}

impl EWallet {
    /// Balance as money.
    #[must_use]
    pub const fn balance_money(&self) -> Money {
        Money::new(self.balance, self.currency)
    }

    /// Whether paying `total` from this wallet needs a confirmation step.
    #[must_use]
    pub fn requires_spending_confirmation(&self, total: Decimal) -> bool {
        self.spending_warning_enabled
            && self
                .spending_warning_limit
                .is_some_and(|limit| total >= limit)
    }
}

/// An email from the buyer's in-app mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: EmailId,
    #[serde(default)]
    pub subject: String,
    #[serde(default, alias = "content")]
    pub body: String,
    #[serde(alias = "createdAt")]
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_request_wire_format() {
        let request = CheckoutRequest {
            shipping_address_id: AddressId::new(1),
            billing_address_id: AddressId::new(2),
            notes: None,
            name: Some("Ayşe Yılmaz".to_string()),
            payment_type: PaymentType::Transfer,
            payment_verification_code: "482913".to_string(),
            agreements_accepted: true,
            accepted_agreement_ids: vec![AgreementId::new(5)],
            coupon_code: None,
            offer_id: None,
            credit_card_id: None,
            iban: Some("TR330006100519786457841326".to_string()),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["shippingAddressId"], 1);
        assert_eq!(value["paymentType"], "TRANSFER");
        assert_eq!(value["paymentVerificationCode"], "482913");
        assert_eq!(value["acceptedAgreementIds"][0], 5);
        assert!(value["couponCode"].is_null());
        assert!(value.get("creditCardId").is_none());
    }

    #[test]
    fn test_ewallet_spending_confirmation() {
        let wallet = EWallet {
            balance: Decimal::from(1000),
            currency: CurrencyCode::TRY,
            spending_warning_limit: Some(Decimal::from(500)),
            spending_warning_enabled: true,
        };
        assert!(wallet.requires_spending_confirmation(Decimal::from(600)));
        assert!(wallet.requires_spending_confirmation(Decimal::from(500)));
        assert!(!wallet.requires_spending_confirmation(Decimal::from(499)));

        let disabled = EWallet {
            spending_warning_enabled: false,
            ..wallet
        };
        assert!(!disabled.requires_spending_confirmation(Decimal::from(600)));
    }

    #[test]
    fn test_ewallet_defaults() {
        let wallet: EWallet = serde_json::from_str(r#"{"balance": "250.75"}"#).unwrap();
        assert_eq!(wallet.balance, Decimal::new(25075, 2));
        assert!(wallet.spending_warning_enabled);
        assert!(wallet.spending_warning_limit.is_none());
    }

    #[test]
    fn test_order_confirmation_reference() {
        let order: OrderConfirmation =
            serde_json::from_str(r#"{"orderId": 77, "status": "CONFIRMED"}"#).unwrap();
        assert_eq!(order.reference(), "#77");
        assert_eq!(order.status, OrderStatus::Confirmed);

        assert_eq!(OrderConfirmation::default().reference(), "(reference pending)");
    }
}
