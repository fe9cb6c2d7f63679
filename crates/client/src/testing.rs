//! In-memory backend for unit tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use secondhand_core::{
    BankAccountId, CampaignId, CartItem, CartItemId, CreditCardId, CurrencyCode, EmailId,
    Listing, ListingCategory, ListingId, OrderId, OrderStatus,
};

use crate::api::{
    BankAccount, CartApi, CheckoutRequest, CreditCard, EWallet, EmailApi, EmailMessage, OrderApi,
    OrderConfirmation, PaymentApi, PaymentVerificationRequest,
};
use crate::error::{ApiError, ApiResult};

#[derive(Default)]
struct FakeState {
    cart: Vec<CartItem>,
    cards: Vec<CreditCard>,
    bank_accounts: Vec<BankAccount>,
    ewallet: Option<EWallet>,
    emails: Vec<EmailMessage>,
    quantity_updates: Vec<(CartItemId, u32)>,
    removed_items: Vec<CartItemId>,
    cart_clears: usize,
    checkout_calls: Vec<(CheckoutRequest, String)>,
    verification_calls: Vec<PaymentVerificationRequest>,
    cart_update_error: Option<(u16, Value)>,
    checkout_error: Option<(u16, Value)>,
    verification_error: Option<(u16, Value)>,
    payment_methods_error: bool,
    email_error: bool,
}

/// Backend double recording every call.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_cart(&self, items: Vec<CartItem>) {
        self.state().cart = items;
    }

    pub fn set_cards(&self, cards: Vec<CreditCard>) {
        self.state().cards = cards;
    }

    pub fn set_bank_accounts(&self, accounts: Vec<BankAccount>) {
        self.state().bank_accounts = accounts;
    }

    pub fn set_ewallet(&self, wallet: Option<EWallet>) {
        self.state().ewallet = wallet;
    }

    pub fn set_emails(&self, emails: Vec<EmailMessage>) {
        self.state().emails = emails;
    }

    pub fn fail_cart_updates(&self, status: u16, body: Value) {
        self.state().cart_update_error = Some((status, body));
    }

    pub fn fail_checkout(&self, status: u16, body: Value) {
        self.state().checkout_error = Some((status, body));
    }

    pub fn fail_verification(&self, status: u16, body: Value) {
        self.state().verification_error = Some((status, body));
    }

    pub fn fail_payment_methods(&self) {
        self.state().payment_methods_error = true;
    }

    pub fn fail_emails(&self) {
        self.state().email_error = true;
    }

    pub fn quantity_updates(&self) -> Vec<(CartItemId, u32)> {
        self.state().quantity_updates.clone()
    }

    pub fn removed_items(&self) -> Vec<CartItemId> {
        self.state().removed_items.clone()
    }

    pub fn cart_clears(&self) -> usize {
        self.state().cart_clears
    }

    pub fn checkout_calls(&self) -> Vec<(CheckoutRequest, String)> {
        self.state().checkout_calls.clone()
    }

    pub fn verification_calls(&self) -> Vec<PaymentVerificationRequest> {
        self.state().verification_calls.clone()
    }
}

fn api_error((status, body): (u16, Value)) -> ApiError {
    ApiError::Api { status, body }
}

impl CartApi for FakeBackend {
    async fn get_cart(&self) -> ApiResult<Vec<CartItem>> {
        Ok(self.state().cart.clone())
    }

    async fn update_quantity(&self, item_id: CartItemId, quantity: u32) -> ApiResult<()> {
        let mut state = self.state();
        if let Some(error) = state.cart_update_error.clone() {
            return Err(api_error(error));
        }
        state.quantity_updates.push((item_id, quantity));
        if let Some(item) = state.cart.iter_mut().find(|item| item.id == item_id) {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn remove_item(&self, item_id: CartItemId) -> ApiResult<()> {
        let mut state = self.state();
        if let Some(error) = state.cart_update_error.clone() {
            return Err(api_error(error));
        }
        state.removed_items.push(item_id);
        state.cart.retain(|item| item.id != item_id);
        Ok(())
    }

    async fn clear_cart(&self) -> ApiResult<()> {
        let mut state = self.state();
        state.cart_clears += 1;
        state.cart.clear();
        Ok(())
    }
}

impl OrderApi for FakeBackend {
    async fn checkout(
        &self,
        request: &CheckoutRequest,
        idempotency_key: &str,
    ) -> ApiResult<OrderConfirmation> {
        let mut state = self.state();
        state
            .checkout_calls
            .push((request.clone(), idempotency_key.to_string()));
        if let Some(error) = state.checkout_error.clone() {
            return Err(api_error(error));
        }
        Ok(OrderConfirmation {
            id: Some(OrderId::new(500)),
            order_number: Some("SH-500".to_string()),
            status: OrderStatus::Confirmed,
            total_amount: None,
            currency: CurrencyCode::TRY,
            created_at: None,
        })
    }

    async fn initiate_payment_verification(
        &self,
        request: &PaymentVerificationRequest,
    ) -> ApiResult<()> {
        let mut state = self.state();
        state.verification_calls.push(request.clone());
        match state.verification_error.clone() {
            Some(error) => Err(api_error(error)),
            None => Ok(()),
        }
    }
}

impl PaymentApi for FakeBackend {
    async fn get_credit_cards(&self) -> ApiResult<Vec<CreditCard>> {
        let state = self.state();
        if state.payment_methods_error {
            return Err(api_error((503, Value::Null)));
        }
        Ok(state.cards.clone())
    }

    async fn get_bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        let state = self.state();
        if state.payment_methods_error {
            return Err(api_error((503, Value::Null)));
        }
        Ok(state.bank_accounts.clone())
    }

    async fn get_ewallet(&self) -> ApiResult<Option<EWallet>> {
        Ok(self.state().ewallet.clone())
    }
}

impl EmailApi for FakeBackend {
    async fn get_emails(&self) -> ApiResult<Vec<EmailMessage>> {
        let state = self.state();
        if state.email_error {
            return Err(api_error((500, Value::Null)));
        }
        Ok(state.emails.clone())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Cart item with `quantity` units of a listing priced `price` with `stock`
/// units available. A campaign price also sets a campaign id.
pub fn cart_item(
    id: i64,
    price: i64,
    campaign_price: Option<i64>,
    quantity: u32,
    stock: u32,
) -> CartItem {
    CartItem {
        id: CartItemId::new(id),
        listing: Listing {
            id: ListingId::new(id * 10),
            title: format!("Listing {id}"),
            category: ListingCategory::Electronics,
            price: Decimal::from(price),
            campaign_price: campaign_price.map(Decimal::from),
            campaign_id: campaign_price.map(|_| CampaignId::new(1)),
            currency: CurrencyCode::TRY,
            quantity: Some(stock),
            seller: None,
            review_stats: None,
        },
        quantity,
        reserved_at: None,
        reservation_end_time: None,
        notes: None,
    }
}

pub fn credit_card(id: i64) -> CreditCard {
    CreditCard {
        id: CreditCardId::new(id),
        masked_card_number: "**** **** **** 4242".to_string(),
        card_holder_name: Some("Ayşe Yılmaz".to_string()),
        expiry_month: Some(12),
        expiry_year: Some(2028),
        is_default: false,
    }
}

pub fn bank_account(id: i64, iban: &str) -> BankAccount {
    BankAccount {
        id: BankAccountId::new(id),
        iban: iban.to_string(),
        bank_name: Some("Ziraat".to_string()),
        account_holder_name: None,
        is_default: false,
    }
}

pub fn ewallet(balance: i64, warning_limit: Option<i64>) -> EWallet {
    EWallet {
        balance: Decimal::from(balance),
        currency: CurrencyCode::TRY,
        spending_warning_limit: warning_limit.map(Decimal::from),
        spending_warning_enabled: true,
    }
}

pub fn email(id: i64, subject: &str, body: &str, sent_at: DateTime<Utc>) -> EmailMessage {
    EmailMessage {
        id: EmailId::new(id),
        subject: subject.to_string(),
        body: body.to_string(),
        sent_at,
        is_read: false,
    }
}
