//! Four-step checkout wizard.
//!
//! # Flow
//!
//! ```text
//! Review (1) -> Address (2) -> Payment (3) -> Verify (4) -> order placed
//!                                                  |
//!                                                  +-> eWallet warning -> confirm | cancel
//! ```
//!
//! - Payment -> Verify only happens through
//!   [`CheckoutWizard::proceed_to_verification`], which emails a code first
//! - The wizard moves to Verify even when sending the code failed; the
//!   returned [`CodeDispatch`] tells the caller to offer a resend
//! - One idempotency key is generated per open and reused by every submit
//!   attempt, so retrying a failed checkout cannot create a second order
//! - Closing resets every wizard-local field

mod selection;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use secondhand_core::{
    AddressId, AgreementId, CartItem, CartTotals, CreditCardId, EmailId, Money, OfferId,
    PaymentType,
};

use crate::api::{Backend, OrderConfirmation};
use crate::error::ApiError;
use crate::inbox::Inbox;
use crate::navigate::{Navigator, Route};
use crate::notify::NotificationCenter;

pub use selection::{CheckoutSelection, PaymentInstruments};

/// Wizard steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CheckoutStep {
    #[default]
    Review = 1,
    Address = 2,
    Payment = 3,
    Verify = 4,
}

impl CheckoutStep {
    /// 1-based step number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Step before this one; `Review` stays put.
    #[must_use]
    pub const fn previous(self) -> Self {
        match self {
            Self::Review | Self::Address => Self::Review,
            Self::Payment => Self::Address,
            Self::Verify => Self::Payment,
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Review => "review",
            Self::Address => "address",
            Self::Payment => "payment",
            Self::Verify => "verify",
        };
        write!(f, "{} ({name})", self.number())
    }
}

/// Errors from wizard operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Checkout is not open")]
    NotOpen,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Choose a shipping address")]
    MissingShippingAddress,

    #[error("Choose a payment method for {0}")]
    MissingPaymentMethod(PaymentType),

    /// Payment -> Verify needs a verification code to be sent first.
    #[error("Continue to verification to receive your payment code")]
    VerificationRequired,

    #[error("Enter the verification code sent to your email")]
    MissingVerificationCode,

    #[error("Expected checkout step {expected}, wizard is at {actual}")]
    WrongStep {
        expected: CheckoutStep,
        actual: CheckoutStep,
    },

    /// Backend call failed. `message` was already shown as a notification.
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: ApiError,
    },
}

/// Result of a submit attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Order created; the wizard has been reset.
    Placed(OrderConfirmation),
    /// The eWallet total reached the buyer's warning limit. Nothing was sent;
    /// confirm or cancel the warning next.
    EWalletWarning { total: Money, limit: Money },
    /// A submit is already in flight.
    AlreadySubmitting,
}

/// Whether the verification email went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeDispatch {
    Sent,
    Failed { message: String },
}

impl CodeDispatch {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Wizard-local state. `Default` is the closed wizard.
#[derive(Debug, Default)]
struct WizardState {
    is_open: bool,
    step: CheckoutStep,
    selection: CheckoutSelection,
    cart: Vec<CartItem>,
    instruments: PaymentInstruments,
    inbox: Inbox,
    /// Emails already in the inbox when the last code was requested.
    emails_before_code: Option<HashSet<EmailId>>,
    idempotency_key: Option<String>,
    show_ewallet_warning: bool,
    is_sending_code: Arc<AtomicBool>,
    is_checking_out: Arc<AtomicBool>,
}

/// Holds a busy flag for the lifetime of an operation, including when the
/// operation's future is dropped halfway.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Checkout orchestration over a [`Backend`].
pub struct CheckoutWizard<B> {
    backend: B,
    notifications: Arc<NotificationCenter>,
    navigator: Arc<dyn Navigator>,
    state: WizardState,
}

impl<B> std::fmt::Debug for CheckoutWizard<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutWizard")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> CheckoutWizard<B> {
    /// Create a closed wizard.
    #[must_use]
    pub fn new(
        backend: B,
        notifications: Arc<NotificationCenter>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            backend,
            notifications,
            navigator,
            state: WizardState::default(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the wizard at step 1.
    ///
    /// Loads the cart and the saved payment instruments. Instruments that
    /// fail to load are logged and left empty.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the cart cannot be loaded; the wizard
    /// stays closed.
    #[instrument(skip(self))]
    pub async fn open_checkout_modal(&mut self) -> Result<(), CheckoutError> {
        self.state = WizardState::default();

        let cart = self
            .backend
            .get_cart()
            .await
            .map_err(|source| self.report(source))?;

        let cards = self.backend.get_credit_cards().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load credit cards");
            Vec::new()
        });
        let bank_accounts = self.backend.get_bank_accounts().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load bank accounts");
            Vec::new()
        });
        let ewallet = self.backend.get_ewallet().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load eWallet");
            None
        });

        let instruments = PaymentInstruments {
            cards,
            bank_accounts,
            ewallet,
        };
        self.state.selection.preselect(&instruments);
        self.state.instruments = instruments;
        self.state.cart = cart;
        self.state.idempotency_key = Some(Uuid::new_v4().to_string());
        self.state.is_open = true;

        debug!(
            items = self.state.cart.len(),
            cards = self.state.instruments.cards.len(),
            bank_accounts = self.state.instruments.bank_accounts.len(),
            has_ewallet = self.state.instruments.ewallet.is_some(),
            "Checkout opened"
        );
        Ok(())
    }

    /// Close the wizard and discard everything chosen so far.
    pub fn close_checkout_modal(&mut self) {
        self.state = WizardState::default();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Move forward one step.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`] leaving Review with an empty cart
    /// - [`CheckoutError::MissingShippingAddress`] leaving Address without one
    /// - [`CheckoutError::VerificationRequired`] at Payment; use
    ///   [`proceed_to_verification`](Self::proceed_to_verification)
    pub fn next_step(&mut self) -> Result<CheckoutStep, CheckoutError> {
        self.ensure_open()?;
        let next = match self.state.step {
            CheckoutStep::Review if self.state.cart.is_empty() => {
                return Err(CheckoutError::EmptyCart);
            }
            CheckoutStep::Review => CheckoutStep::Address,
            CheckoutStep::Address if self.state.selection.shipping_address_id.is_none() => {
                return Err(CheckoutError::MissingShippingAddress);
            }
            CheckoutStep::Address => CheckoutStep::Payment,
            CheckoutStep::Payment => return Err(CheckoutError::VerificationRequired),
            CheckoutStep::Verify => CheckoutStep::Verify,
        };
        self.state.step = next;
        Ok(next)
    }

    /// Move back one step. No-op at Review.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotOpen`] if the wizard is closed.
    pub fn previous_step(&mut self) -> Result<CheckoutStep, CheckoutError> {
        self.ensure_open()?;
        self.state.step = self.state.step.previous();
        Ok(self.state.step)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Choose the shipping address. Billing follows it unless set separately.
    pub fn select_shipping_address(&mut self, id: AddressId) {
        self.state.selection.shipping_address_id = Some(id);
    }

    pub fn select_billing_address(&mut self, id: AddressId) {
        self.state.selection.billing_address_id = Some(id);
    }

    /// Switch payment type. Hides a pending eWallet warning.
    pub fn set_payment_type(&mut self, payment_type: PaymentType) {
        self.state.selection.payment_type = payment_type;
        self.state.show_ewallet_warning = false;
    }

    pub fn select_credit_card(&mut self, id: CreditCardId) {
        self.state.selection.credit_card_id = Some(id);
    }

    pub fn select_iban(&mut self, iban: impl Into<String>) {
        self.state.selection.iban = Some(iban.into());
    }

    pub fn set_verification_code(&mut self, code: impl Into<String>) {
        self.state.selection.verification_code = code.into();
    }

    /// Flip acceptance of an agreement. Returns whether it is now accepted.
    pub fn toggle_agreement(&mut self, id: AgreementId) -> bool {
        self.state.selection.toggle_agreement(id)
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.state.selection.notes = notes;
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.state.selection.name = name;
    }

    pub fn set_coupon_code(&mut self, code: Option<String>) {
        self.state.selection.coupon_code = code;
    }

    pub fn set_offer_id(&mut self, id: Option<OfferId>) {
        self.state.selection.offer_id = id;
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    /// Totals of the cart loaded on open.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::compute(&self.state.cart)
    }

    /// Order total.
    #[must_use]
    pub fn calculate_total(&self) -> Money {
        self.totals().total_money()
    }

    /// Whether the current selection cannot be submitted.
    ///
    /// True with an empty cart, without a shipping address, when the chosen
    /// payment type has no saved instrument, or when the eWallet balance is
    /// below the total.
    #[must_use]
    pub fn proceed_disabled(&self) -> bool {
        let selection = &self.state.selection;
        let instruments = &self.state.instruments;

        if self.state.cart.is_empty()
            || selection.shipping_address_id.is_none()
            || !instruments.has_any(selection.payment_type)
        {
            return true;
        }

        selection.payment_type == PaymentType::Ewallet
            && instruments
                .ewallet
                .as_ref()
                .is_some_and(|wallet| wallet.balance < self.totals().total)
    }

    /// Whether an instrument is chosen for the selected payment type.
    #[must_use]
    pub fn payment_method_ready(&self) -> bool {
        self.state
            .selection
            .payment_method_ready(&self.state.instruments)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Ask the backend to email a verification code for the current
    /// selection.
    ///
    /// Success raises an info notification and refreshes the inbox in the
    /// background of the call (refresh errors are ignored). Failure raises
    /// an error notification and is reported as [`CodeDispatch::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotOpen`] if the wizard is closed.
    #[instrument(skip(self), fields(payment_type = %self.state.selection.payment_type))]
    pub async fn send_verification_code(&mut self) -> Result<CodeDispatch, CheckoutError> {
        self.ensure_open()?;
        let _sending = BusyGuard::acquire(&self.state.is_sending_code);

        if let Err(e) = self.state.inbox.refresh(&self.backend).await {
            debug!(error = %e, "Inbox refresh before sending code failed");
        }
        let seen = self.state.inbox.email_ids();

        let request = self.state.selection.verification_request();
        match self.backend.initiate_payment_verification(&request).await {
            Ok(()) => {
                info!("Verification code sent");
                self.state.emails_before_code = Some(seen);
                self.notifications
                    .info("A verification code has been sent to your email.");
                if let Err(e) = self.state.inbox.refresh(&self.backend).await {
                    debug!(error = %e, "Inbox refresh after sending code failed");
                }
                Ok(CodeDispatch::Sent)
            }
            Err(e) => {
                let message = e.user_message();
                warn!(error = %e, "Sending verification code failed");
                self.notifications.error(message.clone());
                Ok(CodeDispatch::Failed { message })
            }
        }
    }

    /// Send the verification code and move from Payment to Verify.
    ///
    /// The step changes even if sending failed; the buyer can resend from
    /// the Verify step.
    ///
    /// # Errors
    ///
    /// Returns an error if the wizard is not at Payment or no instrument is
    /// chosen for the payment type.
    pub async fn proceed_to_verification(&mut self) -> Result<CodeDispatch, CheckoutError> {
        self.ensure_open()?;
        self.ensure_step(CheckoutStep::Payment)?;
        if !self.payment_method_ready() {
            return Err(CheckoutError::MissingPaymentMethod(
                self.state.selection.payment_type,
            ));
        }

        let dispatch = self.send_verification_code().await?;
        self.state.step = CheckoutStep::Verify;
        Ok(dispatch)
    }

    /// Re-read the inbox and fill in the newest verification code, if any.
    ///
    /// Once a code has been requested, only emails that arrived after the
    /// request are considered.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotOpen`] if the wizard is closed, or the
    /// backend error if the inbox cannot be loaded.
    pub async fn fill_code_from_inbox(&mut self) -> Result<Option<String>, CheckoutError> {
        self.ensure_open()?;
        self.state
            .inbox
            .refresh(&self.backend)
            .await
            .map_err(|source| CheckoutError::Backend {
                message: source.user_message(),
                source,
            })?;

        let code = match &self.state.emails_before_code {
            Some(seen) => self.state.inbox.verification_code_excluding(seen),
            None => self.state.inbox.latest_verification_code(),
        };
        if let Some(code) = &code {
            self.state.selection.verification_code.clone_from(code);
        }
        Ok(code)
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Submit the order from the Verify step.
    ///
    /// Paying by eWallet at or above the wallet's warning limit stops at
    /// [`CheckoutOutcome::EWalletWarning`] without calling the backend.
    ///
    /// # Errors
    ///
    /// Returns validation errors for an incomplete selection, or the backend
    /// error (also raised as a notification). The wizard stays at Verify.
    #[instrument(skip(self))]
    pub async fn handle_checkout(&mut self) -> Result<CheckoutOutcome, CheckoutError> {
        self.ensure_open()?;
        self.ensure_step(CheckoutStep::Verify)?;

        if self.state.selection.payment_type == PaymentType::Ewallet
            && let Some(wallet) = &self.state.instruments.ewallet
        {
            let total = self.totals();
            if wallet.requires_spending_confirmation(total.total) {
                let limit = wallet.spending_warning_limit.unwrap_or(Decimal::ZERO);
                info!(total = %total.total, %limit, "eWallet spending warning");
                self.state.show_ewallet_warning = true;
                return Ok(CheckoutOutcome::EWalletWarning {
                    total: total.total_money(),
                    limit: Money::new(limit, wallet.currency),
                });
            }
        }

        self.submit().await
    }

    /// Submit after the buyer accepted the eWallet warning. The limit is not
    /// checked again.
    ///
    /// # Errors
    ///
    /// Same as [`handle_checkout`](Self::handle_checkout).
    #[instrument(skip(self))]
    pub async fn confirm_ewallet_warning_and_checkout(
        &mut self,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.ensure_open()?;
        self.ensure_step(CheckoutStep::Verify)?;
        self.state.show_ewallet_warning = false;
        self.submit().await
    }

    /// Decline the eWallet warning. Closes the wizard.
    pub fn cancel_ewallet_warning(&mut self) {
        self.close_checkout_modal();
    }

    async fn submit(&mut self) -> Result<CheckoutOutcome, CheckoutError> {
        let Some(_submitting) = BusyGuard::acquire(&self.state.is_checking_out) else {
            return Ok(CheckoutOutcome::AlreadySubmitting);
        };

        let request = self.state.selection.checkout_request()?;
        let key = self
            .state
            .idempotency_key
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        match self.backend.checkout(&request, &key).await {
            Ok(order) => {
                info!(order = %order.reference(), "Order placed");
                if let Err(e) = self.backend.clear_cart().await {
                    warn!(error = %e, "Clearing cart after checkout failed");
                }
                self.notifications
                    .success(format!("Order {} placed.", order.reference()));
                self.navigator.navigate(Route::OrderHistory);
                self.close_checkout_modal();
                Ok(CheckoutOutcome::Placed(order))
            }
            Err(source) => Err(self.report(source)),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.state.is_open
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.state.step
    }

    #[must_use]
    pub const fn selection(&self) -> &CheckoutSelection {
        &self.state.selection
    }

    /// Cart loaded when the wizard opened.
    #[must_use]
    pub fn cart(&self) -> &[CartItem] {
        &self.state.cart
    }

    #[must_use]
    pub const fn instruments(&self) -> &PaymentInstruments {
        &self.state.instruments
    }

    #[must_use]
    pub const fn inbox(&self) -> &Inbox {
        &self.state.inbox
    }

    /// Key sent with every submit since the wizard opened.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.state.idempotency_key.as_deref()
    }

    #[must_use]
    pub const fn show_ewallet_warning(&self) -> bool {
        self.state.show_ewallet_warning
    }

    #[must_use]
    pub fn is_sending_code(&self) -> bool {
        self.state.is_sending_code.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_checking_out(&self) -> bool {
        self.state.is_checking_out.load(Ordering::Acquire)
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    fn ensure_open(&self) -> Result<(), CheckoutError> {
        if self.state.is_open {
            Ok(())
        } else {
            Err(CheckoutError::NotOpen)
        }
    }

    fn ensure_step(&self, expected: CheckoutStep) -> Result<(), CheckoutError> {
        if self.state.step == expected {
            Ok(())
        } else {
            Err(CheckoutError::WrongStep {
                expected,
                actual: self.state.step,
            })
        }
    }

    fn report(&self, source: ApiError) -> CheckoutError {
        let message = source.user_message();
        self.notifications.error(message.clone());
        CheckoutError::Backend { message, source }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::navigate::RecordingNavigator;
    use crate::notify::NotificationLevel;
    use crate::testing::{FakeBackend, bank_account, cart_item, credit_card, email, ewallet};
    use chrono::Utc;
    use serde_json::json;

    struct Harness {
        wizard: CheckoutWizard<FakeBackend>,
        notifications: Arc<NotificationCenter>,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness(backend: FakeBackend) -> Harness {
        let notifications = Arc::new(NotificationCenter::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let wizard = CheckoutWizard::new(
            backend,
            Arc::clone(&notifications),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        Harness {
            wizard,
            notifications,
            navigator,
        }
    }

    /// Cart of one 300 item, quantity 2 (total 600), one saved card and a
    /// wallet with `balance` and warning limit 500.
    fn stocked_backend(balance: i64) -> FakeBackend {
        let backend = FakeBackend::default();
        backend.set_cart(vec![cart_item(1, 300, None, 2, 5)]);
        backend.set_cards(vec![credit_card(7)]);
        backend.set_ewallet(Some(ewallet(balance, Some(500))));
        backend
    }

    /// Drive an opened wizard to the Verify step.
    async fn to_verify(wizard: &mut CheckoutWizard<FakeBackend>, payment_type: PaymentType) {
        wizard.open_checkout_modal().await.unwrap();
        wizard.next_step().unwrap();
        wizard.select_shipping_address(AddressId::new(3));
        wizard.next_step().unwrap();
        wizard.set_payment_type(payment_type);
        wizard.proceed_to_verification().await.unwrap();
        wizard.set_verification_code("482913");
    }

    #[tokio::test]
    async fn test_open_loads_state_and_preselects_card() {
        let Harness { mut wizard, .. } = harness(stocked_backend(1000));

        wizard.open_checkout_modal().await.unwrap();

        assert!(wizard.is_open());
        assert_eq!(wizard.step(), CheckoutStep::Review);
        assert_eq!(wizard.cart().len(), 1);
        assert_eq!(wizard.selection().credit_card_id, Some(CreditCardId::new(7)));
        assert_eq!(wizard.calculate_total().amount, Decimal::from(600));
        assert!(wizard.idempotency_key().is_some());
    }

    #[tokio::test]
    async fn test_instrument_load_failure_leaves_lists_empty() {
        let backend = stocked_backend(1000);
        backend.fail_payment_methods();
        let Harness { mut wizard, .. } = harness(backend);

        wizard.open_checkout_modal().await.unwrap();

        assert!(wizard.instruments().cards.is_empty());
        assert!(wizard.instruments().ewallet.is_some());
    }

    #[tokio::test]
    async fn test_step_gating() {
        let Harness { mut wizard, .. } = harness(stocked_backend(1000));
        assert!(matches!(wizard.next_step(), Err(CheckoutError::NotOpen)));
        assert!(matches!(wizard.previous_step(), Err(CheckoutError::NotOpen)));
        assert!(matches!(
            wizard.fill_code_from_inbox().await,
            Err(CheckoutError::NotOpen)
        ));

        wizard.open_checkout_modal().await.unwrap();
        assert_eq!(wizard.previous_step().unwrap(), CheckoutStep::Review);
        assert_eq!(wizard.next_step().unwrap(), CheckoutStep::Address);
        assert!(matches!(
            wizard.next_step(),
            Err(CheckoutError::MissingShippingAddress)
        ));

        wizard.select_shipping_address(AddressId::new(3));
        assert_eq!(wizard.next_step().unwrap(), CheckoutStep::Payment);
        assert!(matches!(
            wizard.next_step(),
            Err(CheckoutError::VerificationRequired)
        ));
        assert_eq!(wizard.previous_step().unwrap(), CheckoutStep::Address);
    }

    #[tokio::test]
    async fn test_empty_cart_blocks_review() {
        let Harness { mut wizard, .. } = harness(FakeBackend::default());
        wizard.open_checkout_modal().await.unwrap();

        assert!(matches!(wizard.next_step(), Err(CheckoutError::EmptyCart)));
        assert!(wizard.proceed_disabled());
    }

    #[tokio::test]
    async fn test_proceed_disabled() {
        let backend = stocked_backend(100);
        let Harness { mut wizard, .. } = harness(backend);
        wizard.open_checkout_modal().await.unwrap();

        // No shipping address yet
        assert!(wizard.proceed_disabled());

        wizard.select_shipping_address(AddressId::new(3));
        assert!(!wizard.proceed_disabled());

        // No bank accounts saved
        wizard.set_payment_type(PaymentType::Transfer);
        assert!(wizard.proceed_disabled());

        // Wallet balance 100 below total 600
        wizard.set_payment_type(PaymentType::Ewallet);
        assert!(wizard.proceed_disabled());
    }

    #[tokio::test]
    async fn test_proceed_requires_instrument() {
        let backend = stocked_backend(1000);
        backend.set_cards(Vec::new());
        let Harness { mut wizard, .. } = harness(backend);
        wizard.open_checkout_modal().await.unwrap();
        wizard.next_step().unwrap();
        wizard.select_shipping_address(AddressId::new(3));
        wizard.next_step().unwrap();

        let err = wizard.proceed_to_verification().await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::MissingPaymentMethod(PaymentType::CreditCard)
        ));
        assert_eq!(wizard.step(), CheckoutStep::Payment);
        assert!(wizard.backend().verification_calls().is_empty());
    }

    #[tokio::test]
    async fn test_verification_sends_selected_type_and_reads_inbox() {
        let backend = stocked_backend(1000);
        backend.set_bank_accounts(vec![bank_account(1, "TR330006100519786457841326")]);
        let Harness {
            mut wizard,
            notifications,
            ..
        } = harness(backend);
        wizard.open_checkout_modal().await.unwrap();
        wizard.next_step().unwrap();
        wizard.select_shipping_address(AddressId::new(3));
        wizard.next_step().unwrap();
        wizard.set_payment_type(PaymentType::Transfer);
        wizard.set_coupon_code(Some("SPRING".to_string()));

        let dispatch = wizard.proceed_to_verification().await.unwrap();

        assert!(dispatch.is_sent());
        assert_eq!(wizard.step(), CheckoutStep::Verify);
        assert!(!wizard.is_sending_code());
        let calls = wizard.backend().verification_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].transaction_type, PaymentType::Transfer);
        assert_eq!(calls[0].coupon_code.as_deref(), Some("SPRING"));
        assert_eq!(notifications.active()[0].level, NotificationLevel::Info);

        wizard.backend().set_emails(vec![email(
            1,
            "Payment verification",
            "Your code is 482913",
            Utc::now(),
        )]);
        assert_eq!(
            wizard.fill_code_from_inbox().await.unwrap().as_deref(),
            Some("482913")
        );
        assert_eq!(wizard.selection().verification_code, "482913");
    }

    #[tokio::test]
    async fn test_code_from_before_the_request_is_ignored() {
        let backend = stocked_backend(1000);
        let now = Utc::now();
        backend.set_emails(vec![email(
            1,
            "Payment verification",
            "Your code is 111111",
            now - chrono::Duration::hours(2),
        )]);
        let Harness { mut wizard, .. } = harness(backend);
        wizard.open_checkout_modal().await.unwrap();
        wizard.next_step().unwrap();
        wizard.select_shipping_address(AddressId::new(3));
        wizard.next_step().unwrap();

        assert!(wizard.proceed_to_verification().await.unwrap().is_sent());

        assert_eq!(wizard.fill_code_from_inbox().await.unwrap(), None);
        assert!(wizard.selection().verification_code.is_empty());

        wizard.backend().set_emails(vec![
            email(2, "Payment verification", "Your code is 482913", now),
            email(
                1,
                "Payment verification",
                "Your code is 111111",
                now - chrono::Duration::hours(2),
            ),
        ]);
        assert_eq!(
            wizard.fill_code_from_inbox().await.unwrap().as_deref(),
            Some("482913")
        );
        assert_eq!(wizard.selection().verification_code, "482913");
    }

    #[tokio::test]
    async fn test_failed_send_still_advances() {
        let backend = stocked_backend(1000);
        backend.fail_verification(503, json!({"error": "Mail service unavailable"}));
        let Harness {
            mut wizard,
            notifications,
            ..
        } = harness(backend);
        wizard.open_checkout_modal().await.unwrap();
        wizard.next_step().unwrap();
        wizard.select_shipping_address(AddressId::new(3));
        wizard.next_step().unwrap();

        let dispatch = wizard.proceed_to_verification().await.unwrap();

        assert_eq!(
            dispatch,
            CodeDispatch::Failed {
                message: "Mail service unavailable".to_string()
            }
        );
        assert_eq!(wizard.step(), CheckoutStep::Verify);
        assert!(!wizard.is_sending_code());
        let active = notifications.active();
        assert_eq!(active[0].level, NotificationLevel::Error);
        assert_eq!(active[0].message, "Mail service unavailable");
    }

    #[tokio::test]
    async fn test_checkout_success() {
        let Harness {
            mut wizard,
            notifications,
            navigator,
        } = harness(stocked_backend(1000));
        to_verify(&mut wizard, PaymentType::CreditCard).await;
        let key = wizard.idempotency_key().unwrap().to_string();

        let outcome = wizard.handle_checkout().await.unwrap();

        let CheckoutOutcome::Placed(order) = outcome else {
            panic!("expected order, got {outcome:?}");
        };
        assert_eq!(order.reference(), "SH-500");

        let calls = wizard.backend().checkout_calls();
        assert_eq!(calls.len(), 1);
        let (request, sent_key) = &calls[0];
        assert_eq!(sent_key, &key);
        assert_eq!(request.shipping_address_id, AddressId::new(3));
        assert_eq!(request.billing_address_id, AddressId::new(3));
        assert_eq!(request.credit_card_id, Some(CreditCardId::new(7)));
        assert_eq!(request.payment_verification_code, "482913");

        assert_eq!(wizard.backend().cart_clears(), 1);
        assert_eq!(navigator.visited(), vec![Route::OrderHistory]);
        assert!(
            notifications
                .active()
                .iter()
                .any(|n| n.level == NotificationLevel::Success)
        );
        assert!(!wizard.is_open());
        assert_eq!(wizard.step(), CheckoutStep::Review);
    }

    #[tokio::test]
    async fn test_checkout_failure_keeps_verify_step_and_key() {
        let backend = stocked_backend(1000);
        backend.fail_checkout(400, json!({"message": "Invalid verification code"}));
        let Harness {
            mut wizard,
            notifications,
            navigator,
        } = harness(backend);
        to_verify(&mut wizard, PaymentType::CreditCard).await;

        let err = wizard.handle_checkout().await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid verification code");
        assert_eq!(wizard.step(), CheckoutStep::Verify);
        assert!(!wizard.is_checking_out());
        assert!(navigator.visited().is_empty());
        assert!(
            notifications
                .active()
                .iter()
                .any(|n| n.message == "Invalid verification code")
        );

        // Retry reuses the same key
        let _ = wizard.handle_checkout().await;
        let calls = wizard.backend().checkout_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, calls[1].1);
    }

    #[tokio::test]
    async fn test_missing_code_is_not_submitted() {
        let Harness { mut wizard, .. } = harness(stocked_backend(1000));
        to_verify(&mut wizard, PaymentType::CreditCard).await;
        wizard.set_verification_code("");

        assert!(matches!(
            wizard.handle_checkout().await,
            Err(CheckoutError::MissingVerificationCode)
        ));
        assert!(wizard.backend().checkout_calls().is_empty());
        assert!(!wizard.is_checking_out());
    }

    #[tokio::test]
    async fn test_ewallet_warning_then_confirm() {
        let Harness { mut wizard, .. } = harness(stocked_backend(1000));
        to_verify(&mut wizard, PaymentType::Ewallet).await;

        let outcome = wizard.handle_checkout().await.unwrap();

        assert_eq!(
            outcome,
            CheckoutOutcome::EWalletWarning {
                total: Money::new(Decimal::from(600), secondhand_core::CurrencyCode::TRY),
                limit: Money::new(Decimal::from(500), secondhand_core::CurrencyCode::TRY),
            }
        );
        assert!(wizard.show_ewallet_warning());
        assert!(wizard.backend().checkout_calls().is_empty());

        let outcome = wizard.confirm_ewallet_warning_and_checkout().await.unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Placed(_)));
        assert_eq!(wizard.backend().checkout_calls().len(), 1);
        assert_eq!(
            wizard.backend().checkout_calls()[0].0.payment_type,
            PaymentType::Ewallet
        );
    }

    #[tokio::test]
    async fn test_ewallet_below_limit_skips_warning() {
        let backend = stocked_backend(1000);
        backend.set_cart(vec![cart_item(1, 200, None, 2, 5)]);
        let Harness { mut wizard, .. } = harness(backend);
        to_verify(&mut wizard, PaymentType::Ewallet).await;

        let outcome = wizard.handle_checkout().await.unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Placed(_)));
        assert!(!wizard.show_ewallet_warning());
    }

    #[tokio::test]
    async fn test_cancel_ewallet_warning_closes() {
        let Harness { mut wizard, .. } = harness(stocked_backend(1000));
        to_verify(&mut wizard, PaymentType::Ewallet).await;
        wizard.handle_checkout().await.unwrap();

        wizard.cancel_ewallet_warning();

        assert!(!wizard.is_open());
        assert!(!wizard.show_ewallet_warning());
        assert!(wizard.backend().checkout_calls().is_empty());
    }

    #[tokio::test]
    async fn test_close_resets_everything() {
        let Harness { mut wizard, .. } = harness(stocked_backend(1000));

        for steps in 0..4 {
            wizard.open_checkout_modal().await.unwrap();
            let first_key = wizard.idempotency_key().unwrap().to_string();
            wizard.toggle_agreement(AgreementId::new(1));
            wizard.set_notes(Some("Leave at the door".to_string()));
            if steps >= 1 {
                wizard.next_step().unwrap();
                wizard.select_shipping_address(AddressId::new(3));
            }
            if steps >= 2 {
                wizard.next_step().unwrap();
                wizard.set_payment_type(PaymentType::Ewallet);
            }
            if steps >= 3 {
                wizard.proceed_to_verification().await.unwrap();
                wizard.set_verification_code("111111");
                wizard.handle_checkout().await.unwrap();
            }

            wizard.close_checkout_modal();

            assert_eq!(wizard.step(), CheckoutStep::Review);
            assert_eq!(wizard.selection(), &CheckoutSelection::default());
            assert!(!wizard.is_open());
            assert!(!wizard.show_ewallet_warning());
            assert!(wizard.idempotency_key().is_none());
            assert!(wizard.cart().is_empty());

            wizard.open_checkout_modal().await.unwrap();
            assert_ne!(wizard.idempotency_key().unwrap(), first_key);
            wizard.close_checkout_modal();
        }
    }

    #[tokio::test]
    async fn test_submit_flag_blocks_second_submit() {
        let Harness { mut wizard, .. } = harness(stocked_backend(1000));
        to_verify(&mut wizard, PaymentType::CreditCard).await;

        let held = BusyGuard::acquire(&wizard.state.is_checking_out).unwrap();
        assert!(wizard.is_checking_out());
        assert_eq!(
            wizard.handle_checkout().await.unwrap(),
            CheckoutOutcome::AlreadySubmitting
        );
        assert!(wizard.backend().checkout_calls().is_empty());

        drop(held);
        assert!(!wizard.is_checking_out());
        assert!(matches!(
            wizard.handle_checkout().await.unwrap(),
            CheckoutOutcome::Placed(_)
        ));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(CheckoutStep::Verify.to_string(), "4 (verify)");
        assert_eq!(CheckoutStep::Review.number(), 1);
    }
}
