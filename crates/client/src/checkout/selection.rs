//! Buyer choices collected by the wizard.

use std::collections::BTreeSet;

use secondhand_core::{AddressId, AgreementId, CreditCardId, OfferId, PaymentType};

use super::CheckoutError;
use crate::api::{BankAccount, CheckoutRequest, CreditCard, EWallet, PaymentVerificationRequest};

/// Everything the buyer picked while the wizard is open. Discarded on close
/// and after a successful order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutSelection {
    pub shipping_address_id: Option<AddressId>,
    /// Falls back to the shipping address when unset.
    pub billing_address_id: Option<AddressId>,
    pub payment_type: PaymentType,
    pub credit_card_id: Option<CreditCardId>,
    pub iban: Option<String>,
    pub verification_code: String,
    pub accepted_agreement_ids: BTreeSet<AgreementId>,
    pub notes: Option<String>,
    pub name: Option<String>,
    pub coupon_code: Option<String>,
    pub offer_id: Option<OfferId>,
}

/// Saved instruments loaded when the wizard opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentInstruments {
    pub cards: Vec<CreditCard>,
    pub bank_accounts: Vec<BankAccount>,
    pub ewallet: Option<EWallet>,
}

impl PaymentInstruments {
    /// Whether at least one instrument exists for `payment_type`.
    #[must_use]
    pub fn has_any(&self, payment_type: PaymentType) -> bool {
        match payment_type {
            PaymentType::CreditCard => !self.cards.is_empty(),
            PaymentType::Transfer => !self.bank_accounts.is_empty(),
            PaymentType::Ewallet => self.ewallet.is_some(),
        }
    }

    /// Card marked default, else the first one.
    #[must_use]
    pub fn default_card(&self) -> Option<&CreditCard> {
        self.cards
            .iter()
            .find(|card| card.is_default)
            .or_else(|| self.cards.first())
    }

    /// Bank account marked default, else the first one.
    #[must_use]
    pub fn default_bank_account(&self) -> Option<&BankAccount> {
        self.bank_accounts
            .iter()
            .find(|account| account.is_default)
            .or_else(|| self.bank_accounts.first())
    }
}

impl CheckoutSelection {
    /// Preselect the default card and bank account.
    pub fn preselect(&mut self, instruments: &PaymentInstruments) {
        self.credit_card_id = instruments.default_card().map(|card| card.id);
        self.iban = instruments
            .default_bank_account()
            .map(|account| account.iban.clone());
    }

    /// Whether an instrument is chosen for the selected payment type.
    #[must_use]
    pub fn payment_method_ready(&self, instruments: &PaymentInstruments) -> bool {
        match self.payment_type {
            PaymentType::CreditCard => self.credit_card_id.is_some(),
            PaymentType::Transfer => self.iban.as_deref().is_some_and(|iban| !iban.trim().is_empty()),
            PaymentType::Ewallet => instruments.ewallet.is_some(),
        }
    }

    /// Flip acceptance of an agreement. Returns whether it is now accepted.
    pub fn toggle_agreement(&mut self, id: AgreementId) -> bool {
        if self.accepted_agreement_ids.remove(&id) {
            false
        } else {
            self.accepted_agreement_ids.insert(id);
            true
        }
    }

    /// Body for the verification code request.
    #[must_use]
    pub fn verification_request(&self) -> PaymentVerificationRequest {
        PaymentVerificationRequest {
            transaction_type: self.payment_type,
            coupon_code: self.coupon_code.clone(),
            offer_id: self.offer_id,
        }
    }

    /// Body for the checkout call.
    ///
    /// # Errors
    ///
    /// Returns an error if the shipping address, the instrument for the
    /// chosen payment type or the verification code is missing.
    pub fn checkout_request(&self) -> Result<CheckoutRequest, CheckoutError> {
        let shipping = self
            .shipping_address_id
            .ok_or(CheckoutError::MissingShippingAddress)?;

        let code = self.verification_code.trim();
        if code.is_empty() {
            return Err(CheckoutError::MissingVerificationCode);
        }

        let (credit_card_id, iban) = match self.payment_type {
            PaymentType::CreditCard => (
                Some(
                    self.credit_card_id
                        .ok_or(CheckoutError::MissingPaymentMethod(self.payment_type))?,
                ),
                None,
            ),
            PaymentType::Transfer => (
                None,
                Some(
                    self.iban
                        .clone()
                        .filter(|iban| !iban.trim().is_empty())
                        .ok_or(CheckoutError::MissingPaymentMethod(self.payment_type))?,
                ),
            ),
            PaymentType::Ewallet => (None, None),
        };

        Ok(CheckoutRequest {
            shipping_address_id: shipping,
            billing_address_id: self.billing_address_id.unwrap_or(shipping),
            notes: self.notes.clone(),
            name: self.name.clone(),
            payment_type: self.payment_type,
            payment_verification_code: code.to_string(),
            agreements_accepted: !self.accepted_agreement_ids.is_empty(),
            accepted_agreement_ids: self.accepted_agreement_ids.iter().copied().collect(),
            coupon_code: self.coupon_code.clone(),
            offer_id: self.offer_id,
            credit_card_id,
            iban,
        })
    }
}
