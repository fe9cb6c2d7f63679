//! Non-interactive checkout.
//!
//! # Usage
//!
//! ```bash
//! # Email a verification code
//! shctl checkout send-code --payment-type transfer
//!
//! # Place an order, typing the emailed code when asked
//! shctl checkout place --shipping 3 --payment-type credit-card --card 7
//!
//! # Pay from the eWallet, reading the code from the in-app mailbox
//! shctl checkout place --shipping 3 --payment-type ewallet --code-from-inbox --confirm-ewallet
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use secondhand_client::{
    CheckoutOutcome, CheckoutWizard, CodeDispatch, HttpBackend, LogNavigator,
};
use secondhand_core::{AddressId, AgreementId, CreditCardId, OfferId, PaymentType};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{CliError, Context};

const INBOX_ATTEMPTS: u32 = 10;
const INBOX_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Arguments for `checkout place`.
#[derive(Debug, clap::Args)]
pub struct PlaceArgs {
    /// Shipping address ID
    #[arg(long)]
    pub shipping: AddressId,

    /// Billing address ID (defaults to the shipping address)
    #[arg(long)]
    pub billing: Option<AddressId>,

    /// `credit-card`, `transfer` or `ewallet`
    #[arg(short, long, default_value = "credit-card")]
    pub payment_type: PaymentType,

    /// Saved card to charge (defaults to the default card)
    #[arg(long)]
    pub card: Option<CreditCardId>,

    /// IBAN to debit (defaults to the default bank account)
    #[arg(long)]
    pub iban: Option<String>,

    /// Accepted agreement ID, repeatable
    #[arg(long = "agreement")]
    pub agreements: Vec<AgreementId>,

    /// Order notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Name on the order
    #[arg(long)]
    pub name: Option<String>,

    /// Coupon to apply
    #[arg(long)]
    pub coupon: Option<String>,

    /// Accepted offer to buy against
    #[arg(long)]
    pub offer: Option<OfferId>,

    /// Read the verification code from the in-app mailbox instead of stdin
    #[arg(long)]
    pub code_from_inbox: bool,

    /// Pay even if the total reaches the eWallet spending-warning limit
    #[arg(long)]
    pub confirm_ewallet: bool,
}

fn wizard(ctx: &Context) -> CheckoutWizard<HttpBackend> {
    CheckoutWizard::new(
        ctx.backend.clone(),
        Arc::clone(&ctx.notifications),
        Arc::new(LogNavigator),
    )
}

/// Email a payment verification code.
pub async fn send_code(
    ctx: &Context,
    payment_type: PaymentType,
    coupon: Option<String>,
) -> Result<(), CliError> {
    let mut wizard = wizard(ctx);
    wizard.open_checkout_modal().await?;
    wizard.set_payment_type(payment_type);
    wizard.set_coupon_code(coupon);

    match wizard.send_verification_code().await? {
        CodeDispatch::Sent => Ok(()),
        CodeDispatch::Failed { message } => Err(CliError::Aborted(message)),
    }
}

/// Walk the wizard from review to a placed order.
#[allow(clippy::print_stdout)]
pub async fn place(ctx: &Context, args: PlaceArgs) -> Result<(), CliError> {
    let mut wizard = wizard(ctx);
    wizard.open_checkout_modal().await?;
    println!(
        "{} item(s), total {}",
        wizard.totals().item_count,
        wizard.calculate_total()
    );

    wizard.next_step()?;
    wizard.select_shipping_address(args.shipping);
    if let Some(billing) = args.billing {
        wizard.select_billing_address(billing);
    }
    wizard.next_step()?;

    wizard.set_payment_type(args.payment_type);
    if let Some(card) = args.card {
        wizard.select_credit_card(card);
    }
    if let Some(iban) = args.iban {
        wizard.select_iban(iban);
    }
    for agreement in args.agreements {
        wizard.toggle_agreement(agreement);
    }
    wizard.set_notes(args.notes);
    wizard.set_name(args.name);
    wizard.set_coupon_code(args.coupon);
    wizard.set_offer_id(args.offer);

    if wizard.proceed_disabled() {
        return Err(CliError::Aborted(format!(
            "Cannot pay by {} with the saved payment methods",
            args.payment_type
        )));
    }

    let dispatch = wizard.proceed_to_verification().await?;
    ctx.flush_notifications();
    if let CodeDispatch::Failed { message } = dispatch {
        tracing::warn!("Verification code was not sent ({message}); use a code from an earlier email");
    }

    let code = if args.code_from_inbox {
        poll_inbox(&mut wizard).await?
    } else {
        prompt("Verification code: ").await?
    };
    wizard.set_verification_code(code);

    let outcome = match wizard.handle_checkout().await? {
        CheckoutOutcome::EWalletWarning { total, limit } if args.confirm_ewallet => {
            println!("Total {total} reaches your eWallet warning limit of {limit}; paying anyway.");
            wizard.confirm_ewallet_warning_and_checkout().await?
        }
        CheckoutOutcome::EWalletWarning { total, limit } => {
            wizard.cancel_ewallet_warning();
            return Err(CliError::Aborted(format!(
                "Total {total} reaches your eWallet warning limit of {limit}. \
                 Rerun with --confirm-ewallet to pay."
            )));
        }
        outcome => outcome,
    };

    match outcome {
        CheckoutOutcome::Placed(order) => {
            println!("Order {} placed.", order.reference());
            Ok(())
        }
        CheckoutOutcome::AlreadySubmitting => {
            Err(CliError::Aborted("A checkout is already in progress".to_string()))
        }
        CheckoutOutcome::EWalletWarning { .. } => Err(CliError::Aborted(
            "eWallet spending warning was not confirmed".to_string(),
        )),
    }
}

async fn poll_inbox(wizard: &mut CheckoutWizard<HttpBackend>) -> Result<String, CliError> {
    for attempt in 1..=INBOX_ATTEMPTS {
        if let Some(code) = wizard.fill_code_from_inbox().await? {
            tracing::info!(attempt, "Verification code found in mailbox");
            return Ok(code);
        }
        tracing::debug!(attempt, "No verification code yet");
        tokio::time::sleep(INBOX_POLL_INTERVAL).await;
    }
    Err(CliError::Aborted(
        "No verification code arrived in the mailbox".to_string(),
    ))
}

#[allow(clippy::print_stdout)]
async fn prompt(label: &str) -> Result<String, CliError> {
    print!("{label}");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let code = line.trim().to_string();
    if code.is_empty() {
        return Err(CliError::Aborted("No verification code entered".to_string()));
    }
    Ok(code)
}
