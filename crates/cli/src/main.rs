//! SecondHand CLI - Cart, reservation and checkout from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart with totals and reservation countdowns
//! shctl cart
//!
//! # Change a quantity (clamped to stock, 0 removes the item)
//! shctl cart set-quantity 42 3
//!
//! # Follow a reservation until it expires
//! shctl reservation watch 42
//!
//! # Read the in-app mailbox
//! shctl emails
//!
//! # Check out with a saved card, reading the code from the mailbox
//! shctl checkout place --shipping 3 --payment-type credit-card --code-from-inbox
//! ```
//!
//! # Environment Variables
//!
//! - `SECONDHAND_API_URL` - Backend base URL (required)
//! - `SECONDHAND_AUTH_TOKEN` - Bearer token
//! - `SENTRY_DSN` - Error tracking (optional)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secondhand_client::ClientConfig;
use secondhand_core::{CartItemId, PaymentType};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "shctl")]
#[command(author, version, about = "SecondHand marketplace client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart, or change it
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Reservation countdowns
    Reservation {
        #[command(subcommand)]
        action: ReservationAction,
    },
    /// List the in-app mailbox and the latest verification code
    Emails,
    /// Run the checkout wizard
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Set the quantity of a cart item
    SetQuantity {
        /// Cart item ID
        item_id: CartItemId,
        /// New quantity (0 removes the item)
        quantity: u32,
    },
}

#[derive(Subcommand)]
enum ReservationAction {
    /// Print the countdown every second until expiry or Ctrl+C
    Watch {
        /// Cart item ID
        item_id: CartItemId,
    },
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Email a payment verification code
    SendCode {
        /// `credit-card`, `transfer` or `ewallet`
        #[arg(short, long, default_value = "credit-card")]
        payment_type: PaymentType,

        /// Coupon to apply
        #[arg(long)]
        coupon: Option<String>,
    },
    /// Place an order
    Place(commands::checkout::PlaceArgs),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Send errors and warnings to Sentry as events, info and debug as breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let _sentry_guard = init_sentry(&config);

    // Quiet by default; the CLI prints its own output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "secondhand_client=warn,secondhand_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), commands::CliError> {
    let ctx = commands::Context::new(config)?;

    let result = match cli.command {
        Commands::Cart { action } => match action {
            None => commands::cart::show(&ctx).await,
            Some(CartAction::SetQuantity { item_id, quantity }) => {
                commands::cart::set_quantity(&ctx, item_id, quantity).await
            }
        },
        Commands::Reservation { action } => match action {
            ReservationAction::Watch { item_id } => commands::reservation::watch(&ctx, item_id).await,
        },
        Commands::Emails => commands::emails::list(&ctx).await,
        Commands::Checkout { action } => match action {
            CheckoutAction::SendCode {
                payment_type,
                coupon,
            } => commands::checkout::send_code(&ctx, payment_type, coupon).await,
            CheckoutAction::Place(args) => commands::checkout::place(&ctx, args).await,
        },
    };

    ctx.flush_notifications();
    result
}
