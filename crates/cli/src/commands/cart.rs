//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! shctl cart
//! shctl cart set-quantity 42 3
//! ```

use secondhand_client::QuantityUpdate;
use secondhand_core::format::{format_countdown, format_money};
use secondhand_core::{CartItemId, QuantityClamp, ReservationStatus};

use super::{CliError, Context};

/// Print the cart with effective prices, totals and reservation countdowns.
#[allow(clippy::print_stdout)]
pub async fn show(ctx: &Context) -> Result<(), CliError> {
    let mut cart = ctx.cart_manager();
    cart.refresh().await?;

    if cart.items().is_empty() {
        println!("Your cart is empty.");
        return Ok(());
    }

    for item in cart.items() {
        let listing = &item.listing;
        let price = if listing.has_active_campaign() {
            format!(
                "{} (was {})",
                item.effective_unit_price(),
                format_money(listing.price, listing.currency)
            )
        } else {
            item.effective_unit_price().to_string()
        };
        let reservation = cart
            .reservation_status(item.id)
            .map_or_else(String::new, |status| describe_reservation(&status));

        println!(
            "#{:<6} {} x{}  {}  = {}  {}",
            item.id.as_i64(),
            listing.title,
            item.quantity,
            price,
            item.line_total(),
            reservation
        );
    }

    let totals = cart.totals();
    println!();
    println!("Items:    {}", totals.item_count);
    println!(
        "Subtotal: {}",
        format_money(totals.original_total, totals.currency)
    );
    if !totals.discount.is_zero() {
        println!("Discount: -{}", totals.discount_money());
    }
    println!("Total:    {}", totals.total_money());
    Ok(())
}

/// Change the quantity of one item.
#[allow(clippy::print_stdout)]
pub async fn set_quantity(ctx: &Context, item_id: CartItemId, quantity: u32) -> Result<(), CliError> {
    let mut cart = ctx.cart_manager();
    cart.refresh().await?;

    match cart.update_quantity(item_id, quantity).await? {
        QuantityUpdate::Removed => println!("Removed item {item_id} from the cart."),
        QuantityUpdate::Updated(QuantityClamp::Accepted(quantity)) => {
            println!("Quantity of item {item_id} set to {quantity}.");
        }
        QuantityUpdate::Updated(QuantityClamp::Clamped { requested, max }) => {
            println!("Requested {requested}, but only {max} in stock; quantity set to {max}.");
        }
    }
    println!("Cart total: {}", cart.totals().total_money());
    Ok(())
}

pub(crate) fn describe_reservation(status: &ReservationStatus) -> String {
    match status.time_remaining {
        _ if !status.is_reserved => String::new(),
        Some(remaining) => format!("reserved {} left", format_countdown(remaining)),
        None => "reservation expired".to_string(),
    }
}
