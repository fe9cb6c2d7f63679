//! Live reservation countdown.

use secondhand_core::CartItemId;

use super::cart::describe_reservation;
use super::{CliError, Context};

/// Print the countdown of one item until it expires or Ctrl+C is pressed.
#[allow(clippy::print_stdout)]
pub async fn watch(ctx: &Context, item_id: CartItemId) -> Result<(), CliError> {
    let mut cart = ctx.cart_manager();
    cart.refresh().await?;

    let mut status = cart
        .watch_reservation(item_id)
        .ok_or(CliError::UnknownItem(item_id))?;

    loop {
        let current = *status.borrow_and_update();
        if !current.is_reserved {
            println!("Item {item_id} is not reserved.");
            return Ok(());
        }
        println!("{}", describe_reservation(&current));
        if current.is_expired {
            return Ok(());
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                return Ok(());
            }
        }
    }
}
