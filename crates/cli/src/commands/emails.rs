//! In-app mailbox.

use secondhand_client::Inbox;
use secondhand_core::format::format_date_time;

use super::{CliError, Context};

/// List recent emails and the latest verification code.
#[allow(clippy::print_stdout)]
pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let mut inbox = Inbox::default();
    inbox.refresh(&ctx.backend).await?;

    if inbox.emails().is_empty() {
        println!("No emails.");
        return Ok(());
    }

    for email in inbox.emails() {
        let marker = if email.is_read { ' ' } else { '*' };
        println!(
            "{marker} {}  {}",
            format_date_time(email.sent_at),
            email.subject
        );
    }
    println!("{} unread", inbox.unread());

    if let Some(code) = inbox.latest_verification_code() {
        println!("Latest verification code: {code}");
    }
    Ok(())
}
