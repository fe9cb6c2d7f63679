//! In-app mailbox.
//!
//! Payment verification codes are emailed. The inbox lets the buyer read the
//! code without leaving the client.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use secondhand_core::EmailId;
use tracing::debug;

use crate::api::{EmailApi, EmailMessage};
use crate::error::ApiResult;

/// Standalone run of 4-8 digits.
static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4,8})\b").expect("Invalid regex"));

/// Words marking an email as a verification email (lowercase).
const VERIFICATION_KEYWORDS: &[&str] = &["verification", "verify", "doğrulama", "code", "kod"];

/// Most recent emails, newest first.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    emails: Vec<EmailMessage>,
}

impl Inbox {
    /// Replace the contents with the latest emails from the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the previous contents are kept.
    pub async fn refresh(&mut self, api: &impl EmailApi) -> ApiResult<usize> {
        let mut emails = api.get_emails().await?;
        emails.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        debug!(count = emails.len(), "Inbox refreshed");
        self.emails = emails;
        Ok(self.emails.len())
    }

    /// Emails, newest first.
    #[must_use]
    pub fn emails(&self) -> &[EmailMessage] {
        &self.emails
    }

    /// Unread email count.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.emails.iter().filter(|e| !e.is_read).count()
    }

    /// Code from the newest verification email, if any.
    #[must_use]
    pub fn latest_verification_code(&self) -> Option<String> {
        self.verification_code_excluding(&HashSet::new())
    }

    /// Code from the newest verification email whose id is not in `seen`.
    #[must_use]
    pub fn verification_code_excluding(&self, seen: &HashSet<EmailId>) -> Option<String> {
        self.emails
            .iter()
            .filter(|email| !seen.contains(&email.id) && is_verification_email(email))
            .find_map(extract_code)
    }

    /// Ids of the emails currently held.
    #[must_use]
    pub fn email_ids(&self) -> HashSet<EmailId> {
        self.emails.iter().map(|email| email.id).collect()
    }
}

fn is_verification_email(email: &EmailMessage) -> bool {
    let subject = email.subject.to_lowercase();
    let body = email.body.to_lowercase();
    VERIFICATION_KEYWORDS
        .iter()
        .any(|keyword| subject.contains(keyword) || body.contains(keyword))
}

/// First code in the subject or body, preferring six-digit codes.
fn extract_code(email: &EmailMessage) -> Option<String> {
    let candidates: Vec<&str> = CODE_PATTERN
        .captures_iter(&email.subject)
        .chain(CODE_PATTERN.captures_iter(&email.body))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    candidates
        .iter()
        .find(|code| code.len() == 6)
        .or_else(|| candidates.first())
        .map(|code| (*code).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, email};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_latest_code_comes_from_newest_verification_email() {
        let now = Utc::now();
        let backend = FakeBackend::default();
        backend.set_emails(vec![
            email(1, "Payment verification", "Your code is 111111", now - Duration::minutes(10)),
            email(2, "Weekly deals", "Save 2026 lira today", now - Duration::minutes(1)),
            email(3, "Payment verification", "Your code is 482913", now - Duration::minutes(2)),
        ]);

        let mut inbox = Inbox::default();
        assert_eq!(inbox.refresh(&backend).await.unwrap(), 3);

        assert_eq!(inbox.emails()[0].subject, "Weekly deals");
        assert_eq!(inbox.latest_verification_code().as_deref(), Some("482913"));
    }

    #[test]
    fn test_prefers_six_digit_codes() {
        let message = email(
            1,
            "Doğrulama kodu",
            "Sipariş 2026-10 için kodunuz: 903112",
            Utc::now(),
        );
        assert_eq!(extract_code(&message).as_deref(), Some("903112"));
    }

    #[test]
    fn test_seen_emails_are_skipped() {
        let now = Utc::now();
        let mut inbox = Inbox {
            emails: vec![email(
                1,
                "Payment verification",
                "Your code is 111111",
                now - Duration::hours(2),
            )],
        };
        let seen = inbox.email_ids();
        assert!(inbox.verification_code_excluding(&seen).is_none());

        inbox.emails.insert(
            0,
            email(2, "Payment verification", "Your code is 482913", now),
        );
        assert_eq!(
            inbox.verification_code_excluding(&seen).as_deref(),
            Some("482913")
        );
    }

    #[test]
    fn test_no_code() {
        let inbox = Inbox {
            emails: vec![email(1, "Verify your email", "Click the link", Utc::now())],
        };
        assert!(inbox.latest_verification_code().is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_contents() {
        let backend = FakeBackend::default();
        backend.set_emails(vec![email(1, "Verification", "1234", Utc::now())]);
        let mut inbox = Inbox::default();
        inbox.refresh(&backend).await.unwrap();

        backend.fail_emails();
        assert!(inbox.refresh(&backend).await.is_err());
        assert_eq!(inbox.emails().len(), 1);
        assert_eq!(inbox.unread(), 1);
    }
}
