//! Display helpers for money, dates and countdowns.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::reservation::Countdown;
use crate::types::CurrencyCode;

/// Format an amount with its currency symbol, thousands separators and two
/// decimals (e.g. `₺1,234.50`).
#[must_use]
pub fn format_money(amount: Decimal, currency: CurrencyCode) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", rounded.abs());
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    format!(
        "{sign}{}{}.{fraction}",
        currency.symbol(),
        group_thousands(whole)
    )
}

fn group_thousands(whole: &str) -> String {
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Short date, e.g. `16 Oct 2026`.
#[must_use]
pub fn format_date(dt: DateTime<Utc>) -> String {
    dt.format("%-d %b %Y").to_string()
}

/// Date with time of day, e.g. `16 Oct 2026 14:05`.
#[must_use]
pub fn format_date_time(dt: DateTime<Utc>) -> String {
    dt.format("%-d %b %Y %H:%M").to_string()
}

/// Countdown as `MM:SS`.
#[must_use]
pub fn format_countdown(remaining: Countdown) -> String {
    format!("{:02}:{:02}", remaining.minutes, remaining.seconds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money_groups_thousands() {
        assert_eq!(
            format_money(Decimal::new(123_450, 2), CurrencyCode::TRY),
            "₺1,234.50"
        );
        assert_eq!(
            format_money(Decimal::new(1_000_000, 0), CurrencyCode::USD),
            "$1,000,000.00"
        );
    }

    #[test]
    fn test_format_money_small_and_negative() {
        assert_eq!(format_money(Decimal::new(99, 2), CurrencyCode::USD), "$0.99");
        assert_eq!(format_money(Decimal::new(-5, 0), CurrencyCode::EUR), "-€5.00");
        assert_eq!(format_money(Decimal::new(12_345, 3), CurrencyCode::GBP), "£12.35");
    }

    #[test]
    fn test_format_dates() {
        let dt = DateTime::parse_from_rfc3339("2026-10-16T14:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_date(dt), "16 Oct 2026");
        assert_eq!(format_date_time(dt), "16 Oct 2026 14:05");
    }

    #[test]
    fn test_format_countdown_pads() {
        assert_eq!(
            format_countdown(Countdown {
                minutes: 1,
                seconds: 5
            }),
            "01:05"
        );
    }
}
