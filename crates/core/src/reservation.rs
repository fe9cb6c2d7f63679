//! Reservation window and countdown status.
//!
//! A cart item holds stock for a limited time. The backend may send an
//! explicit `reservationEndTime`; otherwise the window is
//! `reservedAt + RESERVATION_TIMEOUT_MINUTES`. Expiry here is a display
//! concern only: the backend releases stock on its own schedule.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Fallback reservation length when the backend gives no end time.
pub const RESERVATION_TIMEOUT_MINUTES: i64 = 15;

/// Resolved stock hold for a single cart item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationWindow {
    end_time: DateTime<Utc>,
}

impl ReservationWindow {
    /// Window ending at `end_time`.
    #[must_use]
    pub const fn ending_at(end_time: DateTime<Utc>) -> Self {
        Self { end_time }
    }

    /// Resolve the end time from the backend fields.
    ///
    /// An explicit end time wins. Without one, `reserved_at + timeout` is
    /// used. Returns `None` when neither is present.
    #[must_use]
    pub fn resolve(
        reserved_at: Option<DateTime<Utc>>,
        reservation_end_time: Option<DateTime<Utc>>,
        timeout: Duration,
    ) -> Option<Self> {
        reservation_end_time
            .or_else(|| reserved_at.map(|start| start + timeout))
            .map(Self::ending_at)
    }

    /// End of the hold.
    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Countdown status at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> ReservationStatus {
        let diff = self.end_time - now;
        if diff <= Duration::zero() {
            return ReservationStatus::expired();
        }

        let total_seconds = diff.num_seconds();
        ReservationStatus {
            time_remaining: Some(Countdown {
                minutes: total_seconds / 60,
                seconds: total_seconds % 60,
            }),
            is_expired: false,
            is_reserved: true,
        }
    }
}

/// Whole minutes and seconds left on a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub minutes: i64,
    pub seconds: i64,
}

/// What a countdown display shows at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationStatus {
    /// Remaining time, `None` once expired or when nothing is reserved.
    pub time_remaining: Option<Countdown>,
    /// The hold has run out.
    pub is_expired: bool,
    /// A hold exists for this item.
    pub is_reserved: bool,
}

impl ReservationStatus {
    /// Status for an item with no reservation.
    #[must_use]
    pub const fn unreserved() -> Self {
        Self {
            time_remaining: None,
            is_expired: false,
            is_reserved: false,
        }
    }

    /// Status for a hold that has run out.
    #[must_use]
    pub const fn expired() -> Self {
        Self {
            time_remaining: None,
            is_expired: true,
            is_reserved: true,
        }
    }
}
