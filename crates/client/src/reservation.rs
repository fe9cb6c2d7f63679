//! Live reservation countdown.
//!
//! [`ReservationTimer`] is a scoped subscription: it owns a once-per-second
//! ticker that recomputes the [`ReservationStatus`] and publishes it through
//! a `watch` channel. The ticker is aborted when the window changes and when
//! the timer is dropped, so no interval outlives its owner. It also stops on
//! its own after publishing an expired status.

use std::sync::Arc;
use std::time::Duration;

use secondhand_core::{ReservationStatus, ReservationWindow};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::clock::Clock;

const TICK: Duration = Duration::from_secs(1);

/// Countdown for one reservation window.
pub struct ReservationTimer {
    window: Option<ReservationWindow>,
    clock: Arc<dyn Clock>,
    sender: Arc<watch::Sender<ReservationStatus>>,
    ticker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ReservationTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationTimer")
            .field("window", &self.window)
            .field("status", &*self.sender.borrow())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ReservationTimer {
    /// Start counting down `window`. `None` yields a permanently unreserved
    /// status and spawns nothing.
    ///
    /// # Panics
    ///
    /// Panics if `window` is `Some` and there is no Tokio runtime.
    #[must_use]
    pub fn start(window: Option<ReservationWindow>, clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = watch::channel(ReservationStatus::unreserved());
        let mut timer = Self {
            window: None,
            clock,
            sender: Arc::new(sender),
            ticker: None,
        };
        timer.run(window);
        timer
    }

    /// Switch to a different window.
    ///
    /// The current ticker is cancelled before a new one starts. Existing
    /// subscribers keep receiving updates. Same window is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `window` is `Some` and there is no Tokio runtime.
    pub fn retarget(&mut self, window: Option<ReservationWindow>) {
        if window == self.window {
            return;
        }
        self.run(window);
    }

    /// Receive every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReservationStatus> {
        self.sender.subscribe()
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> ReservationStatus {
        *self.sender.borrow()
    }

    /// Window being counted down.
    #[must_use]
    pub const fn window(&self) -> Option<ReservationWindow> {
        self.window
    }

    /// Whether the ticker task is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn run(&mut self, window: Option<ReservationWindow>) {
        self.stop();
        self.window = window;

        let Some(window) = window else {
            self.sender.send_replace(ReservationStatus::unreserved());
            return;
        };

        let initial = window.status_at(self.clock.now());
        self.sender.send_replace(initial);
        if initial.is_expired {
            return;
        }

        debug!(end_time = %window.end_time(), "Starting reservation ticker");
        self.ticker = Some(tokio::spawn(tick(
            window,
            Arc::clone(&self.clock),
            Arc::clone(&self.sender),
        )));
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for ReservationTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick(
    window: ReservationWindow,
    clock: Arc<dyn Clock>,
    sender: Arc<watch::Sender<ReservationStatus>>,
) {
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let status = window.status_at(clock.now());
        sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if status.is_expired {
            debug!(end_time = %window.end_time(), "Reservation expired");
            break;
        }
    }
}
