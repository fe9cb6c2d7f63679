//! Notification center.
//!
//! Toast-style messages raised by the cart manager and checkout wizard. The
//! center is an explicit service handed to each component (no global
//! state): components push, front-ends subscribe to the broadcast stream or
//! read the active list. With a TTL, expired notifications drop out of the
//! active list on the next read or push.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};

const CHANNEL_CAPACITY: usize = 64;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A message shown to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Shared notification service.
pub struct NotificationCenter {
    next_id: AtomicU64,
    active: Mutex<Vec<Notification>>,
    sender: broadcast::Sender<Notification>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("active", &self.active().len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NotificationCenter {
    /// Create a center. With a `ttl`, [`prune_expired`](Self::prune_expired)
    /// drops notifications older than it.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a center reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            active: Mutex::new(Vec::new()),
            sender,
            ttl,
            clock,
        }
    }

    /// Subscribe to new notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Raise a notification and return its id.
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            level,
            message: message.into(),
            created_at: self.clock.now(),
        };
        let id = notification.id;

        let mut active = self.lock();
        self.retain_fresh(&mut active);
        active.push(notification.clone());
        drop(active);
        // No subscribers is fine; the active list still holds it
        let _ = self.sender.send(notification);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.notify(NotificationLevel::Success, message)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.notify(NotificationLevel::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.notify(NotificationLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.notify(NotificationLevel::Error, message)
    }

    /// Dismiss a notification. Returns whether it was still active.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut active = self.lock();
        let before = active.len();
        active.retain(|n| n.id != id);
        active.len() != before
    }

    /// Drop notifications older than the TTL. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        self.retain_fresh(&mut self.lock())
    }

    /// Currently visible notifications, oldest first.
    #[must_use]
    pub fn active(&self) -> Vec<Notification> {
        let mut active = self.lock();
        self.retain_fresh(&mut active);
        active.clone()
    }

    fn retain_fresh(&self, active: &mut Vec<Notification>) -> usize {
        let Some(ttl) = self.ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()) else {
            return 0;
        };
        let now = self.clock.now();
        let before = active.len();
        active.retain(|n| n.created_at + ttl > now);
        before - active.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
