//! Navigation seam.
//!
//! The checkout wizard moves the buyer to another screen after a successful
//! order. Front-ends decide what that means by implementing [`Navigator`].

use std::sync::{Mutex, PoisonError};

/// Screens the client can send the buyer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Past orders.
    OrderHistory,
    /// The cart page.
    Cart,
}

impl Route {
    /// Path of the route in the web front-end.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::OrderHistory => "/orders",
            Self::Cart => "/cart",
        }
    }
}

/// Something that can change the current screen.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that only logs the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: Route) {
        tracing::info!(path = route.path(), "Navigating");
    }
}

/// Navigator that remembers every route it was sent to.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    /// Routes visited so far, in order.
    #[must_use]
    pub fn visited(&self) -> Vec<Route> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}
