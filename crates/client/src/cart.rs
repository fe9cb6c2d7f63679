//! Cart state and reservation countdowns.
//!
//! [`CartManager`] holds the latest cart snapshot, applies the stock clamp
//! before quantity updates and re-fetches after every mutation. Each cart
//! item gets at most one [`ReservationTimer`].

use std::collections::HashMap;
use std::sync::Arc;

use secondhand_core::{
    CartItem, CartItemId, CartTotals, QuantityClamp, ReservationStatus, clamp_quantity,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::api::CartApi;
use crate::clock::Clock;
use crate::error::ApiError;
use crate::notify::NotificationCenter;
use crate::reservation::ReservationTimer;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The item is not in the current snapshot.
    #[error("Cart item {0} not found")]
    UnknownItem(CartItemId),

    /// Backend call failed.
    #[error("{message}")]
    Backend {
        /// Message shown to the buyer.
        message: String,
        #[source]
        source: ApiError,
    },
}

/// Outcome of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// Quantity set (possibly clamped to stock).
    Updated(QuantityClamp),
    /// Zero requested or nothing left in stock, item removed.
    Removed,
}

/// Client-side cart state.
pub struct CartManager<B> {
    backend: B,
    notifications: Arc<NotificationCenter>,
    clock: Arc<dyn Clock>,
    reservation_timeout: chrono::Duration,
    items: Vec<CartItem>,
    timers: HashMap<CartItemId, ReservationTimer>,
}

impl<B> std::fmt::Debug for CartManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("items", &self.items.len())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl<B: CartApi> CartManager<B> {
    /// Create an empty manager. Call [`refresh`](Self::refresh) to load.
    #[must_use]
    pub fn new(
        backend: B,
        notifications: Arc<NotificationCenter>,
        clock: Arc<dyn Clock>,
        reservation_timeout: chrono::Duration,
    ) -> Self {
        Self {
            backend,
            notifications,
            clock,
            reservation_timeout,
            items: Vec::new(),
            timers: HashMap::new(),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Totals for the current snapshot.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::compute(&self.items)
    }

    /// Number of units in the cart.
    #[must_use]
    pub fn cart_count(&self) -> u32 {
        self.totals().item_count
    }

    /// The backend this manager talks to.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Re-fetch the cart and reconcile reservation timers.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the previous snapshot is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<(), CartError> {
        let items = self
            .backend
            .get_cart()
            .await
            .map_err(|source| self.report(source))?;
        self.replace_items(items);
        Ok(())
    }

    /// Change the quantity of an item.
    ///
    /// Requests above the listing's stock are clamped: the backend receives
    /// exactly the stock figure and a warning is raised. Listings without a
    /// stock figure are not clamped. Zero, requested or clamped to, removes
    /// the item.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownItem`] for items not in the snapshot, or
    /// the backend error (also raised as a notification).
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &mut self,
        item_id: CartItemId,
        requested: u32,
    ) -> Result<QuantityUpdate, CartError> {
        if requested == 0 {
            self.remove_item(item_id).await?;
            return Ok(QuantityUpdate::Removed);
        }

        let item = self
            .items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or(CartError::UnknownItem(item_id))?;
        let clamp = clamp_quantity(requested, item.listing.quantity);

        if clamp.quantity() == 0 {
            warn!(%item_id, requested, "Listing out of stock, removing item");
            self.notifications.warning(format!(
                "\"{}\" is out of stock and was removed from your cart.",
                item.listing.title
            ));
            self.remove_item(item_id).await?;
            return Ok(QuantityUpdate::Removed);
        }

        if let QuantityClamp::Clamped { requested, max } = clamp {
            warn!(%item_id, requested, max, "Quantity clamped to stock");
            self.notifications.warning(format!(
                "Only {max} of \"{}\" available; quantity set to {max}.",
                item.listing.title
            ));
        }

        self.backend
            .update_quantity(item_id, clamp.quantity())
            .await
            .map_err(|source| self.report(source))?;

        if let Some(item) = self.items.iter_mut().find(|item| item.id == item_id) {
            item.quantity = clamp.quantity();
        }
        self.refetch_after_mutation().await;

        Ok(QuantityUpdate::Updated(clamp))
    }

    /// Remove one item.
    ///
    /// # Errors
    ///
    /// Returns the backend error (also raised as a notification).
    #[instrument(skip(self))]
    pub async fn remove_item(&mut self, item_id: CartItemId) -> Result<(), CartError> {
        if !self.items.iter().any(|item| item.id == item_id) {
            return Err(CartError::UnknownItem(item_id));
        }

        self.backend
            .remove_item(item_id)
            .await
            .map_err(|source| self.report(source))?;

        self.items.retain(|item| item.id != item_id);
        self.timers.remove(&item_id);
        info!(%item_id, "Removed cart item");
        self.refetch_after_mutation().await;
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the backend error (also raised as a notification).
    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.backend
            .clear_cart()
            .await
            .map_err(|source| self.report(source))?;
        self.replace_items(Vec::new());
        Ok(())
    }

    /// Subscribe to the reservation countdown of an item.
    ///
    /// Reuses the item's timer if one is already running. Returns `None`
    /// for items not in the snapshot.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime when the item holds a reservation.
    pub fn watch_reservation(
        &mut self,
        item_id: CartItemId,
    ) -> Option<watch::Receiver<ReservationStatus>> {
        let window = self
            .items
            .iter()
            .find(|item| item.id == item_id)?
            .reservation_window(self.reservation_timeout);

        let timer = self
            .timers
            .entry(item_id)
            .or_insert_with(|| ReservationTimer::start(window, Arc::clone(&self.clock)));
        Some(timer.subscribe())
    }

    /// Reservation status of an item right now, without starting a timer.
    #[must_use]
    pub fn reservation_status(&self, item_id: CartItemId) -> Option<ReservationStatus> {
        let item = self.items.iter().find(|item| item.id == item_id)?;
        if let Some(timer) = self.timers.get(&item_id) {
            return Some(timer.status());
        }
        Some(
            item.reservation_window(self.reservation_timeout)
                .map_or_else(ReservationStatus::unreserved, |window| {
                    window.status_at(self.clock.now())
                }),
        )
    }

    /// Number of live countdown timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    fn replace_items(&mut self, items: Vec<CartItem>) {
        self.timers
            .retain(|id, _| items.iter().any(|item| item.id == *id));
        for item in &items {
            if let Some(timer) = self.timers.get_mut(&item.id) {
                timer.retarget(item.reservation_window(self.reservation_timeout));
            }
        }
        self.items = items;
    }

    /// Reconcile with the backend after a mutation. The local snapshot was
    /// already updated, so a failed re-fetch is only logged.
    async fn refetch_after_mutation(&mut self) {
        match self.backend.get_cart().await {
            Ok(items) => self.replace_items(items),
            Err(e) => warn!(error = %e, "Cart re-fetch after mutation failed"),
        }
    }

    fn report(&self, source: ApiError) -> CartError {
        let message = source.user_message();
        self.notifications.error(message.clone());
        CartError::Backend { message, source }
    }
}
