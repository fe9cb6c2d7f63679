//! Command implementations.

pub mod cart;
pub mod checkout;
pub mod emails;
pub mod reservation;

use std::sync::Arc;

use secondhand_client::{
    ApiError, CartError, CartManager, CheckoutError, ClientConfig, Clock, ConfigError,
    HttpBackend, NotificationCenter, NotificationLevel, SystemClock,
};
use secondhand_core::CartItemId;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("Cart item {0} not found")]
    UnknownItem(CartItemId),

    #[error("Could not read input: {0}")]
    Input(#[from] std::io::Error),

    /// The buyer declined or the order could not be completed.
    #[error("{0}")]
    Aborted(String),
}

/// Shared state for one command run.
pub struct Context {
    pub config: ClientConfig,
    pub backend: HttpBackend,
    pub notifications: Arc<NotificationCenter>,
    pub clock: Arc<dyn Clock>,
}

impl Context {
    pub fn new(config: ClientConfig) -> Result<Self, CliError> {
        let backend = HttpBackend::new(&config)?;
        let notifications = Arc::new(NotificationCenter::new(config.notification_ttl));
        Ok(Self {
            config,
            backend,
            notifications,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn cart_manager(&self) -> CartManager<HttpBackend> {
        CartManager::new(
            self.backend.clone(),
            Arc::clone(&self.notifications),
            Arc::clone(&self.clock),
            self.config.reservation_timeout,
        )
    }

    /// Print and dismiss pending notifications.
    #[allow(clippy::print_stdout, clippy::print_stderr)]
    pub fn flush_notifications(&self) {
        for notification in self.notifications.active() {
            match notification.level {
                NotificationLevel::Success | NotificationLevel::Info => {
                    println!("[{}] {}", notification.level, notification.message);
                }
                NotificationLevel::Warning | NotificationLevel::Error => {
                    eprintln!("[{}] {}", notification.level, notification.message);
                }
            }
            self.notifications.dismiss(notification.id);
        }
    }
}
