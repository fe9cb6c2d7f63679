//! SecondHand client library.
//!
//! Headless client for the SecondHand marketplace backend: cart state with
//! live reservation countdowns, and the four-step checkout wizard with email
//! payment verification.
//!
//! Front-ends plug in through three seams:
//! - [`api`] backend traits, implemented over HTTP by [`HttpBackend`]
//! - [`NotificationCenter`] for user-facing messages
//! - [`Navigator`] for screen changes after an order

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod error;
pub mod inbox;
pub mod navigate;
pub mod notify;
pub mod reservation;

#[cfg(test)]
mod testing;

pub use api::{Backend, HttpBackend};
pub use cart::{CartError, CartManager, QuantityUpdate};
pub use checkout::{CheckoutError, CheckoutOutcome, CheckoutStep, CheckoutWizard, CodeDispatch};
pub use clock::{Clock, SystemClock};
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use inbox::Inbox;
pub use navigate::{LogNavigator, Navigator, Route};
pub use notify::{Notification, NotificationCenter, NotificationLevel};
pub use reservation::ReservationTimer;
