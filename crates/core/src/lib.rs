//! SecondHand Core - Shared types and pricing rules.
//!
//! This crate provides the types used across all SecondHand client components:
//! - `client` - Backend client, cart manager and checkout wizard
//! - `cli` - Terminal front-end for the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure computations - no I/O, no
//! HTTP clients, no timers. Everything here can be evaluated against an
//! explicit "now" so it stays deterministic under test.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, payment types
//! - [`listing`] - Listing DTO embedded in cart items
//! - [`cart`] - Cart items, totals, discount and quantity clamp
//! - [`reservation`] - Reservation window and countdown status
//! - [`format`] - Display helpers for money, dates and countdowns

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod format;
pub mod listing;
pub mod reservation;
pub mod types;

pub use cart::{CartItem, CartTotals, QuantityClamp, clamp_quantity, effective_unit_price};
pub use listing::{Listing, ListingCategory, ReviewStats, SellerSummary};
pub use reservation::{Countdown, RESERVATION_TIMEOUT_MINUTES, ReservationStatus, ReservationWindow};
pub use types::*;
