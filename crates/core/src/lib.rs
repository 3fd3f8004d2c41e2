//! Storefront Core - domain types and the pricing engine.
//!
//! This crate is shared by the HTTP service and the operator CLI:
//! - `storefront` - Cart, checkout and order lifecycle over HTTP
//! - `cli` - Migrations, catalog seeding and order administration
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Everything time-dependent takes the evaluation instant as an
//! argument, which keeps promotion resolution and pricing deterministic.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, quantities, cart ownership, statuses and their state machines
//! - [`catalog`] - Products and promotions as seen by the cart
//! - [`pricing`] - Promotion resolution and discounted price calculation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod pricing;
pub mod types;

pub use catalog::{Product, Promotion};
pub use types::*;
