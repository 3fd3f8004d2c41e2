//! Core types for the storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod owner;
pub mod price;
pub mod quantity;
pub mod status;

pub use id::*;
pub use owner::{CartOwner, GuestKey};
pub use price::{CurrencyCode, DISCOUNT_SCALE, line_total, round_half_up};
pub use quantity::{Quantity, QuantityError};
pub use status::*;
