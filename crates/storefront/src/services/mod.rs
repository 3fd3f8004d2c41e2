//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart operations for guests and users, and the login merge
//! - `checkout` - Order assembly from a cart
//! - `orders` - Order queries, payment and status transitions
//! - `payment` - Payment gateway contract and the simulated gateway
//! - `notifications` - Fire-and-forget business notifications

pub mod cart;
pub mod checkout;
pub mod notifications;
pub mod orders;
pub mod payment;
