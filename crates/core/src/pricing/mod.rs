//! Promotion resolution and discounted pricing.
//!
//! Both functions are pure given the evaluation instant, so the cart view and
//! checkout can re-run them on every request and always agree.

mod calculator;
mod resolver;

pub use calculator::{PricedUnit, discounted_price, price_unit};
pub use resolver::resolve;
