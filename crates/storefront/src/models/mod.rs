//! Domain models for the storefront service.
//!
//! - [`cart`] - stored cart lines and the priced cart view returned to clients
//! - [`order`] - immutable orders and the status changes applied to them
//! - [`page`] - page requests for list endpoints
//! - [`session`] - identity data kept in the session

pub mod cart;
pub mod order;
pub mod page;
pub mod session;

pub use cart::{CartLine, CartLineView, CartView};
pub use order::{NewOrder, NewOrderLine, Order, OrderLine, StatusChange};
pub use page::PageRequest;
pub use session::{CurrentUser, keys as session_keys};
