//! Session-related types.
//!
//! Types stored in the session for identity resolution.

use serde::{Deserialize, Serialize};

use storefront_core::UserId;

/// Session-stored user identity.
///
/// Written by the authentication subsystem on login success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's account ID.
    pub id: UserId,
}

/// Session keys for identity data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart key of an anonymous session.
    pub const GUEST_CART_KEY: &str = "guest_cart_key";
}
