//! Cart ownership.
//!
//! A cart belongs to exactly one of a guest session or a signed-in user. The
//! tagged variant makes "both" and "neither" unrepresentable.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Opaque key identifying a guest's cart for the lifetime of their session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestKey(Uuid);

impl GuestKey {
    /// Mint a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for GuestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owner of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartOwner {
    /// Anonymous shopper, identified by a session-bound key.
    Guest {
        /// Key stored in the shopper's session.
        #[serde(rename = "sessionKey")]
        session_key: GuestKey,
    },
    /// Authenticated shopper.
    User {
        /// Account ID.
        #[serde(rename = "userId")]
        user_id: UserId,
    },
}

impl CartOwner {
    /// Owner for a guest session.
    #[must_use]
    pub const fn guest(session_key: GuestKey) -> Self {
        Self::Guest { session_key }
    }

    /// Owner for a signed-in account.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self::User { user_id }
    }

    /// The account ID, if this is a user-owned cart.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { user_id } => Some(*user_id),
            Self::Guest { .. } => None,
        }
    }

    /// Whether the owner is an anonymous guest.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest { .. })
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest { session_key } => write!(f, "guest:{session_key}"),
            Self::User { user_id } => write!(f, "user:{user_id}"),
        }
    }
}
