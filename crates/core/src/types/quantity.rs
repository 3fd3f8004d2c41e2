//! Cart line quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// The quantity is zero or negative.
    #[error("quantity must be at least 1 (got {0})")]
    TooSmall(i64),
    /// The quantity exceeds the per-line ceiling.
    #[error("quantity must be at most {max} (got {got})")]
    TooLarge {
        /// The value that was rejected.
        got: i64,
        /// Maximum allowed quantity.
        max: u32,
    },
}

/// Quantity of a single cart or order line.
///
/// ## Constraints
///
/// - `1 <= quantity <= 999`
///
/// ```
/// use storefront_core::Quantity;
///
/// assert!(Quantity::new(1).is_ok());
/// assert!(Quantity::new(999).is_ok());
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(1000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Per-line ceiling shared by add-to-cart and merge.
    pub const MAX: u32 = 999;

    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Validate a requested quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is outside `1..=999`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::TooSmall(value));
        }
        if value > i64::from(Self::MAX) {
            return Err(QuantityError::TooLarge {
                got: value,
                max: Self::MAX,
            });
        }
        // Range checked above.
        u32::try_from(value).map(Self).map_err(|_| QuantityError::TooLarge {
            got: value,
            max: Self::MAX,
        })
    }

    /// Build a quantity, clamping into `1..=999`.
    #[must_use]
    pub fn saturating(value: i64) -> Self {
        Self::new(value.clamp(1, i64::from(Self::MAX))).unwrap_or(Self::ONE)
    }

    /// Add two quantities, capping at the per-line ceiling.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0).min(Self::MAX))
    }

    /// The raw value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The raw value as `i32`, the database column type.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        // Never above 999.
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}
