//! Status enums and their state machines.
//!
//! Every enum serialises as `SCREAMING_SNAKE_CASE`, which is also the text
//! stored in the database.

use serde::{Deserialize, Serialize};

/// A requested status change that the state machine does not allow.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {entity} transition from {from} to {to}")]
pub struct StatusTransitionError {
    /// Which state machine rejected the change (`order` or `payment`).
    pub entity: &'static str,
    /// Current state.
    pub from: String,
    /// Requested state.
    pub to: String,
}

/// Implements `Display` and `FromStr` over the SCREAMING_SNAKE_CASE names.
macro_rules! status_text {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Database and wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Lifecycle status of a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionStatus {
    #[default]
    Active,
    Inactive,
    Expired,
}

status_text!(PromotionStatus {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
    Expired => "EXPIRED",
});

/// How a promotion reduces the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    #[default]
    Percentage,
    FixedAmount,
}

status_text!(DiscountType {
    Percentage => "PERCENTAGE",
    FixedAmount => "FIXED_AMOUNT",
});

/// Payment method chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Paypal,
    BankTransfer,
    CashOnDelivery,
}

status_text!(PaymentMethod {
    Card => "CARD",
    Paypal => "PAYPAL",
    BankTransfer => "BANK_TRANSFER",
    CashOnDelivery => "CASH_ON_DELIVERY",
});

impl PaymentMethod {
    /// Whether the method is charged through the payment gateway.
    ///
    /// Bank transfers and cash on delivery are settled offline by an operator.
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Card | Self::Paypal)
    }
}

/// Fulfilment status of an order.
///
/// ```text
/// PENDING -> CONFIRMED -> PROCESSING -> SHIPPED -> DELIVERED
///    \___________\____________\___________\-----> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

status_text!(OrderStatus {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    Processing => "PROCESSING",
    Shipped => "SHIPPED",
    Delivered => "DELIVERED",
    Cancelled => "CANCELLED",
});

impl OrderStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether `next` is a legal single step from this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (
                    Self::Pending | Self::Confirmed | Self::Processing | Self::Shipped,
                    Self::Cancelled
                )
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns [`StatusTransitionError`] if the state machine forbids it.
    pub fn transition_to(self, next: Self) -> Result<Self, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                entity: "order",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

/// Payment status of an order.
///
/// ```text
/// PENDING -> PAID -> REFUNDED
///        \-> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

status_text!(PaymentStatus {
    Pending => "PENDING",
    Paid => "PAID",
    Failed => "FAILED",
    Refunded => "REFUNDED",
});

impl PaymentStatus {
    /// Whether `next` is a legal step from this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Failed) | (Self::Paid, Self::Refunded)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns [`StatusTransitionError`] if the state machine forbids it.
    pub fn transition_to(self, next: Self) -> Result<Self, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                entity: "payment",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}
