//! Payment gateway collaborator.
//!
//! Real payment processing is out of scope. The gateway contract is what the
//! order lifecycle depends on; [`SimulatedGateway`] stands in for a provider.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use storefront_core::PaymentMethod;

use crate::models::Order;

/// Why a charge did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The provider refused the charge. The reason is safe to show the buyer.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The provider could not be reached or failed internally.
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// A successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub transaction_id: String,
}

/// Charges an order's total.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge `order.total_amount` using `method`.
    async fn charge(&self, order: &Order, method: PaymentMethod)
    -> Result<ChargeReceipt, PaymentError>;
}

/// Approves every online charge up to an optional ceiling.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    decline_above: Option<Decimal>,
}

impl SimulatedGateway {
    /// A gateway that declines totals strictly above `decline_above`.
    #[must_use]
    pub const fn new(decline_above: Option<Decimal>) -> Self {
        Self { decline_above }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(
        &self,
        order: &Order,
        method: PaymentMethod,
    ) -> Result<ChargeReceipt, PaymentError> {
        if !method.is_online() {
            return Err(PaymentError::Declined(format!(
                "{method} cannot be charged online"
            )));
        }
        if let Some(limit) = self.decline_above
            && order.total_amount > limit
        {
            return Err(PaymentError::Declined(format!(
                "amount {} {} exceeds the authorised limit",
                order.total_amount, order.currency
            )));
        }

        let transaction_id = format!("TXN-{}", uuid::Uuid::new_v4().simple()).to_uppercase();
        tracing::info!(
            order_number = %order.order_number,
            %method,
            %transaction_id,
            "Simulated charge approved"
        );
        Ok(ChargeReceipt { transaction_id })
    }
}
