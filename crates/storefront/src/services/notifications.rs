//! Notification collaborator.
//!
//! Delivery (email, chat, dashboards) happens elsewhere. Callers treat every
//! notification as fire-and-forget: a failure is logged and never fails the
//! operation that triggered it.

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::Product;

use crate::models::Order;

/// A notification could not be delivered.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Receives business events raised by checkout.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// An order was placed.
    async fn order_created(&self, order: &Order) -> Result<(), NotificationError>;

    /// A product's remaining stock reached its minimum threshold.
    async fn low_stock(&self, product: &Product) -> Result<(), NotificationError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn order_created(&self, order: &Order) -> Result<(), NotificationError> {
        tracing::info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            lines = order.items.len(),
            "Order created"
        );
        Ok(())
    }

    async fn low_stock(&self, product: &Product) -> Result<(), NotificationError> {
        tracing::warn!(
            product_id = %product.id,
            stock = product.stock_quantity,
            threshold = product.min_stock_threshold,
            "Product low on stock"
        );
        Ok(())
    }
}
