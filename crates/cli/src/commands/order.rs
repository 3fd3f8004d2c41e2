//! Operator order administration.
//!
//! Transitions go through the same state machines and compare-and-set writes
//! as the HTTP surface, so an operator cannot skip a state or race a customer.

use std::sync::Arc;

use tracing::info;

use storefront::db::PgOrderStore;
use storefront::models::Order;
use storefront::services::orders::OrderService;
use storefront::services::payment::SimulatedGateway;
use storefront_core::{OrderId, OrderStatus, PaymentStatus};

async fn service() -> Result<OrderService, Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    Ok(OrderService::new(
        Arc::new(PgOrderStore::new(pool)),
        Arc::new(SimulatedGateway::default()),
    ))
}

fn log_order(order: &Order) {
    info!(
        "Order {} ({}): status {}, payment {} via {}, total {} {}",
        order.id,
        order.order_number,
        order.status,
        order.payment_status,
        order.payment_method,
        order.total_amount,
        order.currency,
    );
    for line in &order.items {
        info!(
            "  {} x {} @ {} = {}",
            line.quantity.get(),
            line.product_name,
            line.unit_price,
            line.line_total
        );
    }
}

/// Print an order.
///
/// # Errors
///
/// Returns an error if the order does not exist or the database fails.
pub async fn show(id: OrderId) -> Result<(), Box<dyn std::error::Error>> {
    let order = service().await?.get(id).await?;
    log_order(&order);
    Ok(())
}

/// Move an order to `status`.
///
/// # Errors
///
/// Returns an error if the transition is illegal or the database fails.
pub async fn set_status(id: OrderId, status: OrderStatus) -> Result<(), Box<dyn std::error::Error>> {
    let order = service().await?.set_status(id, status).await?;
    info!("Order status updated");
    log_order(&order);
    Ok(())
}

/// Record a payment outcome.
///
/// # Errors
///
/// Returns an error if the transition is illegal or the database fails.
pub async fn set_payment_status(
    id: OrderId,
    status: PaymentStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    let order = service().await?.set_payment_status(id, status).await?;
    info!("Payment status updated");
    log_order(&order);
    Ok(())
}
