//! Order lifecycle: queries, payment and status transitions.
//!
//! Every transition is validated against the core state machines first and
//! then written with a compare-and-set ([`StatusChange`]), so two requests
//! racing on the same order cannot both succeed.

mod error;

pub use error::OrderError;

use std::sync::Arc;

use tracing::instrument;

use storefront_core::{OrderId, OrderStatus, PaymentStatus, StatusTransitionError, UserId};

use crate::db::{OrderStore, RepositoryError};
use crate::models::{Order, PageRequest, StatusChange};
use crate::services::payment::{PaymentError, PaymentGateway};

/// Reads and transitions placed orders.
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { orders, gateway }
    }

    /// Fetch any order by id.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if it does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        self.orders
            .get(id)
            .await?
            .ok_or(OrderError::NotFound(id))
    }

    /// Fetch an order owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if it does not exist or belongs to
    /// another user.
    pub async fn get_for_user(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        if order.user_id != user_id {
            return Err(OrderError::NotFound(id));
        }
        Ok(order)
    }

    /// One page of a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id, page).await?)
    }

    /// Customer cancellation.
    ///
    /// Returns stock for every line and refunds a paid order.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order is not the user's.
    /// - `OrderError::InvalidStatusTransition` once the order is delivered or
    ///   already cancelled.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let order = self.get_for_user(user_id, id).await?;
        let change = cancellation(&order)?;
        let order = self.write(id, &change).await?;
        tracing::info!(order_number = %order.order_number, "Order cancelled by customer");
        Ok(order)
    }

    /// Customer confirms the parcel arrived: `SHIPPED -> DELIVERED`.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order is not the user's.
    /// - `OrderError::InvalidStatusTransition` unless the order is shipped.
    #[instrument(skip(self))]
    pub async fn confirm_receipt(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let order = self.get_for_user(user_id, id).await?;
        let mut change = StatusChange::from_current(&order);
        change.status = order.status.transition_to(OrderStatus::Delivered)?;
        self.write(id, &change).await
    }

    /// Charge an order through the payment gateway.
    ///
    /// On success the order becomes `CONFIRMED` / `PAID` with the gateway's
    /// transaction id. A decline marks payment `FAILED`, cancels the order and
    /// returns its stock before reporting the decline.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order is not the user's.
    /// - `OrderError::OfflinePayment` for bank transfer and cash on delivery.
    /// - `OrderError::InvalidStatusTransition` unless the order is
    ///   `PENDING` / `PENDING`.
    /// - `OrderError::PaymentDeclined` when the gateway refuses.
    /// - `OrderError::Payment` when the gateway is unavailable; the order is
    ///   unchanged and payment can be retried.
    #[instrument(skip(self))]
    pub async fn pay(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let order = self.get_for_user(user_id, id).await?;
        if !order.payment_method.is_online() {
            return Err(OrderError::OfflinePayment(order.payment_method));
        }
        order.payment_status.transition_to(PaymentStatus::Paid)?;
        order.status.transition_to(OrderStatus::Confirmed)?;

        match self.gateway.charge(&order, order.payment_method).await {
            Ok(receipt) => {
                let mut change = StatusChange::from_current(&order);
                change.status = OrderStatus::Confirmed;
                change.payment_status = PaymentStatus::Paid;
                change.transaction_id = Some(receipt.transaction_id);
                let order = self.write(id, &change).await?;
                tracing::info!(order_number = %order.order_number, "Order paid");
                Ok(order)
            }
            Err(PaymentError::Declined(reason)) => {
                let mut change = StatusChange::from_current(&order);
                change.status = OrderStatus::Cancelled;
                change.payment_status = PaymentStatus::Failed;
                change.restock = true;
                self.write(id, &change).await?;
                tracing::warn!(order_number = %order.order_number, %reason, "Payment declined");
                Err(OrderError::PaymentDeclined(reason))
            }
            Err(e) => Err(OrderError::Payment(e)),
        }
    }

    /// Operator order transition.
    ///
    /// Cancelling returns stock and refunds a paid order, as for customers.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order does not exist.
    /// - `OrderError::InvalidStatusTransition` if the state machine forbids it.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        let change = if status == OrderStatus::Cancelled {
            cancellation(&order)?
        } else {
            let mut change = StatusChange::from_current(&order);
            change.status = order.status.transition_to(status)?;
            change
        };
        self.write(id, &change).await
    }

    /// Operator payment transition, used to settle offline payments.
    ///
    /// `PAID` also confirms a pending order and is refused for a cancelled
    /// one. `FAILED` cancels the order and returns its stock unless it
    /// already reached a terminal state. `REFUNDED` only touches the payment
    /// status.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order does not exist.
    /// - `OrderError::InvalidStatusTransition` if the state machine forbids it
    ///   or the order is cancelled and `PAID` was requested.
    #[instrument(skip(self))]
    pub async fn set_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        if payment_status == PaymentStatus::Paid && order.status == OrderStatus::Cancelled {
            return Err(StatusTransitionError {
                entity: "payment",
                from: order.status.to_string(),
                to: payment_status.to_string(),
            }
            .into());
        }
        let mut change = StatusChange::from_current(&order);
        change.payment_status = order.payment_status.transition_to(payment_status)?;

        match payment_status {
            PaymentStatus::Paid if order.status == OrderStatus::Pending => {
                change.status = OrderStatus::Confirmed;
            }
            PaymentStatus::Failed if !order.status.is_terminal() => {
                change.status = OrderStatus::Cancelled;
                change.restock = true;
            }
            _ => {}
        }
        self.write(id, &change).await
    }

    async fn write(&self, id: OrderId, change: &StatusChange) -> Result<Order, OrderError> {
        self.orders.apply(id, change).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => OrderError::ConcurrentUpdate(id),
            RepositoryError::NotFound => OrderError::NotFound(id),
            e => OrderError::Repository(e),
        })
    }
}

/// Cancel with restock, refunding a paid order.
fn cancellation(order: &Order) -> Result<StatusChange, OrderError> {
    let mut change = StatusChange::from_current(order);
    change.status = order.status.transition_to(OrderStatus::Cancelled)?;
    change.restock = true;
    if order.payment_status == PaymentStatus::Paid {
        change.payment_status = PaymentStatus::Refunded;
    }
    Ok(change)
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}
