//! # Order Service
//!
//! Creating an order:
//!
//! 1. Request the user's cart from the cart service over the bus
//! 2. Reject an empty cart
//! 3. Price it: total = Σ price × quantity, VAT = rate% of total
//! 4. Persist with status `FreeToTake`
//! 5. Publish `Order {id} created for user {user}` to the order-created queue
//!
//! Nothing is persisted unless the cart round trip succeeded.

use crate::container::config::QueueConfig;
use crate::ports::{OrderRepository, RepositoryError};
use bus_rpc::{RequestReplyClient, RpcError};
use chrono::Utc;
use rust_decimal::Decimal;
use shared_bus::Transport;
use shared_types::{CartRequest, CartResponse, CorrelationId, Order, OrderId, OrderItem, OrderStatus};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// What the caller supplies; items and amounts come from the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: String,
    pub restaurant_id: i32,
    pub delivery_agent_id: Option<i32>,
}

impl OrderDraft {
    pub fn new(user_id: impl Into<String>, restaurant_id: i32) -> Self {
        Self {
            user_id: user_id.into(),
            restaurant_id,
            delivery_agent_id: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart could not be fetched (timeout, broker, bad reply).
    #[error("cart request failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("cart for user {user_id} is empty")]
    EmptyCart { user_id: String },

    #[error("order storage failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("order {0} not found")]
    NotFound(OrderId),
}

/// Sum of line totals and the VAT on it.
#[must_use]
pub fn price_items(items: &[OrderItem], vat_rate_percent: u32) -> (Decimal, Decimal) {
    let total: Decimal = items.iter().map(OrderItem::line_total).sum();
    let vat = total * Decimal::from(vat_rate_percent) / Decimal::ONE_HUNDRED;
    (total, vat)
}

pub struct OrderService {
    client: Arc<RequestReplyClient>,
    orders: Arc<dyn OrderRepository>,
    transport: Arc<dyn Transport>,
    queues: QueueConfig,
    vat_rate_percent: u32,
}

impl OrderService {
    pub fn new(
        client: Arc<RequestReplyClient>,
        orders: Arc<dyn OrderRepository>,
        transport: Arc<dyn Transport>,
        queues: QueueConfig,
        vat_rate_percent: u32,
    ) -> Self {
        Self {
            client,
            orders,
            transport,
            queues,
            vat_rate_percent,
        }
    }

    /// Build, price and store an order from the user's current cart.
    pub async fn create_order(&self, draft: OrderDraft) -> Result<OrderId, OrderError> {
        let correlation_id = CorrelationId::new();
        info!(
            user_id = %draft.user_id,
            correlation_id = %correlation_id,
            "Creating order"
        );

        let cart: CartResponse = self
            .client
            .request(
                &self.queues.cart_request,
                &self.queues.cart_response,
                &CartRequest {
                    user_id: draft.user_id.clone(),
                },
                correlation_id,
                self.client.config().request_timeout(),
            )
            .await
            .map_err(|e| {
                error!(user_id = %draft.user_id, correlation_id = %correlation_id, error = %e, "Cart request failed");
                e
            })?;

        if cart.user_id != draft.user_id {
            warn!(
                expected = %draft.user_id,
                received = %cart.user_id,
                correlation_id = %correlation_id,
                "Cart reply names a different user"
            );
        }
        if cart.items.is_empty() {
            return Err(OrderError::EmptyCart {
                user_id: draft.user_id,
            });
        }

        let (total_amount, vat_amount) = price_items(&cart.items, self.vat_rate_percent);
        let order = Order {
            id: None,
            user_id: draft.user_id.clone(),
            restaurant_id: draft.restaurant_id,
            delivery_agent_id: draft.delivery_agent_id,
            items: cart.items,
            total_amount,
            vat_amount,
            placed_at: Utc::now(),
            status: OrderStatus::FreeToTake,
        };
        let id = self.orders.save(order).await?;

        info!(
            order_id = id,
            user_id = %draft.user_id,
            total = %total_amount,
            vat = %vat_amount,
            "Order created"
        );
        self.notify_created(id, &draft.user_id).await;
        Ok(id)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderError> {
        self.orders.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(), OrderError> {
        match self.orders.update_status(id, status).await? {
            0 => Err(OrderError::NotFound(id)),
            _ => {
                info!(order_id = id, status = ?status, "Order status updated");
                Ok(())
            }
        }
    }

    /// The order is already stored, so a failed notification is only logged.
    async fn notify_created(&self, id: OrderId, user_id: &str) {
        let message = format!("Order {id} created for user {user_id}");
        if let Err(e) = self
            .transport
            .publish(&self.queues.order_created, message.as_bytes(), true)
            .await
        {
            error!(order_id = id, queue = %self.queues.order_created, error = %e, "Failed to publish order notification");
        }
    }
}
