//! # Outbound Ports
//!
//! Storage contracts the services depend on. Adapters in `crate::adapters`
//! implement them; a database-backed adapter would slot in the same way.

use async_trait::async_trait;
use shared_types::{Cart, Order, OrderId, OrderStatus};
use thiserror::Error;

/// Storage failures, surfaced unchanged to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Per-user shopping cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// `None` when the user has no cart.
    async fn get(&self, user_id: &str) -> Result<Option<Cart>, RepositoryError>;

    /// Insert or replace the user's cart, returning what is now stored.
    async fn put(&self, cart: Cart) -> Result<Cart, RepositoryError>;

    /// Returns false if there was nothing to remove.
    async fn remove(&self, user_id: &str) -> Result<bool, RepositoryError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new order and return its assigned id.
    async fn save(&self, order: Order) -> Result<OrderId, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Returns the number of orders updated (0 or 1).
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<u64, RepositoryError>;
}
