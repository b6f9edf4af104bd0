//! In-process storage adapters.

use crate::ports::{CartStore, OrderRepository, RepositoryError};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Cart, Order, OrderId, OrderStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Carts keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<String, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get(&self, user_id: &str) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.carts.read().get(user_id).cloned())
    }

    async fn put(&self, cart: Cart) -> Result<Cart, RepositoryError> {
        self.carts.write().insert(cart.user_id.clone(), cart.clone());
        Ok(cart)
    }

    async fn remove(&self, user_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.carts.write().remove(user_id).is_some())
    }
}

/// Orders keyed by a monotonically assigned id starting at 1.
#[derive(Debug)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
    next_id: AtomicI64,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, mut order: Order) -> Result<OrderId, RepositoryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        order.id = Some(id);
        self.orders.write().insert(id, order);
        Ok(id)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().get(&id).cloned())
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<u64, RepositoryError> {
        match self.orders.write().get_mut(&id) {
            Some(order) => {
                order.status = status;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
