//! Shopping-cart service: cart CRUD plus the cart request responder.

use crate::ports::{CartStore, RepositoryError};
use async_trait::async_trait;
use bus_rpc::RequestHandler;
use shared_types::{Cart, CartRequest, CartResponse};
use std::sync::Arc;
use tracing::debug;

pub struct CartService {
    store: Arc<dyn CartStore>,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        Self { store }
    }

    pub async fn get_cart(&self, user_id: &str) -> Result<Option<Cart>, RepositoryError> {
        self.store.get(user_id).await
    }

    pub async fn update_cart(&self, cart: Cart) -> Result<Cart, RepositoryError> {
        self.store.put(cart).await
    }

    pub async fn remove_cart(&self, user_id: &str) -> Result<bool, RepositoryError> {
        self.store.remove(user_id).await
    }
}

#[async_trait]
impl RequestHandler<CartRequest, CartResponse> for CartService {
    type Error = RepositoryError;

    /// A user without a cart gets an empty item list.
    async fn handle(&self, request: CartRequest) -> Result<CartResponse, RepositoryError> {
        let items = self
            .store
            .get(&request.user_id)
            .await?
            .map(|cart| cart.items)
            .unwrap_or_default();

        debug!(user_id = %request.user_id, items = items.len(), "Answering cart request");
        Ok(CartResponse {
            user_id: request.user_id,
            items,
        })
    }
}
