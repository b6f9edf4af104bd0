//! # Service Container
//!
//! Holds the broker transport, the request/reply client and the storage
//! adapters, and hands out services wired to them.
//!
//! The transport is created once at startup and shared by everything in the
//! process; nothing reaches it through a global.

pub mod config;

pub use config::{BrokerConfig, ConfigError, QueueConfig, ServiceConfig};

use crate::adapters::{InMemoryCartStore, InMemoryOrderRepository};
use crate::ports::{CartStore, OrderRepository};
use crate::services::{CartService, OrderService};
use bus_rpc::{RequestReplyClient, Responder};
use shared_bus::{BrokerError, SubscriptionHandle, Transport};
use std::sync::Arc;
use tracing::info;

pub struct ServiceContainer {
    pub config: ServiceConfig,
    pub transport: Arc<dyn Transport>,
    pub client: Arc<RequestReplyClient>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderRepository>,
}

impl ServiceContainer {
    /// Wire in-memory storage around `transport`.
    pub fn new(config: ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_storage(
            config,
            transport,
            Arc::new(InMemoryCartStore::new()),
            Arc::new(InMemoryOrderRepository::new()),
        )
    }

    pub fn with_storage(
        config: ServiceConfig,
        transport: Arc<dyn Transport>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        let client = Arc::new(RequestReplyClient::new(
            Arc::clone(&transport),
            config.rpc.clone(),
        ));
        Self {
            config,
            transport,
            client,
            carts,
            orders,
        }
    }

    pub fn cart_service(&self) -> CartService {
        CartService::new(Arc::clone(&self.carts))
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(
            Arc::clone(&self.client),
            Arc::clone(&self.orders),
            Arc::clone(&self.transport),
            self.config.queues.clone(),
            self.config.vat_rate_percent,
        )
    }

    /// Answer cart requests on the configured queues until stopped.
    pub async fn serve_carts(&self) -> Result<SubscriptionHandle, BrokerError> {
        let queues = &self.config.queues;
        let handle = Responder::new(
            Arc::clone(&self.transport),
            queues.cart_response.clone(),
            self.config.rpc.persistent_replies,
            self.cart_service(),
        )
        .serve(&queues.cart_request)
        .await?;

        info!(
            request_queue = %queues.cart_request,
            reply_queue = %queues.cart_response,
            "Cart service listening"
        );
        Ok(handle)
    }
}

/// Open the broker connection described by `config`.
#[cfg(feature = "amqp")]
pub async fn connect_transport(config: &BrokerConfig) -> Result<Arc<dyn Transport>, BrokerError> {
    let transport = shared_bus::AmqpTransport::connect(&config.amqp_uri()).await?;
    Ok(Arc::new(transport))
}

/// Without the `amqp` feature every role runs on an in-process broker.
#[cfg(not(feature = "amqp"))]
pub async fn connect_transport(config: &BrokerConfig) -> Result<Arc<dyn Transport>, BrokerError> {
    info!(host = %config.host, "Built without `amqp`, using the in-process broker");
    Ok(Arc::new(shared_bus::InMemoryBroker::new()))
}
