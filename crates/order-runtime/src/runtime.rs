//! # Service Runtime
//!
//! Lifecycle for the roles the binary can run.
//!
//! ## Startup
//!
//! 1. Connect the transport
//! 2. Start the role's subscriptions (cart requests and/or cart replies)
//! 3. Serve until shutdown
//!
//! ## Shutdown
//!
//! 1. Stop subscriptions after their in-flight delivery
//! 2. Cancel requests still waiting for a reply
//! 3. Close the transport

use crate::container::{connect_transport, ServiceConfig, ServiceContainer};
use crate::services::OrderDraft;
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use shared_bus::{InMemoryBroker, SubscriptionHandle};
use shared_types::{Cart, Order, OrderItem};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Which service this process runs.
///
/// Without the `amqp` feature only `cart` and `demo` are available: an
/// `order` process would sit on a private in-process broker that no cart
/// service can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    /// Create one order and exit.
    Order,
    /// Serve cart requests until interrupted.
    Cart,
    /// Both services on an in-process broker, one order end to end.
    Demo,
}

impl Role {
    /// Whether this build can run the role.
    #[must_use]
    pub fn is_supported(self) -> bool {
        cfg!(feature = "amqp") || self != Role::Order
    }
}

/// Fail fast on a role this build cannot serve.
pub fn ensure_role_supported(role: Role) -> Result<()> {
    if !role.is_supported() {
        bail!("the order role needs a shared broker; rebuild with `--features amqp` or use `--role demo`");
    }
    Ok(())
}

pub struct ServiceRuntime {
    container: Arc<ServiceContainer>,
    subscriptions: tokio::sync::Mutex<Vec<SubscriptionHandle>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ServiceRuntime {
    pub fn new(container: ServiceContainer) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            container: Arc::new(container),
            subscriptions: tokio::sync::Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Connect the transport described by `config` and wire the services.
    pub async fn connect(config: ServiceConfig) -> Result<Self> {
        let transport = connect_transport(&config.broker)
            .await
            .context("Failed to connect to the message broker")?;
        Ok(Self::new(ServiceContainer::new(config, transport)))
    }

    pub fn container(&self) -> Arc<ServiceContainer> {
        Arc::clone(&self.container)
    }

    /// Flips to true once [`Self::shutdown`] starts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub async fn start_cart_service(&self) -> Result<()> {
        let handle = self
            .container
            .serve_carts()
            .await
            .context("Failed to start the cart service")?;
        self.subscriptions.lock().await.push(handle);
        Ok(())
    }

    /// Listen for cart replies ahead of the first order.
    pub async fn start_order_service(&self) -> Result<()> {
        let reply_queue = self.container.config.queues.cart_response.as_str();
        self.container
            .client
            .start(&[reply_queue])
            .await
            .context("Failed to start the order service")?;
        info!(reply_queue = reply_queue, "Order service ready");
        Ok(())
    }

    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);

        let handles: Vec<SubscriptionHandle> = self.subscriptions.lock().await.drain(..).collect();
        for handle in handles {
            handle.stop().await;
        }
        self.container.client.shutdown().await;

        if let Err(e) = self.container.transport.close().await {
            error!(error = %e, "Failed to close the transport");
        }
        info!("Shutdown complete");
    }
}

/// Sample cart the demo seeds for its user.
#[must_use]
pub fn demo_cart(user_id: &str) -> Cart {
    Cart {
        user_id: user_id.to_string(),
        items: vec![
            OrderItem {
                menu_item_id: 101,
                menu_item_name: "Butter Chicken".to_string(),
                price: Decimal::new(12950, 2),
                quantity: 2,
            },
            OrderItem {
                menu_item_id: 205,
                menu_item_name: "Garlic Naan".to_string(),
                price: Decimal::new(3500, 2),
                quantity: 3,
            },
        ],
    }
}

/// Run both services on an in-process broker and place one order for
/// `user_id`, returning it as stored.
pub async fn run_demo(config: ServiceConfig, user_id: &str) -> Result<Order> {
    let container = ServiceContainer::new(config, Arc::new(InMemoryBroker::new()));
    let runtime = ServiceRuntime::new(container);
    let container = runtime.container();

    container
        .cart_service()
        .update_cart(demo_cart(user_id))
        .await
        .context("Failed to seed the demo cart")?;
    runtime.start_cart_service().await?;
    runtime.start_order_service().await?;

    let orders = container.order_service();
    let outcome = async {
        let id = orders
            .create_order(OrderDraft::new(user_id, 1))
            .await
            .context("Failed to create the demo order")?;
        orders
            .get_order(id)
            .await
            .context("Failed to read back the demo order")
    }
    .await;

    runtime.shutdown().await;
    let order = outcome?;
    info!(
        order_id = ?order.id,
        user_id = %order.user_id,
        items = order.items.len(),
        total = %order.total_amount,
        vat = %order.vat_amount,
        "Demo order placed"
    );
    Ok(order)
}
