//! # Order Flow
//!
//! Order service and cart service as two separate processes would run them:
//! each with its own container, sharing only the broker.

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use order_runtime::runtime::demo_cart;
    use order_runtime::{OrderDraft, ServiceConfig, ServiceContainer, ServiceRuntime};
    use rust_decimal::Decimal;
    use shared_bus::{InMemoryBroker, Transport};
    use shared_types::{Cart, OrderItem, OrderStatus};
    use std::sync::Arc;
    use std::time::Duration;

    fn runtime(broker: &InMemoryBroker) -> ServiceRuntime {
        let mut config = ServiceConfig::default();
        config.rpc.request_timeout_secs = 5;
        ServiceRuntime::new(ServiceContainer::new(config, Arc::new(broker.clone())))
    }

    fn cart_of(user_id: &str, price_cents: i64, quantity: i32) -> Cart {
        Cart {
            user_id: user_id.to_string(),
            items: vec![OrderItem {
                menu_item_id: 1,
                menu_item_name: "Smørrebrød".to_string(),
                price: Decimal::new(price_cents, 2),
                quantity,
            }],
        }
    }

    #[tokio::test]
    async fn test_order_and_cart_services_in_separate_containers() {
        let broker = InMemoryBroker::new();
        let carts = runtime(&broker);
        let orders = runtime(&broker);

        carts
            .container()
            .cart_service()
            .update_cart(demo_cart("u-1"))
            .await
            .unwrap();
        carts.start_cart_service().await.unwrap();
        orders.start_order_service().await.unwrap();

        let service = orders.container().order_service();
        let id = service.create_order(OrderDraft::new("u-1", 7)).await.unwrap();
        let order = service.get_order(id).await.unwrap();

        assert_eq!(order.restaurant_id, 7);
        assert_eq!(order.total_amount, Decimal::new(36400, 2));
        assert_eq!(order.vat_amount, Decimal::new(7280, 2));
        assert_eq!(order.status, OrderStatus::FreeToTake);
        assert_eq!(broker.queue_depth("OrderCreatedQueue"), 1);
        assert_eq!(broker.queue_depth("CartRequestQueue"), 0);
        assert_eq!(broker.queue_depth("CartResponseQueue"), 0);

        orders.shutdown().await;
        carts.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_get_their_own_carts() {
        let broker = InMemoryBroker::new();
        let carts = runtime(&broker);
        let orders = runtime(&broker);

        let cart_service = carts.container().cart_service();
        for n in 1..=50i64 {
            cart_service
                .update_cart(cart_of(&format!("user-{n}"), n * 100, 2))
                .await
                .unwrap();
        }
        carts.start_cart_service().await.unwrap();
        orders.start_order_service().await.unwrap();

        let service = Arc::new(orders.container().order_service());
        let placed = (1..=50i64).map(|n| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let id = service
                    .create_order(OrderDraft::new(format!("user-{n}"), 1))
                    .await
                    .unwrap();
                (n, service.get_order(id).await.unwrap())
            })
        });

        for joined in join_all(placed).await {
            let (n, order) = joined.unwrap();
            assert_eq!(order.user_id, format!("user-{n}"));
            assert_eq!(order.total_amount, Decimal::new(n * 200, 2));
        }
        assert_eq!(broker.queue_depth("OrderCreatedQueue"), 50);
        assert_eq!(orders.container().client.pending_count(), 0);

        orders.shutdown().await;
        carts.shutdown().await;
    }

    #[tokio::test]
    async fn test_order_waits_for_cart_service_to_start() {
        let broker = InMemoryBroker::new();
        let carts = runtime(&broker);
        let orders = runtime(&broker);
        carts
            .container()
            .cart_service()
            .update_cart(cart_of("u-late", 1000, 1))
            .await
            .unwrap();
        orders.start_order_service().await.unwrap();

        let pending = {
            let service = orders.container().order_service();
            tokio::spawn(async move { service.create_order(OrderDraft::new("u-late", 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(broker.queue_depth("CartRequestQueue"), 1);

        carts.start_cart_service().await.unwrap();
        let id = tokio::time::timeout(Duration::from_secs(3), pending)
            .await
            .expect("timeout")
            .unwrap()
            .unwrap();
        let order = orders.container().order_service().get_order(id).await.unwrap();
        assert_eq!(order.total_amount, Decimal::new(1000, 2));
        assert_eq!(order.vat_amount, Decimal::new(200, 2));

        orders.shutdown().await;
        carts.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_shared_broker() {
        let broker = InMemoryBroker::new();
        let orders = runtime(&broker);
        orders.start_order_service().await.unwrap();

        orders.shutdown().await;
        assert!(broker.is_closed());
        assert!(orders
            .container()
            .order_service()
            .create_order(OrderDraft::new("u-1", 1))
            .await
            .is_err());
    }
}
