//! # Request/Reply Scenarios
//!
//! Correlation under concurrency, timeouts, late and foreign replies, and
//! callers that give up early. Every scenario ends with an empty registry.

#[cfg(test)]
mod tests {
    use crate::integration::{spawn_echo, Ping, Pong, REPLIES, REQUESTS};
    use bus_rpc::{CorrelationRegistry, RequestReplyClient, RpcConfig, RpcError};
    use futures::future::join_all;
    use serde::Deserialize;
    use shared_bus::{encode, InMemoryBroker, Transport};
    use shared_types::CorrelationId;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(broker: &InMemoryBroker) -> Arc<RequestReplyClient> {
        Arc::new(RequestReplyClient::new(
            Arc::new(broker.clone()),
            RpcConfig::default(),
        ))
    }

    async fn ping(
        client: &RequestReplyClient,
        seq: u64,
        delay_ms: u64,
        timeout: Duration,
    ) -> Result<Pong, RpcError> {
        client
            .request(
                REQUESTS,
                REPLIES,
                &Ping { seq, delay_ms },
                CorrelationId::new(),
                timeout,
            )
            .await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_thousand_concurrent_requests_each_get_their_reply() {
        let broker = InMemoryBroker::new();
        let _echo = spawn_echo(&broker).await;
        let client = client(&broker);
        client.start(&[REPLIES]).await.unwrap();

        let calls = (0..1000u64).map(|seq| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let pong = ping(&client, seq, 0, Duration::from_secs(30)).await?;
                Ok::<_, RpcError>((seq, pong))
            })
        });

        for joined in join_all(calls).await {
            let (seq, pong) = joined.unwrap().unwrap();
            assert_eq!(pong.seq, seq);
        }

        let stats = client.registry().stats().snapshot();
        assert_eq!(stats.registered, 1000);
        assert_eq!(stats.resolved, 1000);
        assert_eq!(stats.unmatched, 0);
        assert_eq!(client.pending_count(), 0);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_leaves_no_entry() {
        let broker = InMemoryBroker::new();
        let client = client(&broker);

        let err = ping(&client, 1, 0, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_retryable());
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.registry().stats().snapshot().expired, 1);
        // The request itself stays queued for a responder that never came.
        assert_eq!(broker.queue_depth(REQUESTS), 1);
    }

    #[tokio::test]
    async fn test_late_reply_is_dropped() {
        let broker = InMemoryBroker::new();
        let _echo = spawn_echo(&broker).await;
        let client = client(&broker);

        let err = ping(&client, 7, 300, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(500)).await;
        let stats = client.registry().stats().snapshot();
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.resolved, 0);
        assert_eq!(broker.queue_depth(REPLIES), 0);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_reply_is_acked_and_ignored() {
        let broker = InMemoryBroker::new();
        let client = client(&broker);
        client.start(&[REPLIES]).await.unwrap();

        let stray = encode(CorrelationId::new(), &Pong { seq: 99 }).unwrap();
        broker.publish(REPLIES, &stray, false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(broker.queue_depth(REPLIES), 0);
        assert_eq!(broker.unacked_count(REPLIES), 0);
        assert_eq!(client.registry().stats().snapshot().unmatched, 1);
    }

    #[tokio::test]
    async fn test_abandoned_request_is_cancelled() {
        let broker = InMemoryBroker::new();
        let _echo = spawn_echo(&broker).await;
        let client = client(&broker);

        let caller = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { ping(&client, 3, 500, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.pending_count(), 1);

        caller.abort();
        let _ = caller.await;
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.registry().stats().snapshot().cancelled, 1);

        // The reply still arrives and is discarded.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(client.registry().stats().snapshot().unmatched, 1);
    }

    #[tokio::test]
    async fn test_duplicate_correlation_id_rejected() {
        let broker = InMemoryBroker::new();
        let _echo = spawn_echo(&broker).await;
        let client = client(&broker);
        let id = CorrelationId::new();

        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request::<_, Pong>(
                        REQUESTS,
                        REPLIES,
                        &Ping { seq: 1, delay_ms: 200 },
                        id,
                        Duration::from_secs(5),
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = client
            .request::<_, Pong>(
                REQUESTS,
                REPLIES,
                &Ping { seq: 2, delay_ms: 0 },
                id,
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(second.unwrap_err(), RpcError::DuplicateCorrelationId(id));

        assert_eq!(first.await.unwrap().unwrap().seq, 1);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reply_of_wrong_shape_is_decode_error() {
        #[derive(Debug, Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }

        let broker = InMemoryBroker::new();
        let _echo = spawn_echo(&broker).await;
        let client = client(&broker);

        let err = client
            .call::<_, Named>(REQUESTS, REPLIES, &Ping { seq: 5, delay_ms: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
        assert!(!err.is_retryable());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_same_queue_for_request_and_reply_rejected() {
        let broker = InMemoryBroker::new();
        let client = client(&broker);

        let err = client
            .call::<_, Pong>(REQUESTS, REQUESTS, &Ping { seq: 1, delay_ms: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::InvalidQueues { .. }));
        assert_eq!(broker.published_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_broker_fails_fast() {
        let broker = InMemoryBroker::new();
        let client = client(&broker);
        broker.close().await.unwrap();

        let err = ping(&client, 1, 0, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Broker(_)));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_resolve_and_expire_race_settles_once() {
        let registry = Arc::new(CorrelationRegistry::<u64>::new());

        for round in 0..500u64 {
            let id = CorrelationId::new();
            let pending = registry
                .register(id, "race", Duration::from_secs(1))
                .unwrap();

            let resolver = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.resolve(id, round) })
            };
            let expirer = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.expire(id) })
            };
            let resolved = resolver.await.unwrap();
            let expired = expirer.await.unwrap();

            assert!(resolved ^ expired, "round {round} settled twice or never");
            assert!(!registry.contains(&id));
            drop(pending);
        }

        let stats = registry.stats().snapshot();
        assert_eq!(stats.resolved + stats.expired, 500);
        assert_eq!(registry.pending_count(), 0);
    }
}
