//! # Delivery Guarantees
//!
//! How the request/reply layer behaves on top of the broker's delivery
//! semantics: poison messages, transient failures, restarts, and requests
//! that wait in the queue for a responder to come up.

#[cfg(test)]
mod tests {
    use crate::integration::{spawn_echo, Ping, Pong, REPLIES, REQUESTS};
    use bus_rpc::{RequestReplyClient, RpcConfig};
    use shared_bus::{
        encode, handler_fn, AckMode, Delivery, HandlerError, InMemoryBroker, Transport,
    };
    use shared_types::CorrelationId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_poison_request_does_not_block_queue() {
        let broker = InMemoryBroker::new();
        let _echo = spawn_echo(&broker).await;
        let client = RequestReplyClient::new(Arc::new(broker.clone()), RpcConfig::default());

        broker.publish(REQUESTS, b"\xff\xfe", true).await.unwrap();
        broker
            .publish(REQUESTS, br#"{"Seq":1}"#, true)
            .await
            .unwrap();

        let pong: Pong = client
            .call(REQUESTS, REPLIES, &Ping { seq: 2, delay_ms: 0 })
            .await
            .unwrap();
        assert_eq!(pong.seq, 2);
        assert_eq!(broker.queue_depth(REQUESTS), 0);
        assert_eq!(broker.unacked_count(REQUESTS), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_redelivered() {
        let broker = InMemoryBroker::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();

        let _sub = {
            let attempts = Arc::clone(&attempts);
            broker
                .subscribe(
                    "Flaky",
                    handler_fn(move |d| {
                        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                            return Err(HandlerError::Transient("not yet".into()));
                        }
                        let _ = tx.send(d);
                        Ok(())
                    }),
                    AckMode::Manual,
                )
                .await
                .unwrap()
        };

        broker.publish("Flaky", b"payload", true).await.unwrap();
        let delivery = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .unwrap();

        assert_eq!(&delivery.body[..], b"payload");
        assert!(delivery.redelivered);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        settle().await;
        assert_eq!(broker.queue_depth("Flaky"), 0);
        assert_eq!(broker.unacked_count("Flaky"), 0);
    }

    #[tokio::test]
    async fn test_request_waits_for_late_responder() {
        let broker = InMemoryBroker::new();
        let client = Arc::new(RequestReplyClient::new(
            Arc::new(broker.clone()),
            RpcConfig::default(),
        ));

        let caller = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .call::<_, Pong>(REQUESTS, REPLIES, &Ping { seq: 11, delay_ms: 0 })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(broker.queue_depth(REQUESTS), 1);

        let _echo = spawn_echo(&broker).await;
        let pong = tokio::time::timeout(Duration::from_secs(2), caller)
            .await
            .expect("timeout")
            .unwrap()
            .unwrap();
        assert_eq!(pong.seq, 11);
    }

    #[tokio::test]
    async fn test_restart_keeps_persistent_requests_only() {
        let broker = InMemoryBroker::new();

        let durable = encode(CorrelationId::new(), &Ping { seq: 1, delay_ms: 0 }).unwrap();
        let fleeting = encode(CorrelationId::new(), &Ping { seq: 2, delay_ms: 0 }).unwrap();
        broker.publish(REQUESTS, &durable, true).await.unwrap();
        broker.publish(REQUESTS, &fleeting, false).await.unwrap();
        assert_eq!(broker.queue_depth(REQUESTS), 2);

        broker.restart();
        assert_eq!(broker.queue_depth(REQUESTS), 1);
        assert!(broker.has_queue(REQUESTS));

        let _echo = spawn_echo(&broker).await;
        settle().await;
        assert_eq!(broker.queue_depth(REQUESTS), 0);
        assert_eq!(broker.queue_depth(REPLIES), 1);
    }

    #[tokio::test]
    async fn test_stopped_responder_leaves_requests_queued() {
        let broker = InMemoryBroker::new();
        let echo = spawn_echo(&broker).await;
        echo.stop().await;

        let body = encode(CorrelationId::new(), &Ping { seq: 4, delay_ms: 0 }).unwrap();
        broker.publish(REQUESTS, &body, true).await.unwrap();
        settle().await;

        assert_eq!(broker.queue_depth(REQUESTS), 1);
        assert_eq!(broker.queue_depth(REPLIES), 0);
    }
}
