//! # Request/Reply Client
//!
//! Synchronous-looking request/reply over a one-way transport. A request is
//! registered under its correlation id, published to the request queue, and
//! settled by the shared reply listener when the matching reply arrives on
//! the reply queue.
//!
//! ```text
//! request() ──register──▶ CorrelationRegistry ◀──resolve── ReplyDispatcher
//!     │                         ▲                              ▲
//!     └──publish(request_queue) │ expire on timeout            │ reply_queue
//!                               └──────────────────────────────┘
//! ```
//!
//! Each reply queue gets one manual-ack subscription, created on first use
//! and shared by every call.

use crate::domain::{sweeper, CorrelationRegistry, RpcConfig, RpcError, Settlement};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_bus::{
    decode, encode, validate_queue_name, AckMode, DecodeError, Delivery, HandlerError,
    MessageHandler, SubscriptionHandle, Transport,
};
use shared_types::CorrelationId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Settles pending requests from messages on a reply queue.
pub struct ReplyDispatcher {
    registry: Arc<CorrelationRegistry<Value>>,
}

impl ReplyDispatcher {
    pub fn new(registry: Arc<CorrelationRegistry<Value>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MessageHandler for ReplyDispatcher {
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
        let envelope = decode::<Value>(&delivery.body)
            .map_err(|e| HandlerError::Permanent(format!("undecodable reply: {e}")))?;

        debug!(
            queue = %delivery.queue,
            correlation_id = %envelope.correlation_id,
            redelivered = delivery.redelivered,
            "Reply received"
        );
        // Unmatched replies are counted and logged by the registry.
        self.registry.resolve(envelope.correlation_id, envelope.payload);
        Ok(())
    }
}

/// Cancels the registration if the request future is dropped early.
struct CancelOnDrop<'a> {
    registry: &'a CorrelationRegistry<Value>,
    correlation_id: CorrelationId,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.registry.cancel(self.correlation_id);
    }
}

/// Request/reply client shared by every caller in the process.
pub struct RequestReplyClient {
    /// Broker connection
    transport: Arc<dyn Transport>,
    /// Pending requests by correlation id
    registry: Arc<CorrelationRegistry<Value>>,
    /// One standing subscription per reply queue
    reply_subscriptions: tokio::sync::Mutex<HashMap<String, SubscriptionHandle>>,
    /// Registry sweeper, started by `start()`
    sweeper: Mutex<Option<JoinHandle<()>>>,
    config: RpcConfig,
}

impl RequestReplyClient {
    pub fn new(transport: Arc<dyn Transport>, config: RpcConfig) -> Self {
        Self {
            transport,
            registry: Arc::new(CorrelationRegistry::new()),
            reply_subscriptions: tokio::sync::Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CorrelationRegistry<Value>> {
        &self.registry
    }

    /// Requests still waiting for a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    /// Subscribe to `reply_queues` up front and start the registry sweeper.
    pub async fn start(&self, reply_queues: &[&str]) -> Result<(), RpcError> {
        for queue in reply_queues {
            validate_queue_name(queue)?;
            self.ensure_reply_subscription(queue).await?;
        }

        if let Some(interval) = self.config.sweep_interval() {
            let mut slot = self.sweeper.lock();
            if slot.is_none() {
                *slot = Some(tokio::spawn(sweeper(Arc::downgrade(&self.registry), interval)));
            }
        }
        Ok(())
    }

    /// Stop reply subscriptions and the sweeper, cancelling any request
    /// still waiting.
    pub async fn shutdown(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
        }

        let subscriptions: Vec<SubscriptionHandle> = {
            let mut subs = self.reply_subscriptions.lock().await;
            subs.drain().map(|(_, handle)| handle).collect()
        };
        for handle in subscriptions {
            handle.stop().await;
        }

        let cancelled = self.registry.cancel_all();
        info!(cancelled = cancelled, "Request/reply client shut down");
    }

    /// Send `payload` to `request_queue` and wait up to `timeout` for the
    /// reply carrying the same `correlation_id` on `reply_queue`.
    ///
    /// Dropping the returned future cancels the registration.
    ///
    /// # Errors
    ///
    /// - `RpcError::InvalidQueues` if the queues are equal or invalid
    /// - `RpcError::DuplicateCorrelationId` if the id is already pending
    /// - `RpcError::Broker` / `RpcError::Encode` if the request cannot go out
    /// - `RpcError::Timeout` if no reply arrives in time
    /// - `RpcError::Decode` if the reply does not match `Rep`
    pub async fn request<Req, Rep>(
        &self,
        request_queue: &str,
        reply_queue: &str,
        payload: &Req,
        correlation_id: CorrelationId,
        timeout: Duration,
    ) -> Result<Rep, RpcError>
    where
        Req: Serialize + ?Sized + Sync,
        Rep: DeserializeOwned,
    {
        validate_queues(request_queue, reply_queue)?;

        let mut pending = self
            .registry
            .register(correlation_id, request_queue, timeout)?;
        let _cancel = CancelOnDrop {
            registry: &self.registry,
            correlation_id,
        };

        self.ensure_reply_subscription(reply_queue).await?;

        let body = encode(correlation_id, payload)?;
        self.transport
            .publish(request_queue, &body, self.config.persistent_requests)
            .await?;

        debug!(
            correlation_id = %correlation_id,
            request_queue = request_queue,
            reply_queue = reply_queue,
            "Sent request"
        );

        let settlement = match tokio::time::timeout(timeout, &mut pending).await {
            Ok(settlement) => settlement,
            Err(_) => {
                if self.registry.expire(correlation_id) {
                    Settlement::Expired
                } else {
                    // A reply settled the entry between the timer and expire.
                    pending.await
                }
            }
        };

        match settlement {
            Settlement::Reply(value) => serde_json::from_value(value)
                .map_err(|e| RpcError::Decode(DecodeError::Payload(e.to_string()))),
            Settlement::Expired => Err(RpcError::Timeout {
                correlation_id,
                timeout,
            }),
            Settlement::Cancelled => Err(RpcError::Cancelled(correlation_id)),
        }
    }

    /// [`Self::request`] with a fresh correlation id and the configured
    /// default timeout.
    pub async fn call<Req, Rep>(
        &self,
        request_queue: &str,
        reply_queue: &str,
        payload: &Req,
    ) -> Result<Rep, RpcError>
    where
        Req: Serialize + ?Sized + Sync,
        Rep: DeserializeOwned,
    {
        self.request(
            request_queue,
            reply_queue,
            payload,
            CorrelationId::new(),
            self.config.request_timeout(),
        )
        .await
    }

    async fn ensure_reply_subscription(&self, reply_queue: &str) -> Result<(), RpcError> {
        let mut subs = self.reply_subscriptions.lock().await;
        if subs.get(reply_queue).is_some_and(SubscriptionHandle::is_active) {
            return Ok(());
        }

        let handler = Arc::new(ReplyDispatcher::new(Arc::clone(&self.registry)));
        let handle = self
            .transport
            .subscribe(reply_queue, handler, AckMode::Manual)
            .await?;
        info!(reply_queue = reply_queue, "Listening for replies");
        subs.insert(reply_queue.to_string(), handle);
        Ok(())
    }
}

impl Drop for RequestReplyClient {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.abort();
        }
    }
}

fn validate_queues(request_queue: &str, reply_queue: &str) -> Result<(), RpcError> {
    let invalid = || RpcError::InvalidQueues {
        request_queue: request_queue.to_string(),
        reply_queue: reply_queue.to_string(),
    };
    if request_queue == reply_queue {
        return Err(invalid());
    }
    validate_queue_name(request_queue).map_err(|_| invalid())?;
    validate_queue_name(reply_queue).map_err(|_| invalid())?;
    Ok(())
}
