//! # Transport
//!
//! The broker-facing seam. Everything above this module talks to a
//! [`Transport`]; concrete brokers (in-memory, AMQP) live behind it so the
//! request/reply layer can be tested without a running broker.

use crate::subscriber::SubscriptionHandle;
use crate::MAX_QUEUE_NAME_LEN;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Connection/channel level failures.
///
/// Never retried inside the transport; the caller owns the retry policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Could not open or keep the broker connection.
    #[error("Broker connection failed: {0}")]
    Connection(String),

    /// Channel-level failure (declare, qos, ack).
    #[error("Broker channel failed: {0}")]
    Channel(String),

    /// The transport was closed before or during the call.
    #[error("Transport closed")]
    Closed,

    /// Queue name empty, blank or too long.
    #[error("Invalid queue name: {0:?}")]
    InvalidQueueName(String),

    /// Publishing an empty body is refused.
    #[error("Refusing to publish an empty body to queue {queue}")]
    EmptyBody { queue: String },

    /// The broker rejected or failed the publish.
    #[error("Publish to queue {queue} failed: {reason}")]
    Publish { queue: String, reason: String },

    /// The broker rejected or failed the subscription.
    #[error("Subscribe to queue {queue} failed: {reason}")]
    Subscribe { queue: String, reason: String },
}

/// When a delivered message is removed from its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckMode {
    /// Removed only after the handler returns `Ok` (at-least-once).
    Manual,
    /// Removed as soon as it is handed to the handler (at-most-once).
    Auto,
}

/// A message as handed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Queue the message was consumed from.
    pub queue: String,
    /// Raw message body.
    pub body: Bytes,
    /// Broker-assigned tag, unique per consumer channel.
    pub delivery_tag: u64,
    /// Set when this message was handed out before and not acknowledged.
    pub redelivered: bool,
}

/// Why a handler did not accept a delivery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Worth trying again: the message is returned to the queue.
    #[error("transient handler failure: {0}")]
    Transient(String),

    /// Redelivery cannot help (e.g. malformed payload): the message is
    /// acknowledged and dropped.
    #[error("permanent handler failure: {0}")]
    Permanent(String),
}

/// Consumer callback for a subscription.
///
/// Handlers run on the subscription's delivery context, one delivery at a
/// time. A panic inside `handle` is contained and treated as
/// [`HandlerError::Transient`].
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Process one delivery.
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError>;
}

/// Adapter turning a synchronous closure into a [`MessageHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(Delivery) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
        (self.0)(delivery)
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Delivery) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Broker connection owned explicitly by whoever constructs it and passed to
/// its dependents.
///
/// Queues are declared durable, non-exclusive and non-auto-deleted; every
/// operation declares its queue idempotently first.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Declare `queue` if it does not exist yet.
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Enqueue `body` on `queue`. With `persistent`, the message survives a
    /// broker restart.
    ///
    /// # Errors
    ///
    /// - `BrokerError::InvalidQueueName` / `BrokerError::EmptyBody` on bad input
    /// - `BrokerError::Closed` after [`Transport::close`]
    /// - any broker failure, unretried
    async fn publish(&self, queue: &str, body: &[u8], persistent: bool) -> Result<(), BrokerError>;

    /// Start delivering messages from `queue` to `handler` on a dedicated
    /// delivery context.
    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        ack_mode: AckMode,
    ) -> Result<SubscriptionHandle, BrokerError>;

    /// Release channels and the connection. Idempotent. Delivery contexts
    /// stop; later calls fail with `BrokerError::Closed`.
    async fn close(&self) -> Result<(), BrokerError>;

    /// Whether [`Transport::close`] has been called.
    fn is_closed(&self) -> bool;
}

/// Check a queue name against broker limits.
pub fn validate_queue_name(queue: &str) -> Result<(), BrokerError> {
    if queue.trim().is_empty() || queue.len() > MAX_QUEUE_NAME_LEN {
        return Err(BrokerError::InvalidQueueName(queue.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_publish(queue: &str, body: &[u8]) -> Result<(), BrokerError> {
    validate_queue_name(queue)?;
    if body.is_empty() {
        return Err(BrokerError::EmptyBody {
            queue: queue.to_string(),
        });
    }
    Ok(())
}
