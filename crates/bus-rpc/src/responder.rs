//! # Responder
//!
//! The serving side of request/reply: consume a request queue, hand each
//! decoded request to a [`RequestHandler`], and publish the reply under the
//! request's correlation id.
//!
//! | Situation | Outcome |
//! |---|---|
//! | Request cannot be decoded | acked and dropped (permanent) |
//! | Handler returns an error | logged and acked, no reply sent |
//! | Reply publish fails | left for redelivery (transient) |

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_bus::{
    decode, encode, AckMode, BrokerError, Delivery, HandlerError, MessageHandler,
    SubscriptionHandle, Transport,
};
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

/// Business logic answering one kind of request.
#[async_trait]
pub trait RequestHandler<Req, Rep>: Send + Sync + 'static {
    type Error: Display + Send;

    async fn handle(&self, request: Req) -> Result<Rep, Self::Error>;
}

/// Adapts a [`RequestHandler`] into a request-queue [`MessageHandler`].
pub struct Responder<Req, Rep, H> {
    transport: Arc<dyn Transport>,
    reply_queue: String,
    persistent_replies: bool,
    handler: H,
    _marker: PhantomData<fn(Req) -> Rep>,
}

impl<Req, Rep, H> Responder<Req, Rep, H>
where
    Req: DeserializeOwned + Send + 'static,
    Rep: Serialize + Send + Sync + 'static,
    H: RequestHandler<Req, Rep>,
{
    pub fn new(
        transport: Arc<dyn Transport>,
        reply_queue: impl Into<String>,
        persistent_replies: bool,
        handler: H,
    ) -> Self {
        Self {
            transport,
            reply_queue: reply_queue.into(),
            persistent_replies,
            handler,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Subscribe to `request_queue` (manual ack) and serve until stopped.
    pub async fn serve(self, request_queue: &str) -> Result<SubscriptionHandle, BrokerError> {
        let transport = Arc::clone(&self.transport);
        transport
            .subscribe(request_queue, Arc::new(self), AckMode::Manual)
            .await
    }
}

#[async_trait]
impl<Req, Rep, H> MessageHandler for Responder<Req, Rep, H>
where
    Req: DeserializeOwned + Send + 'static,
    Rep: Serialize + Send + Sync + 'static,
    H: RequestHandler<Req, Rep>,
{
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
        let envelope = decode::<Req>(&delivery.body)
            .map_err(|e| HandlerError::Permanent(format!("undecodable request: {e}")))?;
        let correlation_id = envelope.correlation_id;

        let reply = match self.handler.handle(envelope.payload).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    queue = %delivery.queue,
                    error = %e,
                    "Request handler failed, no reply sent"
                );
                return Ok(());
            }
        };

        let body = encode(correlation_id, &reply)
            .map_err(|e| HandlerError::Permanent(format!("unencodable reply: {e}")))?;
        self.transport
            .publish(&self.reply_queue, &body, self.persistent_replies)
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        debug!(
            correlation_id = %correlation_id,
            reply_queue = %self.reply_queue,
            "Reply sent"
        );
        Ok(())
    }
}
