//! # Subscriber
//!
//! Subscription handles and the per-delivery dispatch shared by every
//! transport implementation.

use crate::transport::{Delivery, HandlerError, MessageHandler};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// What the delivery context does with a message after its handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Handled; remove from the queue.
    Ack,
    /// Return to the queue for redelivery.
    Requeue,
    /// Unprocessable; remove from the queue without processing.
    Reject,
}

/// Run `handler` on `delivery` in its own task so that a panic cannot take
/// the delivery context down with it.
pub(crate) async fn dispatch(handler: &Arc<dyn MessageHandler>, delivery: Delivery) -> Disposition {
    let queue = delivery.queue.clone();
    let delivery_tag = delivery.delivery_tag;
    let handler = Arc::clone(handler);

    match tokio::spawn(async move { handler.handle(delivery).await }).await {
        Ok(Ok(())) => Disposition::Ack,
        Ok(Err(HandlerError::Transient(reason))) => {
            warn!(
                queue = %queue,
                delivery_tag = delivery_tag,
                reason = %reason,
                "Handler failed, message returned for redelivery"
            );
            Disposition::Requeue
        }
        Ok(Err(HandlerError::Permanent(reason))) => {
            warn!(
                queue = %queue,
                delivery_tag = delivery_tag,
                reason = %reason,
                "Handler rejected message, dropping it"
            );
            Disposition::Reject
        }
        Err(join_error) if join_error.is_panic() => {
            error!(
                queue = %queue,
                delivery_tag = delivery_tag,
                "Handler panicked, message returned for redelivery"
            );
            Disposition::Requeue
        }
        Err(join_error) => {
            warn!(
                queue = %queue,
                delivery_tag = delivery_tag,
                error = %join_error,
                "Handler task cancelled, message returned for redelivery"
            );
            Disposition::Requeue
        }
    }
}

/// Handle to a running subscription.
///
/// Dropping the handle detaches it: the subscription keeps delivering for
/// the lifetime of the transport. [`SubscriptionHandle::stop`] is meant for
/// shutdown.
#[derive(Debug)]
pub struct SubscriptionHandle {
    queue: String,
    consumer_tag: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        queue: String,
        consumer_tag: String,
        stop: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            queue,
            consumer_tag,
            stop,
            task,
        }
    }

    /// Queue this subscription consumes from.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Consumer tag assigned at subscribe time.
    #[must_use]
    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Whether the delivery context is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop after the in-flight delivery (if any) settles, and wait for the
    /// delivery context to exit.
    pub async fn stop(self) {
        self.stop.send_replace(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                error!(queue = %self.queue, consumer_tag = %self.consumer_tag, "Delivery context panicked");
            }
        }
        debug!(queue = %self.queue, consumer_tag = %self.consumer_tag, "Subscription stopped");
    }

    /// Tear the delivery context down immediately, as a crash would.
    /// An unacknowledged in-flight message goes back to its queue.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Outcome of waiting for the next stop/shutdown signal.
pub(crate) enum Signal {
    /// Stop was requested or the transport shut down.
    Stop,
    /// The handle was dropped; the subscription runs detached from now on.
    Detached,
}

/// Resolve once `stop` flips to true or its sender goes away.
pub(crate) async fn stop_requested(stop: &mut watch::Receiver<bool>) -> Signal {
    loop {
        if *stop.borrow_and_update() {
            return Signal::Stop;
        }
        if stop.changed().await.is_err() {
            return Signal::Detached;
        }
    }
}

/// Resolve once the transport-wide shutdown flag is set, or the transport
/// itself was dropped.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
