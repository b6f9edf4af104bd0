//! # In-Memory Broker
//!
//! A [`Transport`] with broker semantics and no network: named FIFO queues,
//! unacknowledged-message tracking, redelivery on failure, and a simulated
//! restart that keeps only persistent messages.
//!
//! ## Delivery Contexts
//!
//! Each subscription runs on its own tokio task and processes one message at
//! a time (prefetch 1). A message handed out under [`AckMode::Manual`] stays
//! in the queue's unacked set until its handler settles it. If the delivery
//! context dies first (abort, shutdown mid-delivery), the message goes back
//! to the head of the queue flagged as redelivered.

use crate::subscriber::{
    dispatch, shutdown_requested, stop_requested, Disposition, Signal, SubscriptionHandle,
};
use crate::transport::{
    validate_publish, validate_queue_name, AckMode, BrokerError, Delivery, MessageHandler,
    Transport,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, trace};

#[derive(Debug, Clone)]
struct StoredMessage {
    body: Bytes,
    persistent: bool,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, StoredMessage>,
    next_tag: u64,
}

#[derive(Debug)]
struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MemoryQueue {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    fn push(&self, message: StoredMessage) {
        self.state.lock().ready.push_back(message);
        self.notify.notify_waiters();
    }

    fn take(&self, ack_mode: AckMode) -> Option<Delivery> {
        let mut state = self.state.lock();
        let message = state.ready.pop_front()?;
        state.next_tag += 1;
        let delivery_tag = state.next_tag;

        let delivery = Delivery {
            queue: self.name.clone(),
            body: message.body.clone(),
            delivery_tag,
            redelivered: message.redelivered,
        };
        if ack_mode == AckMode::Manual {
            state.unacked.insert(delivery_tag, message);
        }
        Some(delivery)
    }

    fn ack(&self, delivery_tag: u64) {
        self.state.lock().unacked.remove(&delivery_tag);
    }

    fn requeue(&self, delivery_tag: u64) {
        {
            let mut state = self.state.lock();
            let Some(mut message) = state.unacked.remove(&delivery_tag) else {
                return;
            };
            message.redelivered = true;
            state.ready.push_front(message);
        }
        self.notify.notify_waiters();
    }

    /// Returns `(returned, lost)`.
    fn restart(&self) -> (usize, usize) {
        let (returned, lost) = {
            let mut state = self.state.lock();
            let mut outstanding: Vec<(u64, StoredMessage)> = state.unacked.drain().collect();
            outstanding.sort_by_key(|(tag, _)| *tag);
            let returned = outstanding.len();
            for (_, mut message) in outstanding.into_iter().rev() {
                message.redelivered = true;
                state.ready.push_front(message);
            }

            let before = state.ready.len();
            state.ready.retain(|m| m.persistent);
            (returned, before - state.ready.len())
        };
        self.notify.notify_waiters();
        (returned, lost)
    }

    fn depth(&self) -> usize {
        self.state.lock().ready.len()
    }

    fn unacked(&self) -> usize {
        self.state.lock().unacked.len()
    }
}

/// Settles a manual-ack delivery; requeues it if dropped unsettled.
struct InFlight<'a> {
    queue: &'a MemoryQueue,
    delivery_tag: u64,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, disposition: Disposition) {
        match disposition {
            Disposition::Ack | Disposition::Reject => self.queue.ack(self.delivery_tag),
            Disposition::Requeue => self.queue.requeue(self.delivery_tag),
        }
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.queue.requeue(self.delivery_tag);
        }
    }
}

struct BrokerInner {
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    next_consumer: AtomicU64,
    published: AtomicU64,
}

/// In-process broker. Cloning shares the same queues.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(BrokerInner {
                queues: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                shutdown,
                next_consumer: AtomicU64::new(1),
                published: AtomicU64::new(0),
            }),
        }
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }

    fn queue(&self, name: &str) -> Arc<MemoryQueue> {
        let mut queues = self.inner.queues.lock();
        Arc::clone(
            queues
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryQueue::new(name))),
        )
    }

    fn existing(&self, name: &str) -> Option<Arc<MemoryQueue>> {
        self.inner.queues.lock().get(name).cloned()
    }

    /// Messages waiting for delivery on `queue`.
    #[must_use]
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.existing(queue).map_or(0, |q| q.depth())
    }

    /// Messages handed out on `queue` and not yet acknowledged.
    #[must_use]
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.existing(queue).map_or(0, |q| q.unacked())
    }

    /// Total successful publishes since creation.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Whether `queue` has been declared.
    #[must_use]
    pub fn has_queue(&self, queue: &str) -> bool {
        self.inner.queues.lock().contains_key(queue)
    }

    /// Simulate a broker restart: every unacknowledged message returns to
    /// its queue, then non-persistent messages are discarded. Queues
    /// themselves are durable and survive.
    pub fn restart(&self) {
        let queues: Vec<Arc<MemoryQueue>> = self.inner.queues.lock().values().cloned().collect();
        let (mut returned, mut lost) = (0, 0);
        for queue in queues {
            let (r, l) = queue.restart();
            returned += r;
            lost += l;
        }
        info!(
            returned = returned,
            lost = lost,
            "In-memory broker restarted"
        );
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        validate_queue_name(queue)?;
        self.ensure_open()?;
        self.queue(queue);
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8], persistent: bool) -> Result<(), BrokerError> {
        validate_publish(queue, body)?;
        self.ensure_open()?;

        self.queue(queue).push(StoredMessage {
            body: Bytes::copy_from_slice(body),
            persistent,
            redelivered: false,
        });
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        trace!(queue = %queue, bytes = body.len(), persistent = persistent, "Published");
        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        ack_mode: AckMode,
    ) -> Result<SubscriptionHandle, BrokerError> {
        validate_queue_name(queue)?;
        self.ensure_open()?;

        let target = self.queue(queue);
        let consumer_tag = format!(
            "mem-{}-{}",
            queue,
            self.inner.next_consumer.fetch_add(1, Ordering::Relaxed)
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        let shutdown = self.inner.shutdown.subscribe();

        let task = tokio::spawn(consume(
            target,
            handler,
            ack_mode,
            stop_rx,
            shutdown,
            consumer_tag.clone(),
        ));

        debug!(queue = %queue, consumer_tag = %consumer_tag, ?ack_mode, "Subscribed");
        Ok(SubscriptionHandle::new(
            queue.to_string(),
            consumer_tag,
            stop_tx,
            task,
        ))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.shutdown.send_replace(true);
        info!("In-memory broker closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

async fn consume(
    queue: Arc<MemoryQueue>,
    handler: Arc<dyn MessageHandler>,
    ack_mode: AckMode,
    mut stop: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
    consumer_tag: String,
) {
    let mut detached = false;

    loop {
        if (!detached && *stop.borrow()) || *shutdown.borrow() {
            break;
        }

        let notified = queue.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let delivery = match queue.take(ack_mode) {
            Some(delivery) => delivery,
            None => {
                tokio::select! {
                    _ = &mut notified => {}
                    signal = stop_requested(&mut stop), if !detached => match signal {
                        Signal::Stop => break,
                        Signal::Detached => detached = true,
                    },
                    _ = shutdown_requested(&mut shutdown) => break,
                }
                continue;
            }
        };

        match ack_mode {
            AckMode::Auto => {
                dispatch(&handler, delivery).await;
            }
            AckMode::Manual => {
                let guard = InFlight {
                    queue: &queue,
                    delivery_tag: delivery.delivery_tag,
                    settled: false,
                };
                let disposition = dispatch(&handler, delivery).await;
                guard.settle(disposition);
                if disposition == Disposition::Requeue {
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    debug!(queue = %queue.name, consumer_tag = %consumer_tag, "Delivery context exited");
}
