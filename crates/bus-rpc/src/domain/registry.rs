//! Correlation Registry - pairs in-flight requests with their replies.
//!
//! Flow:
//! 1. Caller picks a [`CorrelationId`] and calls `register()` to get a [`PendingReply`]
//! 2. Caller publishes the request carrying that id
//! 3. The reply listener decodes a reply and calls `resolve()`
//! 4. Caller awaits the [`PendingReply`], calling `expire()` when its timer fires
//!
//! Every settling operation (`resolve`, `expire`, `cancel`) removes the entry
//! from the map first and only the remover settles it, so an id is settled
//! at most once no matter how the operations race.

use crate::domain::error::RpcError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::CorrelationId;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Deadline used when `created_at + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How a pending request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    /// A matching reply arrived.
    Reply(T),
    /// The deadline passed first.
    Expired,
    /// The caller abandoned the call (or the registry shut down).
    Cancelled,
}

/// A request waiting for its reply
struct PendingRequest<T> {
    /// Settles the caller's `PendingReply`
    sender: oneshot::Sender<Settlement<T>>,
    /// When the request was registered
    created_at: Instant,
    /// When the request stops waiting
    deadline: Instant,
    /// Free-form label (for logging)
    label: String,
}

/// Receiving half of a registration. Resolves to the [`Settlement`].
///
/// If the registry drops the entry without settling it, this resolves to
/// [`Settlement::Cancelled`].
#[derive(Debug)]
pub struct PendingReply<T> {
    correlation_id: CorrelationId,
    deadline: Instant,
    receiver: oneshot::Receiver<Settlement<T>>,
}

impl<T> PendingReply<T> {
    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl<T> Future for PendingReply<T> {
    type Output = Settlement<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Settlement::Cancelled))
    }
}

/// Registry counters
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests settled with a reply
    pub total_resolved: AtomicU64,
    /// Total requests that hit their deadline
    pub total_expired: AtomicU64,
    /// Total requests abandoned by their caller
    pub total_cancelled: AtomicU64,
    /// Replies with no pending entry (late, duplicate or foreign)
    pub total_unmatched: AtomicU64,
    /// Replies that matched an entry whose caller had already gone
    pub total_orphaned: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub resolved: u64,
    pub expired: u64,
    pub cancelled: u64,
    pub unmatched: u64,
    pub orphaned: u64,
}

impl RegistryStats {
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            resolved: self.total_resolved.load(Ordering::Relaxed),
            expired: self.total_expired.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            unmatched: self.total_unmatched.load(Ordering::Relaxed),
            orphaned: self.total_orphaned.load(Ordering::Relaxed),
        }
    }
}

/// Concurrent `CorrelationId -> PendingRequest` map.
///
/// Sharded, so operations on the same id serialize on one shard lock while
/// unrelated ids proceed in parallel.
pub struct CorrelationRegistry<T> {
    pending: DashMap<CorrelationId, PendingRequest<T>>,
    stats: RegistryStats,
}

impl<T> CorrelationRegistry<T> {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: RegistryStats::default(),
        }
    }

    /// Register `correlation_id` and get the handle its settlement arrives on.
    ///
    /// # Errors
    ///
    /// `RpcError::DuplicateCorrelationId` if the id is already pending. The
    /// existing entry is left untouched.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        label: &str,
        timeout: Duration,
    ) -> Result<PendingReply<T>, RpcError> {
        let (tx, rx) = oneshot::channel();
        let created_at = Instant::now();
        let deadline = created_at
            .checked_add(timeout)
            .unwrap_or_else(|| created_at + FAR_FUTURE);

        match self.pending.entry(correlation_id) {
            Entry::Occupied(_) => {
                warn!(correlation_id = %correlation_id, label = label, "Duplicate correlation id");
                return Err(RpcError::DuplicateCorrelationId(correlation_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    sender: tx,
                    created_at,
                    deadline,
                    label: label.to_string(),
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            label = label,
            timeout_ms = timeout.as_millis(),
            "Registered pending request"
        );

        Ok(PendingReply {
            correlation_id,
            deadline,
            receiver: rx,
        })
    }

    /// Settle `correlation_id` with a reply.
    ///
    /// Returns true if the entry was pending (and is now removed), even when
    /// its caller had already gone. Returns false, discarding `payload`, if
    /// the id is unknown or already settled.
    pub fn resolve(&self, correlation_id: CorrelationId, payload: T) -> bool {
        let Some((_, pending)) = self.pending.remove(&correlation_id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                "Reply for unknown or settled correlation id, dropping"
            );
            return false;
        };

        let response_time = pending.created_at.elapsed();
        self.stats.total_resolved.fetch_add(1, Ordering::Relaxed);
        if pending.sender.send(Settlement::Reply(payload)).is_err() {
            self.stats.total_orphaned.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                label = pending.label,
                "Reply arrived after its caller went away"
            );
        } else {
            debug!(
                correlation_id = %correlation_id,
                label = pending.label,
                response_time_ms = response_time.as_millis(),
                "Resolved pending request"
            );
        }
        true
    }

    /// Settle `correlation_id` as timed out.
    ///
    /// Returns false if it was already settled (a reply won the race).
    pub fn expire(&self, correlation_id: CorrelationId) -> bool {
        let Some((_, pending)) = self.pending.remove(&correlation_id) else {
            return false;
        };
        self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
        warn!(
            correlation_id = %correlation_id,
            label = pending.label,
            elapsed_ms = pending.created_at.elapsed().as_millis(),
            "Pending request expired"
        );
        let _ = pending.sender.send(Settlement::Expired);
        true
    }

    /// Settle `correlation_id` as abandoned by its caller.
    pub fn cancel(&self, correlation_id: CorrelationId) -> bool {
        let Some((_, pending)) = self.pending.remove(&correlation_id) else {
            return false;
        };
        self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            label = pending.label,
            "Pending request cancelled"
        );
        let _ = pending.sender.send(Settlement::Cancelled);
        true
    }

    /// Cancel everything still pending. Returns the number cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|e| *e.key()).collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Expire every entry whose deadline has passed.
    ///
    /// Returns the number of requests expired.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let overdue: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|e| e.value().deadline <= now)
            .map(|e| *e.key())
            .collect();

        overdue.into_iter().filter(|id| self.expire(*id)).count()
    }

    /// Whether `correlation_id` is still waiting.
    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Number of requests still waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

impl<T> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task expiring overdue entries every `interval`.
///
/// Holds only a weak reference and exits once the registry is dropped.
pub async fn sweeper<T>(registry: Weak<CorrelationRegistry<T>>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let Some(registry) = registry.upgrade() else {
            debug!("Registry dropped, sweeper exiting");
            return;
        };
        let expired = registry.sweep_expired();
        if expired > 0 {
            debug!(expired = expired, "Swept expired pending requests");
        }
    }
}
