//! # Shared Bus - Broker Transport for Inter-Service Messaging
//!
//! Named durable queues on a message broker, reached through the
//! [`Transport`] trait, plus the JSON envelope codec that carries a
//! correlation id next to each payload.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────┐  publish(queue)   ┌──────────────┐  deliver   ┌──────────────┐
//! │   Service A  │ ────────────────▶ │    Broker    │ ─────────▶ │   Service B  │
//! │              │                   │ (queue FIFO) │            │  (handler)   │
//! └──────────────┘                   └──────────────┘            └──────────────┘
//! ```
//!
//! - [`InMemoryBroker`]: in-process broker for tests and single-process runs
//! - `AmqpTransport` (feature `amqp`): RabbitMQ via `lapin`
//!
//! ## Delivery Guarantees
//!
//! - **At-least-once** under [`AckMode::Manual`]: a message is removed only
//!   after its handler returns `Ok`, or fails permanently.
//! - **FIFO per queue** for a single consumer; redelivered messages return
//!   to the head of the queue.
//! - **Persistence**: messages published with `persistent = true` survive a
//!   broker restart; others may not.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod envelope;
pub mod memory;
pub mod subscriber;
pub mod transport;

#[cfg(feature = "amqp")]
pub use amqp::AmqpTransport;
pub use envelope::{
    decode, encode, peek_correlation_id, DecodeError, EncodeError, Envelope, CORRELATION_FIELD,
};
pub use memory::InMemoryBroker;
pub use subscriber::SubscriptionHandle;
pub use transport::{
    handler_fn, validate_queue_name, AckMode, BrokerError, Delivery, FnHandler, HandlerError,
    MessageHandler, Transport,
};

/// Unacknowledged deliveries allowed per subscription.
pub const DEFAULT_PREFETCH: u16 = 1;

/// AMQP delivery mode for messages that must survive a broker restart.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// AMQP delivery mode for messages the broker may keep in memory only.
pub const TRANSIENT_DELIVERY_MODE: u8 = 1;

/// Longest queue name a broker accepts (AMQP short string).
pub const MAX_QUEUE_NAME_LEN: usize = 255;
