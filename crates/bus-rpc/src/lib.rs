//! # Bus RPC - Request/Reply over a Message Broker
//!
//! Turns the broker's one-way queues into awaitable calls.
//!
//! ## Protocol
//!
//! 1. The caller generates a `CorrelationId` and registers it
//! 2. The request is published, with the id in its body, to the request queue
//! 3. A responder consumes it and publishes the reply, echoing the id, to the
//!    reply queue
//! 4. The reply listener matches the id and settles the waiting caller
//! 5. If no reply arrives before the deadline the caller gets
//!    [`RpcError::Timeout`] and a late reply is dropped
//!
//! ## Guarantees
//!
//! - Each correlation id is settled at most once (reply, timeout or cancel)
//! - Every settled or abandoned request leaves no registry entry behind
//! - Replies are never routed to the wrong caller

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod client;
pub mod domain;
pub mod responder;

pub use client::{ReplyDispatcher, RequestReplyClient};
pub use domain::{
    sweeper, CorrelationRegistry, PendingReply, RegistryStats, RpcConfig, RpcConfigError,
    RpcError, RpcResult, Settlement, StatsSnapshot, MAX_REQUEST_TIMEOUT_SECS,
};
pub use responder::{RequestHandler, Responder};
