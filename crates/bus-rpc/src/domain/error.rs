//! Request/reply error taxonomy.

use shared_bus::{BrokerError, DecodeError, EncodeError};
use shared_types::CorrelationId;
use std::time::Duration;
use thiserror::Error;

/// Why a request did not produce a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Broker or connection failure while subscribing or publishing.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// The request payload could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The reply did not match the caller's reply type.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// No reply within the deadline.
    #[error("No reply for {correlation_id} within {timeout:?}")]
    Timeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// Another request with this id is still pending.
    #[error("Correlation id {0} is already pending")]
    DuplicateCorrelationId(CorrelationId),

    /// The request was abandoned before a reply arrived.
    #[error("Request {0} cancelled")]
    Cancelled(CorrelationId),

    /// Request and reply queue must be distinct, valid names.
    #[error("Invalid queues: request {request_queue:?}, reply {reply_queue:?}")]
    InvalidQueues {
        request_queue: String,
        reply_queue: String,
    },
}

impl RpcError {
    /// Whether issuing the same request again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Broker(_) | Self::Timeout { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
