//! # Error Types
//!
//! Errors raised by the shared entity types themselves.

use thiserror::Error;

/// Errors converting raw values into entities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// Numeric order status id with no matching [`crate::OrderStatus`].
    #[error("Unknown order status id: {0}")]
    UnknownOrderStatus(i32),
}
