//! # Broker Message Payloads
//!
//! Payloads exchanged between the order service and the shopping-cart
//! service. These carry no correlation field of their own: the envelope
//! codec in `shared-bus` adds `CorrelationId` next to the payload fields
//! in the same JSON object.

use crate::entities::OrderItem;
use serde::{Deserialize, Serialize};

/// Request for the contents of a user's cart.
/// Sender: Order service | Receiver: Shopping-cart service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CartRequest {
    /// The user whose cart is wanted.
    pub user_id: String,
}

/// Reply carrying a user's cart lines.
/// Sender: Shopping-cart service | Receiver: Order service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CartResponse {
    /// Echo of the requested user.
    pub user_id: String,
    /// Cart lines; empty when the user has no cart.
    #[serde(default)]
    pub items: Vec<OrderItem>,
}
