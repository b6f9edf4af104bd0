//! # Domain Entities
//!
//! Order and cart entities shared by the order and shopping-cart services.
//! Field names on the wire follow the PascalCase convention the services
//! have always used (`MenuItemId`, `Price`, ...).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::EntityError;

/// Identifier of a persisted order.
pub type OrderId = i64;

/// A single line of a cart or an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderItem {
    /// Menu item this line refers to.
    pub menu_item_id: i32,
    /// Display name at the time the line was added.
    pub menu_item_name: String,
    /// Unit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Number of units.
    pub quantity: i32,
}

impl OrderItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A user's shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cart {
    pub user_id: String,
    pub items: Vec<OrderItem>,
}

impl Cart {
    /// An empty cart for `user_id`.
    #[must_use]
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            items: Vec::new(),
        }
    }
}

/// Order lifecycle states. The numeric ids are what the order store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Placed and waiting for a delivery agent.
    FreeToTake,
    /// Claimed by a delivery agent.
    Accepted,
    /// On its way.
    InDelivery,
    /// Handed over to the customer.
    Delivered,
    /// Cancelled before delivery.
    Cancelled,
}

impl OrderStatus {
    /// Numeric status id.
    #[must_use]
    pub fn id(self) -> i32 {
        match self {
            Self::FreeToTake => 1,
            Self::Accepted => 2,
            Self::InDelivery => 3,
            Self::Delivered => 4,
            Self::Cancelled => 5,
        }
    }

    /// Inverse of [`OrderStatus::id`].
    pub fn from_id(id: i32) -> Result<Self, EntityError> {
        match id {
            1 => Ok(Self::FreeToTake),
            2 => Ok(Self::Accepted),
            3 => Ok(Self::InDelivery),
            4 => Ok(Self::Delivered),
            5 => Ok(Self::Cancelled),
            other => Err(EntityError::UnknownOrderStatus(other)),
        }
    }
}

/// A priced order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    /// Assigned by the order store on save.
    pub id: Option<OrderId>,
    pub user_id: String,
    pub restaurant_id: i32,
    pub delivery_agent_id: Option<i32>,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    #[serde(rename = "VATAmount")]
    pub vat_amount: Decimal,
    #[serde(rename = "OrderPlacedTimestamp")]
    pub placed_at: DateTime<Utc>,
    pub status: OrderStatus,
}
