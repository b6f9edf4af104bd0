//! # Services
//!
//! - [`CartService`]: answers cart requests from the order service
//! - [`OrderService`]: prices and stores orders using the cart it requests

pub mod cart;
pub mod order;

pub use cart::CartService;
pub use order::{price_items, OrderDraft, OrderError, OrderService};
