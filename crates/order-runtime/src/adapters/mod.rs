//! # Adapters
//!
//! Port implementations used by the runtime.

pub mod memory;

pub use memory::{InMemoryCartStore, InMemoryOrderRepository};
