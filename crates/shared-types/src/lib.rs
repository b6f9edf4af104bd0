//! # Shared Types Crate
//!
//! Domain entities and broker message payloads shared by the order and
//! shopping-cart services, plus the [`CorrelationId`] used to pair requests
//! with replies.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses the broker lives here.
//! - **Payloads stay bare**: request/reply payloads do not declare a
//!   correlation field; the envelope codec owns it.

pub mod correlation;
pub mod entities;
pub mod errors;
pub mod ipc;

pub use correlation::CorrelationId;
pub use entities::*;
pub use errors::*;
pub use ipc::*;
