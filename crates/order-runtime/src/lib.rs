//! # Order Runtime Library
//!
//! Wiring for the order and shopping-cart services. The binary in `main.rs`
//! picks a role; everything it runs lives here so it can be tested.
//!
//! ## Layout
//!
//! - `container/` - configuration and dependency wiring
//! - `ports/` - storage contracts
//! - `adapters/` - in-memory storage
//! - `services/` - cart and order logic
//! - `runtime` - role lifecycle (start, serve, shutdown)
//! - `telemetry` - logging setup

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod container;
pub mod ports;
pub mod runtime;
pub mod services;
pub mod telemetry;

pub use container::{ConfigError, ServiceConfig, ServiceContainer};
pub use runtime::{run_demo, Role, ServiceRuntime};
pub use services::{CartService, OrderDraft, OrderError, OrderService};
