//! # MTOGO Test Suite
//!
//! Scenarios that span more than one crate: the request/reply protocol
//! under load, broker delivery guarantees, and whole order flows.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── request_reply.rs  # correlation, timeouts, cancellation, races
//! │   ├── delivery.rs       # ack/requeue, poison messages, restarts
//! │   └── order_flow.rs     # order service <-> cart service
//! └── benches/
//!     └── registry_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mtogo-tests
//! cargo test -p mtogo-tests integration::request_reply
//! cargo bench -p mtogo-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]
