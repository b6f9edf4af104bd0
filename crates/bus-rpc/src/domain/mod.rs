//! Domain types for request/reply: the correlation registry, configuration
//! and the error taxonomy.

pub mod config;
pub mod error;
pub mod registry;

pub use config::{RpcConfig, RpcConfigError, MAX_REQUEST_TIMEOUT_SECS};
pub use error::{RpcError, RpcResult};
pub use registry::{
    sweeper, CorrelationRegistry, PendingReply, RegistryStats, Settlement, StatsSnapshot,
};
