//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 control surface for the Herald dispatcher: create and list
//! notifications, start/stop the scheduler and retry consumer, stats.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::{RpcDependencies, RpcHandler};
pub use server::{RpcServer, RpcServerConfig};
