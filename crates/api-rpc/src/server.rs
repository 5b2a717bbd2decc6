//! JSON-RPC Server
//!
//! Serves JSON-RPC 2.0 over HTTP/WebSocket on a TCP listener.

use crate::handler::RpcHandler;
use crate::types::{ConsumerStartParams, CreateNotificationParams};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9527;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Bind and start serving; returns the handle and the bound address
    /// (port 0 picks a free port)
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = build_module(self.handler)?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((handle, local_addr))
    }
}

fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, String> {
    let mut module = RpcModule::new(());

    let h = handler.clone();
    module
        .register_async_method("notification.create.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: CreateNotificationParams = params.parse()?;
                handler.create_notification(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("notification.list_sent.v1", move |_, _, _| {
            let handler = h.clone();
            async move { handler.list_sent().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("scheduler.start.v1", move |_, _, _| {
            let handler = h.clone();
            async move { handler.start_scheduler().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("scheduler.stop.v1", move |_, _, _| {
            let handler = h.clone();
            async move { handler.stop_scheduler().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("consumer.start.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: Option<ConsumerStartParams> = params.parse()?;
                handler.start_consumer(req.unwrap_or_default()).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("consumer.stop.v1", move |_, _, _| {
            let handler = h.clone();
            async move { handler.stop_consumer().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler;
    module
        .register_async_method("admin.stats.v1", move |_, _, _| {
            let handler = h.clone();
            async move { handler.stats().await }
        })
        .map_err(|e| e.to_string())?;

    Ok(module)
}
