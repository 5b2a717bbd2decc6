//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    ConsumerStartParams, CreateNotificationParams, ListSentResponse, NotificationView,
    StatsResponse, ToggleResponse,
};
use herald_core::application::{CreateNotificationRequest, NotificationService, RetryConsumer, Scheduler};
use herald_core::domain::Status;
use herald_core::port::RetryQueue;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// Everything the handler drives
pub struct RpcDependencies {
    pub notifications: Arc<NotificationService>,
    pub scheduler: Arc<Scheduler>,
    pub consumer: Arc<RetryConsumer>,
    pub queue: Arc<dyn RetryQueue>,
    /// Scope the background loops are started under (daemon lifetime)
    pub root: CancellationToken,
    /// Used by consumer.start.v1 when the caller sends no maxRetries
    pub default_max_retries: u32,
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    deps: RpcDependencies,
    rate_limiter: RateLimiter,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(deps: RpcDependencies) -> Self {
        Self {
            deps,
            rate_limiter: RateLimiter::default(),
            start_time: Instant::now(),
        }
    }

    pub fn with_rate_limit(mut self, burst: u32, rate_per_sec: u32) -> Self {
        self.rate_limiter = RateLimiter::new(burst, rate_per_sec);
        self
    }

    async fn throttle(&self) -> RpcResult<()> {
        if self.rate_limiter.try_acquire().await {
            Ok(())
        } else {
            Err(throttled())
        }
    }

    /// notification.create.v1
    pub async fn create_notification(
        &self,
        params: CreateNotificationParams,
    ) -> RpcResult<NotificationView> {
        self.throttle().await?;

        let created = self
            .deps
            .notifications
            .create(CreateNotificationRequest {
                phone_number: params.phone_number,
                content: params.content,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(NotificationView::from(&created))
    }

    /// notification.list_sent.v1
    pub async fn list_sent(&self) -> RpcResult<ListSentResponse> {
        let sent = self
            .deps
            .notifications
            .list_sent()
            .await
            .map_err(to_rpc_error)?;

        Ok(ListSentResponse {
            notifications: sent.iter().map(NotificationView::from).collect(),
        })
    }

    /// scheduler.start.v1
    pub async fn start_scheduler(&self) -> RpcResult<ToggleResponse> {
        self.throttle().await?;
        let changed = self.deps.scheduler.start(&self.deps.root).await;
        info!(changed, "scheduler.start.v1");
        Ok(ToggleResponse {
            running: self.deps.scheduler.is_running().await,
            changed,
        })
    }

    /// scheduler.stop.v1
    pub async fn stop_scheduler(&self) -> RpcResult<ToggleResponse> {
        self.throttle().await?;
        let changed = self.deps.scheduler.stop().await;
        info!(changed, "scheduler.stop.v1");
        Ok(ToggleResponse {
            running: self.deps.scheduler.is_running().await,
            changed,
        })
    }

    /// consumer.start.v1
    pub async fn start_consumer(&self, params: ConsumerStartParams) -> RpcResult<ToggleResponse> {
        self.throttle().await?;
        let max_retries = params.max_retries.unwrap_or(self.deps.default_max_retries);
        let changed = self
            .deps
            .consumer
            .start_consuming(&self.deps.root, max_retries)
            .await;
        info!(changed, max_retries, "consumer.start.v1");
        Ok(ToggleResponse {
            running: self.deps.consumer.is_running().await,
            changed,
        })
    }

    /// consumer.stop.v1
    pub async fn stop_consumer(&self) -> RpcResult<ToggleResponse> {
        self.throttle().await?;
        let changed = self.deps.consumer.stop_consuming().await;
        info!(changed, "consumer.stop.v1");
        Ok(ToggleResponse {
            running: self.deps.consumer.is_running().await,
            changed,
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> RpcResult<StatsResponse> {
        let counts = self
            .deps
            .notifications
            .counts()
            .await
            .map_err(to_rpc_error)?;
        let count_of = |status: Status| {
            counts
                .iter()
                .find(|(s, _)| *s == status)
                .map_or(0, |(_, c)| *c)
        };

        let retry_queue_depth = self.deps.queue.depth().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            new: count_of(Status::New),
            process: count_of(Status::Process),
            sent: count_of(Status::Sent),
            fail: count_of(Status::Fail),
            dead: count_of(Status::Dead),
            total: counts.iter().map(|(_, c)| c).sum(),
            retry_queue_depth,
            scheduler_running: self.deps.scheduler.is_running().await,
            consumer_running: self.deps.consumer.is_running().await,
            max_retries: self.deps.consumer.max_retries(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }
}
