//! Retry Consumer - drains the retry queue with Fibonacci backoff
//!
//! Per dequeued item:
//! 1. unreadable payload: mark the referenced notification `Dead`, ack
//! 2. `attempt >= max_retries`: mark `Dead`, ack
//! 3. delivery succeeds: mark `Sent`, ack
//! 4. delivery fails: bump `attempt`, wait `fibonacci(attempt)` units,
//!    republish, then ack the original
//!
//! Status writes are best-effort. An item is only acknowledged after its
//! fate is decided, so a crash can duplicate a retry but never drop one.

use crate::application::background::BackgroundLoop;
use crate::application::backoff::{backoff_delay, DEFAULT_BACKOFF_UNIT};
use crate::application::worker::constants::{DEFAULT_MAX_RETRIES, ERROR_RECOVERY_SLEEP_DURATION};
use crate::domain::{FailedMessage, Status};
use crate::error::Result;
use crate::port::{QueueDelivery, RetryQueue, WebhookError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delivery and status recording injected into the consumer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RetryHandler: Send + Sync {
    /// One delivery attempt for a queued message
    async fn attempt_delivery(&self, message: &FailedMessage) -> std::result::Result<(), WebhookError>;

    /// Persist `status` for the notification named by `message_id`
    async fn record_status(&self, message_id: &str, status: Status) -> Result<()>;
}

/// Fate of one dequeued item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Delivered,
    /// Republished with the new attempt number
    Rescheduled { attempt: u32 },
    DeadLettered,
    Malformed,
    /// Republish failed; the original was handed back to the queue
    Released,
}

/// Applies the retry algorithm to queue deliveries
pub struct RetryProcessor {
    queue: Arc<dyn RetryQueue>,
    handler: Arc<dyn RetryHandler>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl RetryProcessor {
    pub fn new(
        queue: Arc<dyn RetryQueue>,
        handler: Arc<dyn RetryHandler>,
        max_retries: u32,
        backoff_unit: Duration,
    ) -> Self {
        Self {
            queue,
            handler,
            max_retries,
            backoff_unit,
        }
    }

    /// Consume until `cancel` fires
    pub async fn consume(&self, cancel: CancellationToken) {
        info!(
            queue = self.queue.name(),
            max_retries = self.max_retries,
            "Retry consumer started"
        );

        loop {
            let delivery = match self.queue.receive(&cancel).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(e) => {
                    error!(queue = self.queue.name(), error = %e, "Failed to receive from retry queue");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => continue,
                        _ = cancel.cancelled() => break,
                    }
                }
            };

            let outcome = self.handle_delivery(&delivery, &cancel).await;
            debug!(delivery_id = delivery.delivery_id, ?outcome, "Retry item handled");
        }

        info!(queue = self.queue.name(), "Retry consumer stopped");
    }

    /// Decide the fate of one delivery and settle it with the queue
    pub async fn handle_delivery(
        &self,
        delivery: &QueueDelivery,
        cancel: &CancellationToken,
    ) -> RetryOutcome {
        let mut message = match FailedMessage::from_payload(&delivery.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(delivery_id = delivery.delivery_id, error = %e, "Unreadable retry payload, dead-lettering");
                match FailedMessage::referenced_message_id(&delivery.payload) {
                    Some(message_id) => self.record(&message_id, Status::Dead).await,
                    None => warn!(delivery_id = delivery.delivery_id, "No messageId in payload, nothing to mark"),
                }
                self.settle_ack(delivery).await;
                return RetryOutcome::Malformed;
            }
        };

        if message.is_exhausted(self.max_retries) {
            warn!(
                message_id = %message.message_id,
                attempt = message.attempt,
                max_retries = self.max_retries,
                "Retry limit reached, dead-lettering"
            );
            self.record(&message.message_id, Status::Dead).await;
            self.settle_ack(delivery).await;
            return RetryOutcome::DeadLettered;
        }

        match self.handler.attempt_delivery(&message).await {
            Ok(()) => {
                info!(message_id = %message.message_id, attempt = message.attempt, "Retry delivered");
                self.record(&message.message_id, Status::Sent).await;
                self.settle_ack(delivery).await;
                RetryOutcome::Delivered
            }
            Err(delivery_err) => {
                let attempt = message.record_failed_attempt();
                if attempt == 1 {
                    self.record(&message.message_id, Status::Fail).await;
                }

                let delay = backoff_delay(attempt, self.backoff_unit);
                warn!(
                    message_id = %message.message_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %delivery_err,
                    "Retry failed, backing off"
                );

                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        info!(message_id = %message.message_id, "Backoff interrupted, republishing now");
                    }
                }

                if let Err(e) = self.queue.publish(&message).await {
                    error!(message_id = %message.message_id, error = %e, "Failed to republish, releasing original");
                    if let Err(e) = self.queue.release(delivery).await {
                        error!(delivery_id = delivery.delivery_id, error = %e, "Failed to release delivery");
                    }
                    return RetryOutcome::Released;
                }

                self.settle_ack(delivery).await;
                RetryOutcome::Rescheduled { attempt }
            }
        }
    }

    async fn record(&self, message_id: &str, status: Status) {
        if let Err(e) = self.handler.record_status(message_id, status).await {
            error!(message_id = %message_id, status = %status, error = %e, "Failed to record status");
        }
    }

    async fn settle_ack(&self, delivery: &QueueDelivery) {
        if let Err(e) = self.queue.ack(delivery).await {
            error!(delivery_id = delivery.delivery_id, error = %e, "Failed to acknowledge delivery");
        }
    }
}

/// Lifecycle around a single `RetryProcessor::consume` loop
pub struct RetryConsumer {
    queue: Arc<dyn RetryQueue>,
    handler: Arc<dyn RetryHandler>,
    backoff_unit: Duration,
    max_retries: AtomicU32,
    task: BackgroundLoop,
}

impl RetryConsumer {
    pub fn new(queue: Arc<dyn RetryQueue>, handler: Arc<dyn RetryHandler>) -> Self {
        Self {
            queue,
            handler,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            max_retries: AtomicU32::new(DEFAULT_MAX_RETRIES),
            task: BackgroundLoop::new("retry-consumer"),
        }
    }

    /// Scale every backoff wait (tests use milliseconds)
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Start consuming in a child scope of `parent`; no-op if already running
    pub async fn start_consuming(&self, parent: &CancellationToken, max_retries: u32) -> bool {
        let processor = RetryProcessor::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.handler),
            max_retries,
            self.backoff_unit,
        );
        let started = self
            .task
            .start(parent, move |scope| async move { processor.consume(scope).await })
            .await;
        if started {
            self.max_retries.store(max_retries, Ordering::Relaxed);
        }
        started
    }

    /// Cancel the loop; no-op if not running
    pub async fn stop_consuming(&self) -> bool {
        self.task.stop().await
    }

    pub async fn is_running(&self) -> bool {
        self.task.is_running().await
    }

    /// Retry ceiling of the current (or last) loop
    pub fn max_retries(&self) -> u32 {
        self.max_retries.load(Ordering::Relaxed)
    }

    pub async fn join(&self, timeout: Duration) -> bool {
        self.task.join(timeout).await
    }
}
