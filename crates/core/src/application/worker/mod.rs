// Delivery Worker - one pass over due notifications

pub mod constants;

use constants::DEFAULT_BATCH_SIZE;

use crate::application::retry_consumer::RetryHandler;
use crate::domain::{FailedMessage, Notification, NotificationId, Status};
use crate::error::{AppError, Result};
use crate::port::{
    NotificationRepository, RetryQueue, SendMessageRequest, WebhookClient, WebhookError,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome counts of one delivery pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub fetched: usize,
    pub sent: usize,
    pub failed: usize,
    /// Not attempted because `Process` could not be recorded
    pub skipped: usize,
    pub enqueue_failures: usize,
}

/// Fetches `New` notifications and delivers them one by one
pub struct DeliveryWorker {
    repo: Arc<dyn NotificationRepository>,
    webhook: Arc<dyn WebhookClient>,
    queue: Arc<dyn RetryQueue>,
    batch_size: u32,
}

impl DeliveryWorker {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        webhook: Arc<dyn WebhookClient>,
        queue: Arc<dyn RetryQueue>,
    ) -> Self {
        Self {
            repo,
            webhook,
            queue,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Deliver the oldest `New` notifications, strictly in id order.
    ///
    /// Only a failed fetch is returned as an error; per-notification
    /// failures are logged and counted in the report.
    pub async fn deliver_due_notifications(&self) -> Result<DeliveryReport> {
        let batch = self.repo.fetch_oldest_new(self.batch_size).await?;
        let mut report = DeliveryReport {
            fetched: batch.len(),
            ..DeliveryReport::default()
        };

        if batch.is_empty() {
            debug!("No due notifications");
            return Ok(report);
        }

        for notification in &batch {
            self.deliver_one(notification, &mut report).await;
        }

        info!(
            fetched = report.fetched,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            enqueue_failures = report.enqueue_failures,
            "Delivery pass finished"
        );
        Ok(report)
    }

    async fn deliver_one(&self, notification: &Notification, report: &mut DeliveryReport) {
        let id = notification.id;

        // No webhook call without a recorded Process; the write is also the claim
        match self.repo.update_status(id, Status::Process).await {
            Ok(()) => {}
            Err(AppError::Conflict(_)) => {
                warn!(notification_id = %id, "Notification claimed by another pass, skipping");
                report.skipped += 1;
                return;
            }
            Err(e) => {
                error!(notification_id = %id, error = %e, "Failed to mark notification as Process, skipping");
                report.skipped += 1;
                return;
            }
        }

        let request = SendMessageRequest {
            to: notification.phone_number.clone(),
            content: notification.content.clone(),
        };

        match self.webhook.send(&request).await {
            Ok(response) => {
                report.sent += 1;
                info!(
                    notification_id = %id,
                    response_id = %response.response_id,
                    state = %response.state,
                    "Notification delivered"
                );
                if let Err(e) = self.repo.update_status(id, Status::Sent).await {
                    // Delivered already; re-queuing would send it twice
                    error!(notification_id = %id, error = %e, "Failed to mark delivered notification as Sent");
                }
            }
            Err(delivery_err) => {
                report.failed += 1;
                warn!(notification_id = %id, error = %delivery_err, "Delivery failed, scheduling retry");

                if let Err(e) = self.repo.update_status(id, Status::Fail).await {
                    error!(notification_id = %id, error = %e, "Failed to mark notification as Fail");
                }

                let message = FailedMessage::first_failure(notification);
                if let Err(e) = self.queue.publish(&message).await {
                    report.enqueue_failures += 1;
                    error!(
                        notification_id = %id,
                        queue = self.queue.name(),
                        error = %e,
                        "Failed to enqueue notification for retry"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl RetryHandler for DeliveryWorker {
    async fn attempt_delivery(&self, message: &FailedMessage) -> std::result::Result<(), WebhookError> {
        let request = SendMessageRequest {
            to: message.phone_number.clone(),
            content: message.content.clone(),
        };
        let response = self.webhook.send(&request).await?;
        debug!(
            message_id = %message.message_id,
            response_id = %response.response_id,
            "Retry delivered"
        );
        Ok(())
    }

    async fn record_status(&self, message_id: &str, status: Status) -> Result<()> {
        let id: NotificationId = message_id.parse()?;
        if status == Status::Dead {
            // A row still in Process lost its Fail write; Dead is only reachable from Fail
            match self.repo.update_status(id, Status::Fail).await {
                Ok(()) | Err(AppError::InvalidState(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.repo.update_status(id, status).await
    }
}
