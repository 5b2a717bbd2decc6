// Startup recovery
use crate::domain::Status;
use crate::port::{NotificationRepository, RetryQueue};
use std::sync::Arc;
use tracing::{info, warn};

/// What startup recovery found
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Queue items claimed by a previous consumer and made deliverable again
    pub requeued: u64,
    /// Notification ids left in `Process`
    pub stuck_in_process: Vec<String>,
}

/// Crash recovery service
///
/// Runs once on daemon startup, before the scheduler and consumer start.
pub struct RecoveryService {
    repo: Arc<dyn NotificationRepository>,
    queue: Arc<dyn RetryQueue>,
}

impl RecoveryService {
    pub fn new(repo: Arc<dyn NotificationRepository>, queue: Arc<dyn RetryQueue>) -> Self {
        Self { repo, queue }
    }

    /// Return unacknowledged queue items to the queue and report
    /// notifications stuck in `Process`.
    ///
    /// Stuck notifications are left alone: their webhook call may already
    /// have gone out, and driving them again could deliver twice.
    pub async fn recover(&self) -> crate::error::Result<RecoveryReport> {
        info!(queue = self.queue.name(), "Starting startup recovery");

        let requeued = self.queue.recover_unacked().await?;
        if requeued > 0 {
            warn!(requeued, "Re-queued retry items left claimed by a previous run");
        }

        let stuck_in_process: Vec<String> = self
            .repo
            .fetch_by_status(Status::Process)
            .await?
            .into_iter()
            .map(|n| n.id.to_string())
            .collect();

        if !stuck_in_process.is_empty() {
            warn!(
                count = stuck_in_process.len(),
                ids = %stuck_in_process.join(","),
                "Notifications left in Process need manual review"
            );
        }

        info!(requeued, stuck = stuck_in_process.len(), "Startup recovery complete");
        Ok(RecoveryReport {
            requeued,
            stuck_in_process,
        })
    }
}
