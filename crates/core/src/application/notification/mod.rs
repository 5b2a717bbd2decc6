// Notification Service - creation and read-back use cases

pub mod create;

pub use create::{validate_request, CreateNotificationRequest};

use crate::domain::{Notification, Status};
use crate::error::Result;
use crate::port::NotificationRepository;
use std::sync::Arc;

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Validate and persist a new notification in `New`
    pub async fn create(&self, req: CreateNotificationRequest) -> Result<Notification> {
        create::execute(self.repo.as_ref(), req).await
    }

    /// Every delivered notification, id ascending
    pub async fn list_sent(&self) -> Result<Vec<Notification>> {
        self.repo.fetch_by_status(Status::Sent).await
    }

    /// Notification count per status, in lifecycle order
    pub async fn counts(&self) -> Result<Vec<(Status, i64)>> {
        let mut counts = Vec::with_capacity(Status::ALL.len());
        for status in Status::ALL {
            counts.push((status, self.repo.count_by_status(status).await?));
        }
        Ok(counts)
    }
}
