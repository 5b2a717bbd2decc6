// Create Notification Use Case

use crate::domain::{NewNotification, Notification};
use crate::error::{AppError, Result};
use crate::port::NotificationRepository;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::info;

/// Longest accepted content, in characters
pub const MAX_CONTENT_CHARS: usize = 40;

/// Create request as received from the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub phone_number: String,
    pub content: String,
}

static E164_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid E.164 pattern"));

/// Reject requests the webhook could never deliver
pub fn validate_request(req: &CreateNotificationRequest) -> Result<()> {
    if req.phone_number.is_empty() {
        return Err(AppError::Validation("phoneNumber is required".to_string()));
    }
    if !E164_RE.is_match(&req.phone_number) {
        return Err(AppError::Validation(format!(
            "phoneNumber must be in E.164 format: {}",
            req.phone_number
        )));
    }

    if req.content.is_empty() {
        return Err(AppError::Validation("content is required".to_string()));
    }
    let chars = req.content.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "content too long: {} characters (max: {})",
            chars, MAX_CONTENT_CHARS
        )));
    }
    if req.content.starts_with(' ') {
        return Err(AppError::Validation(
            "content must not start with a space".to_string(),
        ));
    }

    Ok(())
}

/// Execute create use case
pub async fn execute(
    repo: &dyn NotificationRepository,
    req: CreateNotificationRequest,
) -> Result<Notification> {
    validate_request(&req)?;

    let notification = repo
        .create_notification(&NewNotification::new(req.phone_number, req.content))
        .await?;

    info!(notification_id = %notification.id, "Notification created");
    Ok(notification)
}
