//! RPC Request/Response Types
//!
//! Method parameters and results, camelCase on the wire.

use herald_core::domain::{status_label, Notification};
use serde::{Deserialize, Serialize};

/// notification.create.v1
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationParams {
    pub phone_number: String,
    pub content: String,
}

/// A notification as shown to RPC clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub phone_number: String,
    pub content: String,
    pub status: String,
    pub status_code: u8,
    /// RFC 3339
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            phone_number: n.phone_number.clone(),
            content: n.content.clone(),
            status: status_label(n.status.code()).to_string(),
            status_code: n.status.code(),
            created_at: rfc3339(n.created_at),
            updated_at: n.updated_at.map(rfc3339),
        }
    }
}

fn rfc3339(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

/// notification.list_sent.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSentResponse {
    pub notifications: Vec<NotificationView>,
}

/// consumer.start.v1
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerStartParams {
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// scheduler.* and consumer.* results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub running: bool,
    /// false when the call was a no-op
    pub changed: bool,
}

/// admin.stats.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub new: i64,
    pub process: i64,
    pub sent: i64,
    pub fail: i64,
    pub dead: i64,
    pub total: i64,
    pub retry_queue_depth: i64,
    pub scheduler_running: bool,
    pub consumer_running: bool,
    pub max_retries: u32,
    pub uptime_seconds: u64,
}
