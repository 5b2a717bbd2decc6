// Notification Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::Status;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Store-assigned notification id.
///
/// Monotonic and sortable; rendered as a decimal string on every external
/// surface (queue payload, RPC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NotificationId(i64);

impl NotificationId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NotificationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .ok()
            .filter(|raw| *raw > 0)
            .map(NotificationId)
            .ok_or_else(|| DomainError::InvalidNotificationId(s.to_string()))
    }
}

impl From<NotificationId> for String {
    fn from(id: NotificationId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for NotificationId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Notification Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub phone_number: String,
    pub content: String,
    pub status: Status,

    pub created_at: i64,         // epoch ms, immutable
    pub updated_at: Option<i64>, // epoch ms, set on first status change
}

impl Notification {
    /// Transition to `next`, stamping `updated_at`
    pub fn transition(&mut self, next: Status, now_millis: i64) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Some(now_millis);
        Ok(())
    }
}

/// Data needed to create a notification; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub phone_number: String,
    pub content: String,
}

impl NewNotification {
    pub fn new(phone_number: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            content: content.into(),
        }
    }
}
