// Retry queue message (transient, never persisted as a notification)

use crate::domain::{Notification, Status};
use serde::{Deserialize, Serialize};

/// A failed delivery waiting in the retry queue.
///
/// Wire format: `{"messageId", "phoneNumber", "content", "attempt", "status"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMessage {
    pub message_id: String,
    pub phone_number: String,
    pub content: String,
    /// Completed retry cycles; starts at 0 and only ever grows by 1
    pub attempt: u32,
    /// Last known status code at enqueue time (advisory)
    pub status: u8,
}

impl FailedMessage {
    /// First enqueue after the initial delivery attempt failed
    pub fn first_failure(notification: &Notification) -> Self {
        Self {
            message_id: notification.id.to_string(),
            phone_number: notification.phone_number.clone(),
            content: notification.content.clone(),
            attempt: 0,
            status: Status::Fail.code(),
        }
    }

    /// True once no further retry cycle is allowed
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.attempt >= max_retries
    }

    /// Count one more failed retry cycle and return the new attempt number
    pub fn record_failed_attempt(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.status = Status::Fail.code();
        self.attempt
    }

    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// Best-effort `messageId` lookup in a payload that failed to deserialize
    pub fn referenced_message_id(payload: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
        value
            .get("messageId")
            .and_then(|id| id.as_str())
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationId;
    use serde_json::json;

    fn notification() -> Notification {
        Notification {
            id: NotificationId::new(12),
            phone_number: "+905551112233".to_string(),
            content: "hi".to_string(),
            status: Status::Process,
            created_at: 0,
            updated_at: None,
        }
    }

    #[test]
    fn test_first_failure_starts_at_zero() {
        let msg = FailedMessage::first_failure(&notification());
        assert_eq!(msg.message_id, "12");
        assert_eq!(msg.attempt, 0);
        assert_eq!(msg.status, Status::Fail.code());
    }

    #[test]
    fn test_wire_field_names() {
        let msg = FailedMessage::first_failure(&notification());
        let value: serde_json::Value = serde_json::from_slice(&msg.to_payload().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "messageId": "12",
                "phoneNumber": "+905551112233",
                "content": "hi",
                "attempt": 0,
                "status": 4
            })
        );
    }

    #[test]
    fn test_exhaustion_boundary() {
        let mut msg = FailedMessage::first_failure(&notification());
        assert!(!msg.is_exhausted(1));
        assert_eq!(msg.record_failed_attempt(), 1);
        assert!(msg.is_exhausted(1));
        assert!(msg.is_exhausted(0));
    }

    #[test]
    fn test_referenced_message_id_from_partial_payload() {
        let payload = br#"{"messageId": "99", "attempt": "not-a-number"}"#;
        assert!(FailedMessage::from_payload(payload).is_err());
        assert_eq!(
            FailedMessage::referenced_message_id(payload),
            Some("99".to_string())
        );
        assert_eq!(FailedMessage::referenced_message_id(b"not json"), None);
        assert_eq!(FailedMessage::referenced_message_id(br#"{"messageId": 5}"#), None);
    }
}
