// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    #[error("Invalid notification id: {0}")]
    InvalidNotificationId(String),

    #[error("Unknown status code: {0}")]
    UnknownStatus(u8),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
